pub mod app;
pub mod deployment;

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
