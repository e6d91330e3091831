use anyhow::Context;
use cipher_loot::{
    Address,
    DrawLedger,
    coprocessor::SimulatedCoprocessor,
};
use clap::{
    ArgGroup,
    Parser,
};
use deployments::{
    DeploymentEnv,
    DeploymentStore,
};
use loot_node::{
    app::{
        App,
        RunState,
        actix_query_api::ActixQueryApi,
        init_tracing,
        sled_storage::SledDrawStorage,
    },
    deployment::resolve_deployment,
};
use std::{
    env::current_dir,
    fs,
    path::PathBuf,
    str::FromStr,
};

const DEFAULT_PORT: u16 = 8080;

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = None,
    group(
        ArgGroup::new("network")
            .args(["local", "sepolia"])
            .required(true)
    )
)]
struct Args {
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seed for the simulated coprocessor's randomness.
    #[arg(long)]
    seed: Option<u64>,

    /// Address recorded as the deployer on first run.
    #[arg(long)]
    deployer: Option<String>,

    #[arg(short, long, default_value = "false")]
    tracing: bool,

    #[arg(long)]
    local: bool,

    #[arg(long)]
    sepolia: bool,
}

async fn handle_interupt() {
    let res = tokio::signal::ctrl_c().await;
    match res {
        Ok(_) => {
            tracing::info!("Received interrupt, exiting");
        }
        Err(_) => {
            tracing::warn!("Received interrupt error, exiting anyway");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.tracing {
        init_tracing();
    }
    let env = if args.local {
        DeploymentEnv::Local
    } else {
        DeploymentEnv::Sepolia
    };
    let deployer = match &args.deployer {
        Some(raw) => Address::from_str(raw).context("parsing --deployer")?,
        None => Address::ZERO,
    };

    let store = DeploymentStore::new(env).context("opening deployments store")?;
    let (contract, record) = resolve_deployment(&store, env, &deployer)?;

    let data_root = match &args.data_dir {
        Some(path) => path.clone(),
        None => current_dir()
            .context("determine process working directory")?
            .join("cipher_loot_data"),
    }
    .join(env.dir_name())
    .join(&record.contract_address);
    fs::create_dir_all(&data_root).with_context(|| {
        format!("creating data directory {}", data_root.display())
    })?;
    tracing::info!(
        "Using sled storage directory for {}: {}",
        record.contract_address,
        data_root.display()
    );

    let (draws, chain) = SledDrawStorage::open(&data_root)?;
    let coprocessor = match args.seed {
        Some(seed) => {
            tracing::info!("Seeding simulated coprocessor with {seed}");
            SimulatedCoprocessor::new(seed)
        }
        None => SimulatedCoprocessor::from_entropy(),
    };
    let ledger = DrawLedger::new(contract, draws, coprocessor);
    let existing = ledger.total_draws()?;
    if existing > 0 {
        tracing::warn!(
            "Resuming with {existing} stored draws; their handles were issued by a previous coprocessor instance and decrypt requests for them fail with UnknownHandle"
        );
    }

    let api = ActixQueryApi::bind(&args.host, Some(args.port.unwrap_or(DEFAULT_PORT)))
        .await?;
    let mut app = App::new(api, ledger, chain)?;

    tracing::info!("Starting loot node for {contract} on {env}");
    loop {
        let interrupt = handle_interupt();
        match app.run(interrupt).await? {
            RunState::Continue => continue,
            RunState::Exit => {
                tracing::info!("Exiting loot node");
                return Ok(());
            }
        }
    }
}
