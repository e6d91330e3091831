use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Local,
    Sepolia,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Local => "local",
            DeploymentEnv::Sepolia => "sepolia",
        }
    }

    pub fn chain_id(self) -> u64 {
        match self {
            DeploymentEnv::Local => 31_337,
            DeploymentEnv::Sepolia => 11_155_111,
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Local => "Local",
            DeploymentEnv::Sepolia => "Sepolia",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub config_hash: String,
    pub protocol_id: u64,
    #[serde(default)]
    pub deployment_block_height: Option<u64>,
}

impl DeploymentRecord {
    pub fn new(
        env: DeploymentEnv,
        contract_address: impl Into<String>,
        config_hash: impl Into<String>,
        protocol_id: u64,
    ) -> Self {
        Self {
            deployed_at: Utc::now().to_rfc3339(),
            contract_address: contract_address.into(),
            chain_id: env.chain_id(),
            config_hash: config_hash.into(),
            protocol_id,
            deployment_block_height: None,
        }
    }

    pub fn is_compatible_with_hash(&self, hash: &str) -> bool {
        self.config_hash == hash
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::new_in(DEPLOYMENTS_ROOT, env)
    }

    /// Store rooted somewhere other than `.deployments` in the working
    /// directory.
    pub fn new_in(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: &DeploymentRecord) -> Result<()> {
        write_record(&self.path, record)
    }
}

/// Fingerprint of the probability thresholds a deployment was made with.
pub fn compute_config_hash(precision: u16, sr_cutoff: u16, ssr_cutoff: u16) -> String {
    let mut hasher = Sha256::new();
    hasher.update(precision.to_be_bytes());
    hasher.update(sr_cutoff.to_be_bytes());
    hasher.update(ssr_cutoff.to_be_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deterministic 20-byte contract address for a deployer and nonce, as a
/// `0x`-prefixed hex string.
pub fn derive_contract_address(env: DeploymentEnv, deployer: &[u8], nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(env.chain_id().to_be_bytes());
    hasher.update(deployer);
    hasher.update(nonce.to_be_bytes());
    let digest = hasher.finalize();
    format!("0x{}", hex::encode(&digest[12..]))
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).with_context(|| {
            format!("Failed to create deployments directory {}", root.display())
        })?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create {} directory", env_dir.display())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"").with_context(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON; expected a single deployment object"
    ))
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn load__returns_none_for_a_fresh_store() {
        let temp_dir = TempDir::new("deployments_fresh").unwrap();

        let store = DeploymentStore::new_in(temp_dir.path(), DeploymentEnv::Local).unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(store.path().ends_with("local/deployments.json"));
    }

    #[test]
    fn save__then_load_returns_the_record() {
        // given
        let temp_dir = TempDir::new("deployments_roundtrip").unwrap();
        let store =
            DeploymentStore::new_in(temp_dir.path(), DeploymentEnv::Sepolia).unwrap();
        let mut record = DeploymentRecord::new(
            DeploymentEnv::Sepolia,
            "0xc5a5fa28ed09ea41d979f545c0e7adc9a8e2e68b",
            compute_config_hash(10_000, 1_000, 100),
            1,
        );
        record.deployment_block_height = Some(12);

        // when
        store.save(&record).unwrap();

        // then
        let loaded = store.load().unwrap().expect("record stored");
        assert_eq!(loaded, record);
        assert_eq!(loaded.chain_id, 11_155_111);
    }

    #[test]
    fn compute_config_hash__changes_with_any_cutoff() {
        let base = compute_config_hash(10_000, 1_000, 100);

        assert_eq!(base, compute_config_hash(10_000, 1_000, 100));
        assert_ne!(base, compute_config_hash(10_000, 1_000, 101));
        assert_ne!(base, compute_config_hash(10_000, 999, 100));
    }

    #[test]
    fn derive_contract_address__is_twenty_bytes_of_hex() {
        let address = derive_contract_address(DeploymentEnv::Local, b"deployer", 0);

        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);
        assert_ne!(
            address,
            derive_contract_address(DeploymentEnv::Local, b"deployer", 1)
        );
    }
}
