use anyhow::{
    Context,
    anyhow,
};
use cipher_loot::{
    Address,
    DrawLedger,
    coprocessor::SimulatedCoprocessor,
    storage::InMemoryDrawStorage,
};
use deployments::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
    compute_config_hash,
    derive_contract_address,
};
use std::str::FromStr;

type Ledger = DrawLedger<InMemoryDrawStorage, SimulatedCoprocessor>;

/// Hash of the probability thresholds compiled into this binary.
pub fn current_config_hash() -> String {
    let config = Ledger::probability_config();
    compute_config_hash(config.precision, config.sr_cutoff, config.ssr_cutoff)
}

/// Load the deployment for `env`, or record a fresh one on first run.
///
/// Records made with different probability thresholds are refused; the
/// ledger they describe would bucket draws differently.
pub fn resolve_deployment(
    store: &DeploymentStore,
    env: DeploymentEnv,
    deployer: &Address,
) -> crate::Result<(Address, DeploymentRecord)> {
    let config_hash = current_config_hash();
    let record = match store.load().context("loading deployment")? {
        Some(record) => {
            if !record.is_compatible_with_hash(&config_hash) {
                return Err(anyhow!(
                    "Deployment {} on {env} was made with probability config {} but this build uses {}",
                    record.contract_address,
                    record.config_hash,
                    config_hash
                ));
            }
            tracing::info!(
                "Using deployment record {} (chain {}) deployed at {}",
                record.contract_address,
                record.chain_id,
                record.deployed_at
            );
            record
        }
        None => {
            let contract_address =
                derive_contract_address(env, deployer.as_bytes(), 0);
            let mut record = DeploymentRecord::new(
                env,
                contract_address,
                config_hash,
                Ledger::confidential_protocol_id(),
            );
            record.deployment_block_height = Some(0);
            store.save(&record).context("saving deployment record")?;
            tracing::info!(
                "Recorded new {env} deployment {} in {}",
                record.contract_address,
                store.path().display()
            );
            record
        }
    };
    let address = Address::from_str(&record.contract_address).with_context(|| {
        format!(
            "parsing contract address from deployment record {}",
            record.contract_address
        )
    })?;
    Ok((address, record))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    const DEPLOYER: Address = Address::new([0xde; 20]);

    #[test]
    fn resolve_deployment__creates_record_on_first_run() {
        // given
        let tmp = TempDir::new("loot-node-deployments").unwrap();
        let store = DeploymentStore::new_in(tmp.path(), DeploymentEnv::Local).unwrap();

        // when
        let (address, record) =
            resolve_deployment(&store, DeploymentEnv::Local, &DEPLOYER).unwrap();

        // then
        assert_eq!(address.to_string(), record.contract_address);
        assert_eq!(record.chain_id, 31_337);
        assert_eq!(record.protocol_id, 1);
        assert_eq!(store.load().unwrap(), Some(record));
    }

    #[test]
    fn resolve_deployment__reuses_stored_record() {
        // given
        let tmp = TempDir::new("loot-node-deployments").unwrap();
        let store = DeploymentStore::new_in(tmp.path(), DeploymentEnv::Sepolia).unwrap();
        let (first, _) =
            resolve_deployment(&store, DeploymentEnv::Sepolia, &DEPLOYER).unwrap();

        // when
        let (second, _) =
            resolve_deployment(&store, DeploymentEnv::Sepolia, &Address::ZERO).unwrap();

        // then
        assert_eq!(first, second);
    }

    #[test]
    fn resolve_deployment__rejects_config_hash_mismatch() {
        // given
        let tmp = TempDir::new("loot-node-deployments").unwrap();
        let store = DeploymentStore::new_in(tmp.path(), DeploymentEnv::Local).unwrap();
        let stale = DeploymentRecord::new(
            DeploymentEnv::Local,
            format!("{}", Address::new([0x11; 20])),
            compute_config_hash(10_000, 2_000, 200),
            1,
        );
        store.save(&stale).unwrap();

        // when
        let result = resolve_deployment(&store, DeploymentEnv::Local, &DEPLOYER);

        // then
        let err = result.unwrap_err();
        assert!(err.to_string().contains("probability config"));
    }
}
