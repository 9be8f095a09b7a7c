use serde::Deserialize;

/// Static executor configuration, loaded once at startup.
///
/// Nothing here is re-derived at runtime: the scan origin, gas policy and
/// poll interval are fixed for the lifetime of the process.
#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorConfig {
    /// JSON-RPC endpoint of the ledger node (also holds the caller keys).
    pub rpc_url: String,
    /// Address of the claim contract emitting the four event kinds.
    pub contract_address: String,
    /// First block of the scan window; every cycle scans from here to latest.
    pub origin_block: u64,
    /// Seconds between reconciliation cycles in daemon mode.
    pub poll_interval_secs: u64,
    /// Fixed gas ceiling attached to every dispatch transaction.
    pub gas_limit: u64,
    /// Fixed low-priority gas price, in gwei.
    pub gas_price_gwei: u64,
}

impl ExecutorConfig {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            rpc_url: std::env::var("EXECUTOR_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            contract_address: std::env::var("EXECUTOR_CONTRACT_ADDRESS")
                .unwrap_or_else(|_| "0x49A791153dbEe3fBc081Ce159d51C70A89323e73".to_string()),
            origin_block: env_u64("EXECUTOR_ORIGIN_BLOCK", 6_606_955)?,
            poll_interval_secs: env_u64("EXECUTOR_POLL_INTERVAL_SECS", 30)?,
            gas_limit: env_u64("EXECUTOR_GAS_LIMIT", 500_000)?,
            gas_price_gwei: env_u64("EXECUTOR_GAS_PRICE_GWEI", 5)?,
        })
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, config::ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| config::ConfigError::Message(format!("{}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
