use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::Address;
use tokio::time::Duration;
use tracing::info;

use crate::config::ExecutorConfig;
use crate::dispatch::{GasPolicy, TransactionDispatcher};
use crate::error::{ExecutorError, ExecutorResult};
use crate::ledger::client::LedgerClient;
use crate::ledger::reader::LedgerReader;
use crate::ledger::rpc::JsonRpcLedgerClient;
use crate::oracle::EligibilityOracle;
use crate::scheduler::SchedulerLoop;

/// Wire the configured ledger client into a ready-to-run scheduler.
///
/// The ledger client handle, contract address and gas policy are passed in
/// explicitly here; no component reaches for ambient state.
pub fn initialize_scheduler(config: &ExecutorConfig) -> ExecutorResult<SchedulerLoop> {
    info!("Initializing executor components ...");

    let contract = Address::from_str(&config.contract_address).map_err(|e| {
        ExecutorError::Config(format!(
            "invalid contract address {}: {}",
            config.contract_address, e
        ))
    })?;

    let client: Arc<dyn LedgerClient> = Arc::new(JsonRpcLedgerClient::new(&config.rpc_url));
    info!("\u{2705} Ledger client initialized for {}", config.rpc_url);

    let reader = LedgerReader::new(client.clone(), contract, config.origin_block);
    info!(
        "\u{2705} Ledger reader scanning {} from block {}",
        contract, config.origin_block
    );

    let oracle = EligibilityOracle::new(client.clone(), contract);

    let gas = GasPolicy::new(config.gas_limit, config.gas_price_gwei);
    let dispatcher = TransactionDispatcher::new(client.clone(), contract, gas);
    info!(
        "\u{2705} Dispatcher ready (gas limit {}, gas price {} gwei)",
        config.gas_limit, config.gas_price_gwei
    );

    Ok(SchedulerLoop::new(
        client,
        reader,
        oracle,
        dispatcher,
        Duration::from_secs(config.poll_interval_secs),
    ))
}
