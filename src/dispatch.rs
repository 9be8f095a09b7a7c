use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use tracing::info;

use crate::claims::models::{ClaimBinding, ExecutionClaim};
use crate::error::{ExecutorError, ExecutorResult};
use crate::ledger::abi::{encode_call, AbiEncoder};
use crate::ledger::client::{CallRequest, LedgerClient};
use crate::oracle::can_execute_args;

const EXECUTE_SIG: &str = "execute(address,bytes,address,bytes,uint256,uint256,uint256,uint256)";
const REQUIRED_DEPOSIT_SIG: &str = "requiredDeposit(address,address)";

/// Fixed transaction fee policy.
///
/// `gas_limit` is the transaction's own ceiling and is independent of the
/// claim's declared `execute_gas`, which only travels as a call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    pub gas_limit: u64,
    pub gas_price: U256,
}

impl GasPolicy {
    pub fn new(gas_limit: u64, gas_price_gwei: u64) -> Self {
        Self {
            gas_limit,
            gas_price: gwei(gas_price_gwei),
        }
    }
}

/// Wei value of a gwei amount.
pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::from(1_000_000_000u64)
}

/// Result of a dispatch attempt. Submission is fire-and-forget: a hash
/// means the ledger accepted the transaction for inclusion, nothing more.
/// Receipts are never awaited and never gate later cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub tx_hash: B256,
    pub deposit: U256,
}

/// Builds and submits the state-changing `execute` call for an eligible
/// claim, paying the executor fee path's required deposit when the target
/// action demands one.
pub struct TransactionDispatcher {
    client: Arc<dyn LedgerClient>,
    contract: Address,
    gas: GasPolicy,
}

impl TransactionDispatcher {
    pub fn new(client: Arc<dyn LedgerClient>, contract: Address, gas: GasPolicy) -> Self {
        Self {
            client,
            contract,
            gas,
        }
    }

    /// Submit the execution transaction for a bound claim from `caller`.
    ///
    /// The upfront deposit is queried read-only immediately before
    /// submission; zero means no value is attached. Both failure modes
    /// (`DepositQueryFailed`, `DispatchRejected`) are per-claim and leave
    /// the claim pending for the next cycle.
    pub async fn dispatch(
        &self,
        claim: &ExecutionClaim,
        binding: &ClaimBinding,
        caller: Address,
    ) -> ExecutorResult<DispatchOutcome> {
        let deposit = self.required_deposit(claim, binding).await?;

        let request = CallRequest {
            from: Some(caller),
            to: self.contract,
            gas: Some(self.gas.gas_limit),
            gas_price: Some(self.gas.gas_price),
            value: if deposit.is_zero() {
                None
            } else {
                Some(deposit)
            },
            data: encode_call(EXECUTE_SIG, can_execute_args(claim, binding)),
        };

        let tx_hash = self.client.send_transaction(&request).await.map_err(|e| {
            ExecutorError::DispatchRejected {
                claim_id: claim.claim_id,
                detail: e.to_string(),
            }
        })?;

        let outcome = DispatchOutcome { tx_hash, deposit };
        info!(
            "\u{26A1} Dispatched claim {}: tx={} deposit={}",
            claim.claim_id, outcome.tx_hash, outcome.deposit
        );

        Ok(outcome)
    }

    async fn required_deposit(
        &self,
        claim: &ExecutionClaim,
        binding: &ClaimBinding,
    ) -> ExecutorResult<U256> {
        let mut args = AbiEncoder::new();
        args.push_address(binding.action);
        args.push_address(claim.selected_executor);

        let request = CallRequest::read(self.contract, encode_call(REQUIRED_DEPOSIT_SIG, args));
        let returned = self.client.call(&request).await.map_err(|e| {
            ExecutorError::DepositQueryFailed {
                claim_id: claim.claim_id,
                detail: e.to_string(),
            }
        })?;

        if returned.len() < 32 {
            return Err(ExecutorError::DepositQueryFailed {
                claim_id: claim.claim_id,
                detail: format!("unexpected return of {} bytes", returned.len()),
            });
        }

        let mut word = [0u8; 32];
        word.copy_from_slice(&returned[..32]);
        Ok(U256::from_be_bytes(word))
    }
}
