use std::sync::Arc;

use alloy_primitives::{Address, U256};
use tracing::debug;

use crate::claims::models::{ClaimBinding, ExecutionClaim};
use crate::error::{ExecutorError, ExecutorResult};
use crate::ledger::abi::{encode_call, AbiEncoder};
use crate::ledger::client::{CallRequest, LedgerClient};

const CAN_EXECUTE_SIG: &str =
    "canExecute(address,bytes,address,bytes,uint256,uint256,uint256,uint256)";

/// Verdict of the external eligibility predicate.
///
/// Status code 0 means eligible. Any other code means not eligible; the
/// code (and the optional second diagnostic word, when the oracle returns
/// one) is carried for logging only, never branched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NotEligible { code: U256, detail: Option<U256> },
}

/// Wrapper around the read-only `canExecute` predicate on the claim
/// contract. The call has no side effects and no retry policy of its own;
/// a failed check simply counts as "not eligible this cycle".
pub struct EligibilityOracle {
    client: Arc<dyn LedgerClient>,
    contract: Address,
}

impl EligibilityOracle {
    pub fn new(client: Arc<dyn LedgerClient>, contract: Address) -> Self {
        Self { client, contract }
    }

    /// Ask the oracle whether a bound claim is currently executable.
    /// All relevant claim fields are forwarded unmodified.
    pub async fn can_execute(
        &self,
        claim: &ExecutionClaim,
        binding: &ClaimBinding,
    ) -> ExecutorResult<Eligibility> {
        let data = encode_call(CAN_EXECUTE_SIG, can_execute_args(claim, binding));
        let request = CallRequest::read(self.contract, data);

        let returned = self.client.call(&request).await.map_err(|e| {
            ExecutorError::OracleCallFailed {
                claim_id: claim.claim_id,
                detail: e.to_string(),
            }
        })?;

        let eligibility =
            decode_eligibility(&returned).ok_or_else(|| ExecutorError::OracleCallFailed {
                claim_id: claim.claim_id,
                detail: format!("unexpected return of {} bytes", returned.len()),
            })?;

        debug!("canExecute({}) -> {:?}", claim.claim_id, eligibility);
        Ok(eligibility)
    }
}

pub(crate) fn can_execute_args(claim: &ExecutionClaim, binding: &ClaimBinding) -> AbiEncoder {
    let mut args = AbiEncoder::new();
    args.push_address(binding.trigger);
    args.push_bytes(&binding.trigger_payload);
    args.push_address(claim.user_proxy);
    args.push_bytes(&claim.execute_payload);
    args.push_uint(claim.execute_gas);
    args.push_uint(claim.claim_id.as_word());
    args.push_uint(claim.expiry_timestamp);
    args.push_uint(claim.executor_fee);
    args
}

/// The oracle's return shape has existed in two variants: a bare status
/// word, and a status word followed by a diagnostic word. Both are
/// accepted; the first word is the status either way.
fn decode_eligibility(returned: &[u8]) -> Option<Eligibility> {
    if returned.len() < 32 || returned.len() % 32 != 0 {
        return None;
    }

    let mut status_word = [0u8; 32];
    status_word.copy_from_slice(&returned[..32]);
    let code = U256::from_be_bytes(status_word);

    if code.is_zero() {
        return Some(Eligibility::Eligible);
    }

    let detail = if returned.len() >= 64 {
        let mut detail_word = [0u8; 32];
        detail_word.copy_from_slice(&returned[32..64]);
        Some(U256::from_be_bytes(detail_word))
    } else {
        None
    };

    Some(Eligibility::NotEligible { code, detail })
}
