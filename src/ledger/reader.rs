use std::sync::Arc;

use alloy_primitives::{Address, U256};
use tracing::debug;

use crate::claims::models::{
    BoundEvent, CancelledEvent, ClaimId, EventKind, FinalizedEvent, MintedEvent,
};
use crate::error::{ExecutorError, ExecutorResult};
use crate::ledger::abi::AbiDecoder;
use crate::ledger::client::{LedgerClient, LogFilter, RawLog};

/// Fetches and decodes one event kind per call over the fixed scan window
/// `[origin_block, latest]`.
///
/// Any transport failure surfaces as `LedgerUnavailable` and aborts the
/// caller's cycle; a scan is never partially applied.
pub struct LedgerReader {
    client: Arc<dyn LedgerClient>,
    contract: Address,
    origin_block: u64,
}

impl LedgerReader {
    pub fn new(client: Arc<dyn LedgerClient>, contract: Address, origin_block: u64) -> Self {
        Self {
            client,
            contract,
            origin_block,
        }
    }

    pub async fn fetch_minted(&self) -> ExecutorResult<Vec<MintedEvent>> {
        self.logs_for(EventKind::Minted)
            .await?
            .iter()
            .map(decode_minted)
            .collect()
    }

    pub async fn fetch_bound(&self) -> ExecutorResult<Vec<BoundEvent>> {
        self.logs_for(EventKind::Bound)
            .await?
            .iter()
            .map(decode_bound)
            .collect()
    }

    pub async fn fetch_finalized(&self) -> ExecutorResult<Vec<FinalizedEvent>> {
        self.logs_for(EventKind::Finalized)
            .await?
            .iter()
            .map(|log| {
                claim_id_of(EventKind::Finalized, log).map(|claim_id| FinalizedEvent {
                    claim_id,
                    block_number: log.block_number,
                })
            })
            .collect()
    }

    pub async fn fetch_cancelled(&self) -> ExecutorResult<Vec<CancelledEvent>> {
        self.logs_for(EventKind::Cancelled)
            .await?
            .iter()
            .map(|log| {
                claim_id_of(EventKind::Cancelled, log).map(|claim_id| CancelledEvent {
                    claim_id,
                    block_number: log.block_number,
                })
            })
            .collect()
    }

    async fn logs_for(&self, kind: EventKind) -> ExecutorResult<Vec<RawLog>> {
        let filter = LogFilter {
            address: self.contract,
            topic0: kind.topic(),
            from_block: self.origin_block,
            to_block: None,
        };

        let logs = self
            .client
            .get_logs(&filter)
            .await
            .map_err(|e| ExecutorError::LedgerUnavailable {
                context: format!("fetching {} events: {}", kind, e),
            })?;

        debug!("fetched {} {} logs from block {}", logs.len(), kind, self.origin_block);
        Ok(logs)
    }
}

/// The claim id is the single indexed parameter of every event kind, so it
/// always travels as topic1.
fn claim_id_of(kind: EventKind, log: &RawLog) -> ExecutorResult<ClaimId> {
    let topic = log
        .topics
        .get(1)
        .ok_or_else(|| ExecutorError::MalformedEvent {
            kind,
            block: log.block_number,
            detail: "missing claim id topic".to_string(),
        })?;

    ClaimId::from_word(U256::from_be_bytes(topic.0)).ok_or_else(|| ExecutorError::MalformedEvent {
        kind,
        block: log.block_number,
        detail: "claim id exceeds u64 range".to_string(),
    })
}

fn decode_minted(log: &RawLog) -> ExecutorResult<MintedEvent> {
    let claim_id = claim_id_of(EventKind::Minted, log)?;
    let mut decoder = AbiDecoder::new(&log.data);

    let malformed = |detail: crate::ledger::abi::AbiError| ExecutorError::MalformedEvent {
        kind: EventKind::Minted,
        block: log.block_number,
        detail: detail.to_string(),
    };

    Ok(MintedEvent {
        claim_id,
        selected_executor: decoder.address().map_err(malformed)?,
        user_proxy: decoder.address().map_err(malformed)?,
        execute_payload: decoder.bytes().map_err(malformed)?,
        execute_gas: decoder.uint().map_err(malformed)?,
        expiry_timestamp: decoder.uint().map_err(malformed)?,
        executor_fee: decoder.uint().map_err(malformed)?,
        block_number: log.block_number,
    })
}

fn decode_bound(log: &RawLog) -> ExecutorResult<BoundEvent> {
    let claim_id = claim_id_of(EventKind::Bound, log)?;
    let mut decoder = AbiDecoder::new(&log.data);

    let malformed = |detail: crate::ledger::abi::AbiError| ExecutorError::MalformedEvent {
        kind: EventKind::Bound,
        block: log.block_number,
        detail: detail.to_string(),
    };

    Ok(BoundEvent {
        claim_id,
        trigger: decoder.address().map_err(malformed)?,
        trigger_payload: decoder.bytes().map_err(malformed)?,
        action: decoder.address().map_err(malformed)?,
        block_number: log.block_number,
    })
}
