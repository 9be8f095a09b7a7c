use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::claims::models::{
    BoundEvent, CancelledEvent, ClaimBinding, ClaimId, ExecutionClaim, FinalizedEvent, MintedEvent,
};
use crate::error::{ExecutorError, ExecutorResult};

/// In-memory reconciliation of the pending claim set.
///
/// The registry owns the claim records for exactly one cycle and is rebuilt
/// from scratch every time; there is no state carried between cycles. The
/// ledger is the source of truth.
pub struct ClaimRegistry;

impl ClaimRegistry {
    /// Fold the four event streams into the current pending set.
    ///
    /// The pass order is fixed and not re-orderable: later passes must see
    /// earlier passes' effects. Terminal events (finalize/cancel) always win
    /// over bind, regardless of how the two arrived within one scan.
    ///
    /// 1. Minted inserts records (a duplicate id overwrites, the ledger is
    ///    not expected to re-mint but the fold must not crash if it does).
    /// 2. Bound attaches trigger/action; a bind with no minted record is a
    ///    data-consistency fault and aborts the rebuild.
    /// 3. Finalized deletes if present (idempotent).
    /// 4. Cancelled deletes if present (idempotent).
    pub fn rebuild(
        minted: Vec<MintedEvent>,
        bound: Vec<BoundEvent>,
        finalized: Vec<FinalizedEvent>,
        cancelled: Vec<CancelledEvent>,
    ) -> ExecutorResult<BTreeMap<ClaimId, ExecutionClaim>> {
        let mut claims: BTreeMap<ClaimId, ExecutionClaim> = BTreeMap::new();

        for event in minted {
            info!(
                "\u{1F4DC} ClaimMinted: claim_id={} block={}",
                event.claim_id, event.block_number
            );
            if let Some(previous) = claims.insert(event.claim_id, event.into_claim()) {
                debug!(
                    "duplicate mint for claim {} overwrote earlier record",
                    previous.claim_id
                );
            }
        }

        for event in bound {
            info!(
                "\u{1F517} ClaimBound: claim_id={} trigger={} action={} block={}",
                event.claim_id, event.trigger, event.action, event.block_number
            );
            let claim = claims
                .get_mut(&event.claim_id)
                .ok_or(ExecutorError::OrphanBindEvent {
                    claim_id: event.claim_id,
                })?;
            claim.binding = Some(ClaimBinding {
                trigger: event.trigger,
                trigger_payload: event.trigger_payload,
                action: event.action,
            });
        }

        for event in finalized {
            if claims.remove(&event.claim_id).is_some() {
                info!(
                    "\u{1F525} ClaimFinalized: claim_id={} block={}",
                    event.claim_id, event.block_number
                );
            } else {
                debug!("finalize for absent claim {} ignored", event.claim_id);
            }
        }

        for event in cancelled {
            if claims.remove(&event.claim_id).is_some() {
                info!(
                    "\u{1F6AB} ClaimCancelled: claim_id={} block={}",
                    event.claim_id, event.block_number
                );
            } else {
                debug!("cancel for absent claim {} ignored", event.claim_id);
            }
        }

        Ok(claims)
    }
}
