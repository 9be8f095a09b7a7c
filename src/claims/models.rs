use std::fmt;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};

/// Identity of an execution claim. Assigned by the ledger, never reused
/// while the claim is pending, and used as the registry's primary key for
/// the whole scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClaimId(pub u64);

impl ClaimId {
    /// Claim ids travel as a full 32-byte word in log topics; anything that
    /// does not fit in a u64 is outside the ledger's issued range.
    pub fn from_word(word: U256) -> Option<Self> {
        word.try_into().ok().map(ClaimId)
    }

    pub fn as_word(&self) -> U256 {
        U256::from(self.0)
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClaimId {
    fn from(id: u64) -> Self {
        ClaimId(id)
    }
}

/// Trigger/action attachment delivered by the Bound event, logically
/// dependent on the Minted event for the same claim id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimBinding {
    /// Condition contract consulted by the eligibility oracle.
    pub trigger: Address,
    /// Opaque parameters for the condition contract.
    pub trigger_payload: Bytes,
    /// Target of execution once the trigger holds.
    pub action: Address,
}

/// A pending unit of deferred, conditional work reconstructed from the
/// event ledger.
///
/// `binding` is `None` until the Bound event for this claim id has been
/// observed; an unbound claim is incomplete and must never be passed to the
/// oracle or the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionClaim {
    pub claim_id: ClaimId,
    /// Executor authorized to run this claim; `Address::ZERO` is the
    /// wildcard meaning any executor may run it.
    pub selected_executor: Address,
    /// Address on whose behalf the action executes.
    pub user_proxy: Address,
    /// Opaque payload handed to the action on execution.
    pub execute_payload: Bytes,
    /// Declared execution gas budget. Passed through as a call argument
    /// only; the transaction's own gas limit is a separate fixed ceiling.
    pub execute_gas: U256,
    pub expiry_timestamp: U256,
    /// Fee paid to the executor on successful execution.
    pub executor_fee: U256,
    pub binding: Option<ClaimBinding>,
}

impl ExecutionClaim {
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
}

/// Minted event: creates the claim record with its mint-time fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedEvent {
    pub claim_id: ClaimId,
    pub selected_executor: Address,
    pub user_proxy: Address,
    pub execute_payload: Bytes,
    pub execute_gas: U256,
    pub expiry_timestamp: U256,
    pub executor_fee: U256,
    pub block_number: u64,
}

impl MintedEvent {
    pub fn into_claim(self) -> ExecutionClaim {
        ExecutionClaim {
            claim_id: self.claim_id,
            selected_executor: self.selected_executor,
            user_proxy: self.user_proxy,
            execute_payload: self.execute_payload,
            execute_gas: self.execute_gas,
            expiry_timestamp: self.expiry_timestamp,
            executor_fee: self.executor_fee,
            binding: None,
        }
    }
}

/// Bound event: attaches trigger/action to an already-minted claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundEvent {
    pub claim_id: ClaimId,
    pub trigger: Address,
    pub trigger_payload: Bytes,
    pub action: Address,
    pub block_number: u64,
}

/// Finalized event: the claim was executed and burned on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedEvent {
    pub claim_id: ClaimId,
    pub block_number: u64,
}

/// Cancelled event: the claim was withdrawn before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledEvent {
    pub claim_id: ClaimId,
    pub block_number: u64,
}

/// The four event kinds read independently on every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Minted,
    Bound,
    Finalized,
    Cancelled,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Minted,
        EventKind::Bound,
        EventKind::Finalized,
        EventKind::Cancelled,
    ];

    /// Canonical event signature, hashed into the log's topic0.
    /// The claim id is the sole indexed parameter of every kind.
    pub fn signature(&self) -> &'static str {
        match self {
            EventKind::Minted => {
                "ClaimMinted(uint256,address,address,bytes,uint256,uint256,uint256)"
            }
            EventKind::Bound => "ClaimBound(uint256,address,bytes,address)",
            EventKind::Finalized => "ClaimFinalized(uint256)",
            EventKind::Cancelled => "ClaimCancelled(uint256)",
        }
    }

    pub fn topic(&self) -> B256 {
        keccak256(self.signature().as_bytes())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Minted => "Minted",
            EventKind::Bound => "Bound",
            EventKind::Finalized => "Finalized",
            EventKind::Cancelled => "Cancelled",
        };
        write!(f, "{}", name)
    }
}
