use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::ledger::rpc::RpcError;

/// Log range filter for one event kind on one contract.
///
/// `to_block: None` means the current head ("latest"); live scans always
/// run `[origin_block, latest]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topic0: B256,
    pub from_block: u64,
    pub to_block: Option<u64>,
}

/// A raw, undecoded log as the ledger records it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
    pub block_number: u64,
}

/// A call or transaction envelope against the claim contract.
///
/// For read-only calls (`call`) the gas fields are ignored; for
/// state-changing submissions (`send_transaction`) all fields apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub gas: Option<u64>,
    pub gas_price: Option<U256>,
    pub value: Option<U256>,
    pub data: Vec<u8>,
}

impl CallRequest {
    /// Read-only call envelope with no gas or value policy attached.
    pub fn read(to: Address, data: Vec<u8>) -> Self {
        Self {
            from: None,
            to,
            gas: None,
            gas_price: None,
            value: None,
            data,
        }
    }
}

/// Collaborator interface to the external ledger node.
///
/// The node owns connectivity, key management and signing; the executor
/// only ever sees accounts, logs, call returns and transaction hashes.
/// Submission is fire-and-forget: a returned hash means "accepted for
/// inclusion", never "mined".
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Accounts the node can sign for; the first one is the caller.
    async fn get_accounts(&self) -> Result<Vec<Address>, RpcError>;

    /// Historical logs matching the filter, in ledger order (not re-sorted).
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError>;

    /// Read-only contract call; must not mutate ledger state.
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, RpcError>;

    /// Submit a signed, fee-bearing transaction; returns its hash.
    async fn send_transaction(&self, request: &CallRequest) -> Result<B256, RpcError>;
}
