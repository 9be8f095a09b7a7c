use std::sync::Arc;

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use crate::claims::registry::ClaimRegistry;
use crate::dispatch::TransactionDispatcher;
use crate::error::{ExecutorError, ExecutorResult};
use crate::ledger::client::LedgerClient;
use crate::ledger::reader::LedgerReader;
use crate::oracle::{Eligibility, EligibilityOracle};

/// How the scheduler is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Self-scheduling: one cycle every poll interval, indefinitely.
    Daemon,
    /// Exactly one cycle, then return (for scripted invocation).
    OneShot,
}

/// Summary of one reconciliation cycle, for logging and tests.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub caller: Address,
    pub minted_events: usize,
    pub bound_events: usize,
    pub finalized_events: usize,
    pub cancelled_events: usize,
    pub pending: usize,
    pub skipped_unbound: usize,
    pub ineligible: usize,
    pub dispatched: usize,
    pub failed: usize,
}

/// Composition root driving scan -> reconcile -> evaluate -> dispatch.
///
/// Cycles never overlap: the registry is rebuilt from scratch inside each
/// cycle and owned by it exclusively. A transaction dispatched in cycle N
/// may not be mined before cycle N+1, so a claim can be re-evaluated and
/// re-dispatched until its terminal event is observed.
pub struct SchedulerLoop {
    client: Arc<dyn LedgerClient>,
    reader: LedgerReader,
    oracle: EligibilityOracle,
    dispatcher: TransactionDispatcher,
    poll_interval: Duration,
}

impl SchedulerLoop {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        reader: LedgerReader,
        oracle: EligibilityOracle,
        dispatcher: TransactionDispatcher,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            reader,
            oracle,
            dispatcher,
            poll_interval,
        }
    }

    pub async fn run(&self, mode: RunMode) -> ExecutorResult<()> {
        match mode {
            RunMode::OneShot => {
                let report = self.run_cycle().await?;
                log_summary(&report);
                Ok(())
            }
            RunMode::Daemon => {
                info!(
                    "\u{23F0} Scheduling a reconciliation cycle every {}s",
                    self.poll_interval.as_secs()
                );
                let mut ticker = interval(self.poll_interval);
                loop {
                    ticker.tick().await;
                    // A failed cycle aborts itself, never the daemon; the
                    // next tick retries from scratch.
                    match self.run_cycle().await {
                        Ok(report) => log_summary(&report),
                        Err(e) => error!("\u{274C} Cycle aborted: {}", e),
                    }
                }
            }
        }
    }

    /// One full pass: scan the four event kinds, rebuild the pending set,
    /// then evaluate and dispatch each bound claim.
    pub async fn run_cycle(&self) -> ExecutorResult<CycleReport> {
        let started_at = Utc::now();

        let accounts = self.client.get_accounts().await.map_err(|e| {
            ExecutorError::LedgerUnavailable {
                context: format!("fetching accounts: {}", e),
            }
        })?;
        let caller = *accounts.first().ok_or(ExecutorError::NoAccounts)?;
        info!("\u{1F680} Running executor node from {}", caller);

        // All four scans must complete before reconciliation begins; a
        // single failure aborts the cycle with nothing applied.
        let (minted, bound, finalized, cancelled) = tokio::try_join!(
            self.reader.fetch_minted(),
            self.reader.fetch_bound(),
            self.reader.fetch_finalized(),
            self.reader.fetch_cancelled(),
        )?;

        let mut report = CycleReport {
            started_at,
            caller,
            minted_events: minted.len(),
            bound_events: bound.len(),
            finalized_events: finalized.len(),
            cancelled_events: cancelled.len(),
            pending: 0,
            skipped_unbound: 0,
            ineligible: 0,
            dispatched: 0,
            failed: 0,
        };

        info!(
            "\u{1F4E5} Scan complete: {} minted, {} bound, {} finalized, {} cancelled events",
            report.minted_events,
            report.bound_events,
            report.finalized_events,
            report.cancelled_events
        );

        let pending = ClaimRegistry::rebuild(minted, bound, finalized, cancelled)?;
        report.pending = pending.len();
        info!("\u{1F4CB} {} pending execution claims", pending.len());

        for (claim_id, claim) in &pending {
            let Some(binding) = claim.binding.as_ref() else {
                info!(
                    "\u{23F3} Claim {} is minted but not yet bound, skipping",
                    claim_id
                );
                report.skipped_unbound += 1;
                continue;
            };

            info!("\u{1F50D} Checking if claim {} is executable", claim_id);
            match self.oracle.can_execute(claim, binding).await {
                Ok(Eligibility::Eligible) => {
                    info!("\u{1F525} Claim {} is executable", claim_id);
                    match self.dispatcher.dispatch(claim, binding, caller).await {
                        Ok(_) => report.dispatched += 1,
                        Err(e) => {
                            // Per-claim failure; the claim stays pending
                            // and is re-evaluated next cycle.
                            warn!("{}", e);
                            report.failed += 1;
                        }
                    }
                }
                Ok(Eligibility::NotEligible { code, detail }) => {
                    // One ineligible claim says nothing about the rest;
                    // evaluation continues with the next claim.
                    match detail {
                        Some(detail) => info!(
                            "\u{274C} Claim {} is not executable (code {}, detail {})",
                            claim_id, code, detail
                        ),
                        None => info!(
                            "\u{274C} Claim {} is not executable (code {})",
                            claim_id, code
                        ),
                    }
                    report.ineligible += 1;
                }
                Err(e) => {
                    // Oracle failure counts as "not eligible this cycle".
                    warn!("{}", e);
                    report.ineligible += 1;
                }
            }
        }

        Ok(report)
    }
}

fn log_summary(report: &CycleReport) {
    let elapsed_ms = (Utc::now() - report.started_at).num_milliseconds();
    info!(
        "\u{2713} Cycle from {} complete in {}ms: {} pending, {} dispatched, {} ineligible, {} unbound, {} failed",
        report.caller,
        elapsed_ms,
        report.pending,
        report.dispatched,
        report.ineligible,
        report.skipped_unbound,
        report.failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use alloy_primitives::{Address, B256, U256};
    use async_trait::async_trait;

    use crate::claims::models::EventKind;
    use crate::dispatch::GasPolicy;
    use crate::ledger::abi::{selector, AbiEncoder};
    use crate::ledger::client::{CallRequest, LogFilter, RawLog};
    use crate::ledger::rpc::RpcError;

    const CAN_EXECUTE_SIG: &str =
        "canExecute(address,bytes,address,bytes,uint256,uint256,uint256,uint256)";
    const EXECUTE_SIG: &str =
        "execute(address,bytes,address,bytes,uint256,uint256,uint256,uint256)";
    const REQUIRED_DEPOSIT_SIG: &str = "requiredDeposit(address,address)";

    const CONTRACT: Address = Address::repeat_byte(0x01);
    const CALLER: Address = Address::repeat_byte(0xee);

    #[derive(Default)]
    struct MockLedgerClient {
        logs: Mutex<Vec<RawLog>>,
        /// canExecute status code per claim id; absent means eligible (0).
        eligibility: Mutex<HashMap<u64, u64>>,
        deposit: Mutex<U256>,
        sent: Mutex<Vec<CallRequest>>,
        oracle_queries: Mutex<Vec<u64>>,
        fail_get_logs: Mutex<bool>,
        reject_sends: Mutex<bool>,
        /// Claim id whose canExecute call reverts instead of answering.
        fail_oracle_for: Mutex<Option<u64>>,
        /// When set, the next requiredDeposit query fails, then clears.
        fail_next_deposit: Mutex<bool>,
    }

    impl MockLedgerClient {
        fn push_log(&self, log: RawLog) {
            self.logs.lock().unwrap().push(log);
        }

        fn set_status(&self, claim_id: u64, code: u64) {
            self.eligibility.lock().unwrap().insert(claim_id, code);
        }

        fn sent_claim_ids(&self) -> Vec<u64> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|request| claim_id_in_calldata(&request.data))
                .collect()
        }
    }

    /// The claim id is head word 5 of both canExecute and execute calldata.
    fn claim_id_in_calldata(data: &[u8]) -> u64 {
        let mut word = [0u8; 32];
        word.copy_from_slice(&data[4 + 5 * 32..4 + 6 * 32]);
        U256::from_be_bytes(word).try_into().unwrap()
    }

    #[async_trait]
    impl LedgerClient for MockLedgerClient {
        async fn get_accounts(&self) -> Result<Vec<Address>, RpcError> {
            Ok(vec![CALLER, Address::repeat_byte(0xdd)])
        }

        async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
            if *self.fail_get_logs.lock().unwrap() {
                return Err(RpcError::Node {
                    code: -32000,
                    message: "connection refused".to_string(),
                });
            }
            Ok(self
                .logs
                .lock()
                .unwrap()
                .iter()
                .filter(|log| log.topics.first() == Some(&filter.topic0))
                .cloned()
                .collect())
        }

        async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, RpcError> {
            let head = &request.data[..4];
            if head == selector(CAN_EXECUTE_SIG).as_slice() {
                let claim_id = claim_id_in_calldata(&request.data);
                self.oracle_queries.lock().unwrap().push(claim_id);
                if *self.fail_oracle_for.lock().unwrap() == Some(claim_id) {
                    return Err(RpcError::Node {
                        code: 3,
                        message: "execution reverted".to_string(),
                    });
                }
                let code = self
                    .eligibility
                    .lock()
                    .unwrap()
                    .get(&claim_id)
                    .copied()
                    .unwrap_or(0);
                Ok(U256::from(code).to_be_bytes::<32>().to_vec())
            } else if head == selector(REQUIRED_DEPOSIT_SIG).as_slice() {
                let mut fail_next = self.fail_next_deposit.lock().unwrap();
                if *fail_next {
                    *fail_next = false;
                    return Err(RpcError::Node {
                        code: -32000,
                        message: "connection reset".to_string(),
                    });
                }
                Ok(self.deposit.lock().unwrap().to_be_bytes::<32>().to_vec())
            } else {
                Err(RpcError::Node {
                    code: -32601,
                    message: "unknown selector".to_string(),
                })
            }
        }

        async fn send_transaction(&self, request: &CallRequest) -> Result<B256, RpcError> {
            if *self.reject_sends.lock().unwrap() {
                return Err(RpcError::Node {
                    code: -32010,
                    message: "insufficient funds".to_string(),
                });
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(request.clone());
            Ok(B256::repeat_byte(sent.len() as u8))
        }
    }

    fn topic_word(claim_id: u64) -> B256 {
        B256::from(U256::from(claim_id).to_be_bytes::<32>())
    }

    fn minted_log(claim_id: u64, block: u64) -> RawLog {
        let mut data = AbiEncoder::new();
        data.push_address(Address::ZERO);
        data.push_address(Address::repeat_byte(0x22));
        data.push_bytes(&[0xab, 0xcd]);
        data.push_uint(U256::from(200_000u64));
        data.push_uint(U256::from(1_900_000_000u64));
        data.push_uint(U256::from(10u64));

        RawLog {
            address: CONTRACT,
            topics: vec![EventKind::Minted.topic(), topic_word(claim_id)],
            data: data.finish(),
            block_number: block,
        }
    }

    fn bound_log(claim_id: u64, block: u64) -> RawLog {
        let mut data = AbiEncoder::new();
        data.push_address(Address::repeat_byte(0x77));
        data.push_bytes(&[0x01, 0x02]);
        data.push_address(Address::repeat_byte(0x88));

        RawLog {
            address: CONTRACT,
            topics: vec![EventKind::Bound.topic(), topic_word(claim_id)],
            data: data.finish(),
            block_number: block,
        }
    }

    fn terminal_log(kind: EventKind, claim_id: u64, block: u64) -> RawLog {
        RawLog {
            address: CONTRACT,
            topics: vec![kind.topic(), topic_word(claim_id)],
            data: vec![],
            block_number: block,
        }
    }

    fn scheduler(client: Arc<MockLedgerClient>) -> SchedulerLoop {
        let ledger: Arc<dyn LedgerClient> = client;
        SchedulerLoop::new(
            ledger.clone(),
            LedgerReader::new(ledger.clone(), CONTRACT, 100),
            EligibilityOracle::new(ledger.clone(), CONTRACT),
            TransactionDispatcher::new(ledger, CONTRACT, GasPolicy::new(500_000, 5)),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_dispatch_on_eligible() {
        let client = Arc::new(MockLedgerClient::default());
        client.push_log(minted_log(1, 100));
        client.push_log(bound_log(1, 101));

        let report = scheduler(client.clone()).run_cycle().await.unwrap();

        assert_eq!(report.pending, 1);
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.failed, 0);

        let sent = client.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let request = &sent[0];
        assert_eq!(request.from, Some(CALLER));
        assert_eq!(request.to, CONTRACT);
        assert_eq!(request.gas, Some(500_000));
        assert_eq!(request.gas_price, Some(U256::from(5_000_000_000u64)));
        assert_eq!(request.value, None);
        assert_eq!(&request.data[..4], selector(EXECUTE_SIG).as_slice());
        assert_eq!(claim_id_in_calldata(&request.data), 1);
    }

    #[tokio::test]
    async fn test_dispatch_forwards_claim_fields_unmodified() {
        let client = Arc::new(MockLedgerClient::default());
        client.push_log(minted_log(1, 100));
        client.push_log(bound_log(1, 101));
        *client.deposit.lock().unwrap() = U256::from(1_000u64);

        scheduler(client.clone()).run_cycle().await.unwrap();

        // Rebuild the expected calldata from the same claim fields the mock
        // logs carry.
        let mut args = AbiEncoder::new();
        args.push_address(Address::repeat_byte(0x77)); // trigger
        args.push_bytes(&[0x01, 0x02]); // trigger payload
        args.push_address(Address::repeat_byte(0x22)); // user proxy
        args.push_bytes(&[0xab, 0xcd]); // execute payload
        args.push_uint(U256::from(200_000u64)); // execute gas
        args.push_uint(U256::from(1u64)); // claim id
        args.push_uint(U256::from(1_900_000_000u64)); // expiry
        args.push_uint(U256::from(10u64)); // executor fee
        let mut expected = selector(EXECUTE_SIG).to_vec();
        expected.extend_from_slice(&args.finish());

        let sent = client.sent.lock().unwrap();
        assert_eq!(sent[0].data, expected);
        assert_eq!(sent[0].value, Some(U256::from(1_000u64)));
    }

    #[tokio::test]
    async fn test_continue_on_ineligible() {
        // Three pending claims, the second ineligible: the third must still
        // be evaluated and dispatched.
        let client = Arc::new(MockLedgerClient::default());
        for id in 1..=3 {
            client.push_log(minted_log(id, 100));
            client.push_log(bound_log(id, 101));
        }
        client.set_status(2, 4);

        let report = scheduler(client.clone()).run_cycle().await.unwrap();

        assert_eq!(report.pending, 3);
        assert_eq!(report.dispatched, 2);
        assert_eq!(report.ineligible, 1);
        assert_eq!(client.oracle_queries.lock().unwrap().as_slice(), &[1, 2, 3]);
        assert_eq!(client.sent_claim_ids(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_unbound_claim_is_never_evaluated() {
        let client = Arc::new(MockLedgerClient::default());
        client.push_log(minted_log(1, 100));

        let report = scheduler(client.clone()).run_cycle().await.unwrap();

        assert_eq!(report.pending, 1);
        assert_eq!(report.skipped_unbound, 1);
        assert_eq!(report.dispatched, 0);
        assert!(client.oracle_queries.lock().unwrap().is_empty());
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finalized_claim_is_not_redispatched() {
        let client = Arc::new(MockLedgerClient::default());
        client.push_log(minted_log(1, 100));
        client.push_log(bound_log(1, 101));

        let scheduler = scheduler(client.clone());

        let first = scheduler.run_cycle().await.unwrap();
        assert_eq!(first.dispatched, 1);

        // The execution's terminal event lands before the next scan.
        client.push_log(terminal_log(EventKind::Finalized, 1, 102));

        let second = scheduler.run_cycle().await.unwrap();
        assert_eq!(second.pending, 0);
        assert_eq!(second.dispatched, 0);
        assert_eq!(client.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_bind() {
        let client = Arc::new(MockLedgerClient::default());
        client.push_log(minted_log(2, 100));
        client.push_log(terminal_log(EventKind::Cancelled, 2, 100));

        let report = scheduler(client.clone()).run_cycle().await.unwrap();

        assert_eq!(report.pending, 0);
        assert!(client.oracle_queries.lock().unwrap().is_empty());
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_failure_aborts_cycle() {
        let client = Arc::new(MockLedgerClient::default());
        client.push_log(minted_log(1, 100));
        client.push_log(bound_log(1, 101));
        *client.fail_get_logs.lock().unwrap() = true;

        let err = scheduler(client.clone()).run_cycle().await.unwrap_err();

        assert!(matches!(err, ExecutorError::LedgerUnavailable { .. }));
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orphan_bind_aborts_cycle() {
        let client = Arc::new(MockLedgerClient::default());
        client.push_log(bound_log(5, 101));

        let err = scheduler(client.clone()).run_cycle().await.unwrap_err();

        assert!(matches!(
            err,
            ExecutorError::OrphanBindEvent { claim_id } if claim_id.0 == 5
        ));
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oracle_failure_counts_as_not_eligible_this_cycle() {
        // The oracle call reverts for the second of three claims; the
        // failure is per-claim and the remaining claims still dispatch.
        let client = Arc::new(MockLedgerClient::default());
        for id in 1..=3 {
            client.push_log(minted_log(id, 100));
            client.push_log(bound_log(id, 101));
        }
        *client.fail_oracle_for.lock().unwrap() = Some(2);

        let report = scheduler(client.clone()).run_cycle().await.unwrap();

        assert_eq!(report.pending, 3);
        assert_eq!(report.dispatched, 2);
        assert_eq!(report.ineligible, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(client.oracle_queries.lock().unwrap().as_slice(), &[1, 2, 3]);
        assert_eq!(client.sent_claim_ids(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_deposit_query_failure_leaves_claim_pending() {
        // The deposit lookup fails for the first claim only; that claim is
        // skipped this cycle and the second still dispatches.
        let client = Arc::new(MockLedgerClient::default());
        for id in 1..=2 {
            client.push_log(minted_log(id, 100));
            client.push_log(bound_log(id, 101));
        }
        *client.fail_next_deposit.lock().unwrap() = true;

        let report = scheduler(client.clone()).run_cycle().await.unwrap();

        assert_eq!(report.dispatched, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(client.oracle_queries.lock().unwrap().as_slice(), &[1, 2]);
        assert_eq!(client.sent_claim_ids(), vec![2]);
    }

    #[tokio::test]
    async fn test_rejected_dispatch_does_not_stop_the_cycle() {
        let client = Arc::new(MockLedgerClient::default());
        for id in 1..=2 {
            client.push_log(minted_log(id, 100));
            client.push_log(bound_log(id, 101));
        }
        *client.reject_sends.lock().unwrap() = true;

        let report = scheduler(client.clone()).run_cycle().await.unwrap();

        // Both claims were evaluated and attempted; both stayed pending.
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(client.oracle_queries.lock().unwrap().as_slice(), &[1, 2]);
    }

    #[tokio::test]
    async fn test_one_shot_mode_runs_exactly_one_cycle() {
        let client = Arc::new(MockLedgerClient::default());
        client.push_log(minted_log(1, 100));
        client.push_log(bound_log(1, 101));

        scheduler(client.clone()).run(RunMode::OneShot).await.unwrap();

        assert_eq!(client.sent.lock().unwrap().len(), 1);
    }
}
