//! Deterministic in-memory chain.

use crate::chain::{
    ChainAdapter, ChainError, ChainFuture, ChainResult, EventLog, Receipt, TxHandle, TxRequest,
    TxStatus,
};
use ignis_core::{Address, TxHash, Value};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

const PROXY_CONTRACT: &str = "TransparentUpgradeableProxy";
const PROXY_ADMIN_CONTRACT: &str = "ProxyAdmin";

/// A contract living on the mock chain.
#[derive(Debug, Clone)]
struct Deployed {
    name: String,
    owner: Option<Address>,
    implementation: Option<Address>,
    admin: Option<Address>,
}

#[derive(Debug, Clone)]
struct MockTx {
    from: Address,
    receipt: Receipt,
    mined_block: Option<u64>,
}

#[derive(Debug, Default)]
struct Faults {
    reject_deployments: HashSet<String>,
    reject_calls: HashSet<String>,
    stall_deployments: HashSet<String>,
    revert_calls: HashSet<String>,
}

#[derive(Debug, Default)]
struct MockState {
    block: u64,
    nonces: HashMap<Address, u64>,
    transactions: HashMap<TxHash, MockTx>,
    contracts: HashMap<Address, Deployed>,
    submissions: Vec<TxRequest>,
    faults: Faults,
    in_flight: HashMap<TxHash, Address>,
    max_in_flight: usize,
    max_in_flight_per_sender: usize,
}

impl MockState {
    fn next_nonce(&mut self, from: Address) -> u64 {
        let nonce = self.nonces.entry(from).or_insert(0);
        let current = *nonce;
        *nonce += 1;
        current
    }

    fn track_in_flight(&mut self, hash: TxHash, from: Address) {
        self.in_flight.insert(hash, from);
        self.max_in_flight = self.max_in_flight.max(self.in_flight.len());
        let per_sender = self.in_flight.values().filter(|s| **s == from).count();
        self.max_in_flight_per_sender = self.max_in_flight_per_sender.max(per_sender);
    }

    fn status(&self, hash: &TxHash) -> TxStatus {
        match self.transactions.get(hash) {
            None => TxStatus::NotFound,
            Some(MockTx {
                mined_block: None, ..
            }) => TxStatus::Pending,
            Some(MockTx {
                receipt,
                mined_block: Some(mined),
                ..
            }) => TxStatus::Mined {
                receipt: receipt.clone(),
                confirmations: self.block.saturating_sub(*mined) + 1,
            },
        }
    }

    fn mine(&mut self, hash: TxHash) {
        self.block += 1;
        let block = self.block;
        if let Some(tx) = self.transactions.get_mut(&hash) {
            tx.mined_block = Some(block);
            tx.receipt.block_number = block;
        }
    }

    /// Execute a deployment and build its receipt.
    fn deploy(
        &mut self,
        hash: TxHash,
        from: Address,
        nonce: u64,
        contract: &str,
        args: &[Value],
    ) -> Receipt {
        let address = derive_address(&[from.as_bytes(), &nonce.to_le_bytes()]);
        let mut logs = Vec::new();
        let mut deployed = Deployed {
            name: contract.to_string(),
            owner: Some(from),
            implementation: None,
            admin: None,
        };

        if contract == PROXY_CONTRACT {
            let implementation = args.first().and_then(Value::as_address);
            let owner = args.get(1).and_then(Value::as_address).unwrap_or(from);
            let admin = derive_address(&[address.as_bytes(), b"admin"]);

            self.contracts.insert(
                admin,
                Deployed {
                    name: PROXY_ADMIN_CONTRACT.to_string(),
                    owner: Some(owner),
                    implementation: None,
                    admin: None,
                },
            );
            deployed.implementation = implementation;
            deployed.admin = Some(admin);

            if let Some(implementation) = implementation {
                logs.push(EventLog::new(address, "Upgraded").with_arg("implementation", implementation));
            }
            logs.push(
                EventLog::new(admin, "OwnershipTransferred")
                    .with_arg("previousOwner", Address::ZERO)
                    .with_arg("newOwner", owner),
            );
            logs.push(
                EventLog::new(address, "AdminChanged")
                    .with_arg("previousAdmin", Address::ZERO)
                    .with_arg("newAdmin", admin),
            );
        }

        self.contracts.insert(address, deployed);
        Receipt {
            tx_hash: hash,
            from,
            block_number: 0,
            success: true,
            contract_address: Some(address),
            logs,
            revert_reason: None,
        }
    }

    /// Execute a call and build its receipt.
    fn call(
        &mut self,
        hash: TxHash,
        from: Address,
        to: Address,
        method: &str,
        args: &[Value],
    ) -> Receipt {
        let mut receipt = Receipt {
            tx_hash: hash,
            from,
            block_number: 0,
            success: true,
            contract_address: None,
            logs: Vec::new(),
            revert_reason: None,
        };

        let revert = |receipt: &mut Receipt, reason: String| {
            receipt.success = false;
            receipt.revert_reason = Some(reason);
        };

        if self.faults.revert_calls.contains(method) {
            revert(&mut receipt, format!("{} reverted", method));
            return receipt;
        }

        let Some(target) = self.contracts.get(&to).cloned() else {
            revert(&mut receipt, format!("no contract at {}", to));
            return receipt;
        };

        if target.name == PROXY_ADMIN_CONTRACT && method == "upgradeAndCall" {
            if target.owner != Some(from) {
                revert(&mut receipt, format!("OwnableUnauthorizedAccount({})", from));
                return receipt;
            }
            let proxy = args.first().and_then(Value::as_address);
            let implementation = args.get(1).and_then(Value::as_address);
            let (Some(proxy), Some(implementation)) = (proxy, implementation) else {
                revert(&mut receipt, "upgradeAndCall expects (proxy, implementation, data)".into());
                return receipt;
            };
            match self.contracts.get_mut(&proxy) {
                Some(p) if p.admin == Some(to) => {
                    p.implementation = Some(implementation);
                    receipt.logs.push(
                        EventLog::new(proxy, "Upgraded").with_arg("implementation", implementation),
                    );
                }
                _ => revert(&mut receipt, format!("{} is not administered by {}", proxy, to)),
            }
        }

        receipt
    }
}

/// Decrements the in-flight set when a confirmation wait ends or is dropped.
struct InFlightGuard<'a> {
    state: &'a Mutex<MockState>,
    hash: TxHash,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().in_flight.remove(&self.hash);
    }
}

/// Deterministic in-memory ledger implementing [`ChainAdapter`].
///
/// Transactions are mined as soon as they are submitted, one block each,
/// and every confirmation poll mines another empty block. Accounts and
/// contract addresses are derived from SHA-256 so runs are reproducible.
///
/// Deploying a `TransparentUpgradeableProxy` behaves like the OpenZeppelin
/// v5 proxy: it creates a `ProxyAdmin` owned by the second constructor
/// argument and emits `Upgraded`, `OwnershipTransferred` and
/// `AdminChanged`. `ProxyAdmin.upgradeAndCall` checks the caller is the
/// owner before switching the implementation.
pub struct MockChain {
    accounts: Vec<Address>,
    latency: Duration,
    state: Mutex<MockState>,
}

impl MockChain {
    /// A chain with `count` funded accounts.
    pub fn new(count: usize) -> Self {
        let accounts = (0..count)
            .map(|i| derive_address(&[b"ignis-mock-account", &(i as u64).to_le_bytes()]))
            .collect();
        Self {
            accounts,
            latency: Duration::ZERO,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Delay every confirmation wait by `latency` before the first poll.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The signer accounts.
    pub fn account_list(&self) -> &[Address] {
        &self.accounts
    }

    /// Reject every deployment of `contract` at submission.
    pub fn reject_deployments_of(&self, contract: &str) {
        self.state
            .lock()
            .faults
            .reject_deployments
            .insert(contract.to_string());
    }

    /// Reject every call of `method` at submission.
    pub fn reject_calls_to(&self, method: &str) {
        self.state.lock().faults.reject_calls.insert(method.to_string());
    }

    /// Accept deployments of `contract` but never mine them.
    pub fn stall_deployments_of(&self, contract: &str) {
        self.state
            .lock()
            .faults
            .stall_deployments
            .insert(contract.to_string());
    }

    /// Mine calls of `method` as reverted.
    pub fn revert_calls_to(&self, method: &str) {
        self.state.lock().faults.revert_calls.insert(method.to_string());
    }

    /// Remove every injected fault. Stalled transactions stay pending.
    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    /// Mine every pending transaction.
    pub fn release_stalled(&self) {
        let mut state = self.state.lock();
        let mut pending: Vec<TxHash> = state
            .transactions
            .iter()
            .filter(|(_, tx)| tx.mined_block.is_none())
            .map(|(hash, _)| *hash)
            .collect();
        pending.sort();
        for hash in pending {
            state.mine(hash);
        }
    }

    /// Drop a transaction, as if it fell out of the mempool.
    pub fn forget_transaction(&self, hash: &TxHash) {
        self.state.lock().transactions.remove(hash);
    }

    /// Every accepted submission, in order.
    pub fn submissions(&self) -> Vec<TxRequest> {
        self.state.lock().submissions.clone()
    }

    /// Number of accepted submissions.
    pub fn submission_count(&self) -> usize {
        self.state.lock().submissions.len()
    }

    /// Number of accepted deployments of `contract`.
    pub fn deployments_of(&self, contract: &str) -> usize {
        self.state
            .lock()
            .submissions
            .iter()
            .filter(|req| matches!(req, TxRequest::Deploy { contract: c, .. } if c == contract))
            .count()
    }

    /// Number of accepted calls of `method`.
    pub fn calls_to(&self, method: &str) -> usize {
        self.state
            .lock()
            .submissions
            .iter()
            .filter(|req| matches!(req, TxRequest::Call { method: m, .. } if m == method))
            .count()
    }

    /// Most transactions awaiting confirmation at once.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    /// Most transactions from one sender awaiting confirmation at once.
    pub fn max_in_flight_per_sender(&self) -> usize {
        self.state.lock().max_in_flight_per_sender
    }

    /// Current block height.
    pub fn block_number(&self) -> u64 {
        self.state.lock().block
    }

    /// Name of the contract deployed at `address`.
    pub fn contract_name(&self, address: &Address) -> Option<String> {
        self.state.lock().contracts.get(address).map(|c| c.name.clone())
    }

    /// Current implementation behind a proxy.
    pub fn implementation_of(&self, proxy: &Address) -> Option<Address> {
        self.state
            .lock()
            .contracts
            .get(proxy)
            .and_then(|c| c.implementation)
    }

    /// Admin contract of a proxy.
    pub fn admin_of(&self, proxy: &Address) -> Option<Address> {
        self.state.lock().contracts.get(proxy).and_then(|c| c.admin)
    }

    /// Owner of a contract.
    pub fn owner_of(&self, address: &Address) -> Option<Address> {
        self.state.lock().contracts.get(address).and_then(|c| c.owner)
    }

    fn check_sender(&self, from: Address) -> ChainResult<()> {
        if self.accounts.contains(&from) {
            Ok(())
        } else {
            Err(ChainError::Rejected(format!("unknown account {}", from)))
        }
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new(4)
    }
}

impl std::fmt::Debug for MockChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockChain")
            .field("accounts", &self.accounts.len())
            .field("block", &state.block)
            .field("transactions", &state.transactions.len())
            .finish()
    }
}

impl ChainAdapter for MockChain {
    fn accounts(&self) -> ChainFuture<'_, Vec<Address>> {
        Box::pin(async move { Ok(self.accounts.clone()) })
    }

    fn submit(&self, request: TxRequest) -> ChainFuture<'_, TxHandle> {
        Box::pin(async move {
            let from = request.from();
            self.check_sender(from)?;

            let mut state = self.state.lock();
            match &request {
                TxRequest::Deploy { contract, .. }
                    if state.faults.reject_deployments.contains(contract) =>
                {
                    return Err(ChainError::Rejected(format!(
                        "deployment of {} rejected",
                        contract
                    )));
                }
                TxRequest::Call { method, .. } if state.faults.reject_calls.contains(method) => {
                    return Err(ChainError::Rejected(format!("call to {} rejected", method)));
                }
                _ => {}
            }

            let nonce = state.next_nonce(from);
            let hash = TxHash::new(digest(&[b"tx", from.as_bytes(), &nonce.to_le_bytes()]));

            let (receipt, stalled) = match &request {
                TxRequest::Deploy { contract, args, .. } => (
                    state.deploy(hash, from, nonce, contract, args),
                    state.faults.stall_deployments.contains(contract),
                ),
                TxRequest::Call {
                    to, method, args, ..
                } => (state.call(hash, from, *to, method, args), false),
            };

            state.transactions.insert(
                hash,
                MockTx {
                    from,
                    receipt,
                    mined_block: None,
                },
            );
            if !stalled {
                state.mine(hash);
            }
            state.track_in_flight(hash, from);
            state.submissions.push(request);

            tracing::debug!(tx_hash = %hash, from = %from, nonce, stalled, "Mock transaction accepted");
            Ok(TxHandle::new(hash, from))
        })
    }

    fn wait_for_confirmation<'a>(
        &'a self,
        handle: &'a TxHandle,
        required: u64,
        poll_interval: Duration,
    ) -> ChainFuture<'a, Receipt> {
        Box::pin(async move {
            let _guard = InFlightGuard {
                state: &self.state,
                hash: handle.hash,
            };
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            loop {
                let status = self.state.lock().status(&handle.hash);
                match status {
                    TxStatus::NotFound => {
                        return Err(ChainError::NotFound(format!("transaction {}", handle.hash)));
                    }
                    TxStatus::Mined {
                        receipt,
                        confirmations,
                    } if confirmations >= required => return Ok(receipt),
                    TxStatus::Mined { .. } | TxStatus::Pending => {}
                }

                tokio::time::sleep(poll_interval).await;
                self.state.lock().block += 1;
            }
        })
    }

    fn transaction_status<'a>(&'a self, hash: &'a TxHash) -> ChainFuture<'a, TxStatus> {
        Box::pin(async move { Ok(self.state.lock().status(hash)) })
    }

    fn read_address<'a>(&'a self, handle: &'a TxHandle) -> ChainFuture<'a, Address> {
        Box::pin(async move {
            let state = self.state.lock();
            let tx = state
                .transactions
                .get(&handle.hash)
                .filter(|tx| tx.mined_block.is_some())
                .ok_or_else(|| ChainError::NotFound(format!("receipt of {}", handle.hash)))?;
            if tx.from != handle.from {
                return Err(ChainError::Rejected(format!(
                    "transaction {} was not sent by {}",
                    handle.hash, handle.from
                )));
            }
            tx.receipt
                .contract_address
                .ok_or_else(|| ChainError::NotFound(format!("contract created by {}", handle.hash)))
        })
    }

    fn encode_call(&self, contract: &str, method: &str, args: &[Value]) -> ChainResult<Value> {
        let encoded_args = serde_json::to_vec(args)
            .map_err(|e| ChainError::Rejected(format!("cannot encode {}.{}: {}", contract, method, e)))?;
        let selector = digest(&[method.as_bytes()]);
        let mut data = selector[..4].to_vec();
        data.extend_from_slice(&digest(&[&encoded_args]));
        Ok(Value::bytes(&data))
    }
}

fn digest(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn derive_address(parts: &[&[u8]]) -> Address {
    Address::from_digest_tail(&digest(parts))
}
