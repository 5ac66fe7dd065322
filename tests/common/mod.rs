//! Shared fakes and mock backends for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use url::Url;

use stakeflow::blockchain::client::{RpcClient, RpcConnector};
use stakeflow::blockchain::confirmation::ConfirmationTracker;
use stakeflow::blockchain::instructions::StakePoolProgram;
use stakeflow::blockchain::transaction::TransactionSubmitter;
use stakeflow::blockchain::types::{
    AccountData, Address, Blockhash, Commitment, RpcError, RpcResult, SignatureStatus, LAMPORTS_PER_SOL,
};
use stakeflow::blockchain::wallet::{SignedTransaction, UnsignedTransaction, WalletError, WalletSigner};
use stakeflow::endpoints::EndpointSelector;
use stakeflow::health::{ConnectivityMonitor, InterfaceSignal};
use stakeflow::resilience::RetryPolicy;
use stakeflow::staking::{AmountLimits, StakingOperationOrchestrator};

pub const USER: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";
pub const PROGRAM: &str = "AH6kLi3PTnRqEqFpNELtBPgnyhdZZSeMeowqPK9aGQ4W";
pub const POOL: &str = "CFXepqvtoz7oPno4vTvqrVp2Vzt43vUebSJpEaqzGoJA";
pub const PROBE_URL: &str = "https://probe.example/";

pub const BLOCKHASH: &str = "GHtXQBsoZHVnNFa9YevAzFr17DJjgHXk3ycTKD5xD3Zi";
pub const START_HEIGHT: u64 = 1_000;
pub const EXPIRY_HEIGHT: u64 = 1_150;

pub fn address(value: &str) -> Address {
    Address::parse(value).unwrap()
}

pub fn url(value: &str) -> Url {
    Url::parse(value).unwrap()
}

pub fn transient(message: &str) -> RpcError {
    RpcError::Transient(message.to_string())
}

pub fn rate_limited() -> RpcError {
    RpcError::RateLimited("HTTP 429".to_string())
}

pub fn landed(level: Commitment) -> SignatureStatus {
    SignatureStatus {
        slot: 42,
        confirmations: Some(1),
        err: None,
        confirmation_status: Some(level),
    }
}

/// Pool account owned by the test program, holding the given state.
pub fn pool_account(total_staked: u64, reward_rate: u64, last_update_time: i64) -> AccountData {
    let mut data = Vec::with_capacity(24);
    data.extend_from_slice(&total_staked.to_le_bytes());
    data.extend_from_slice(&reward_rate.to_le_bytes());
    data.extend_from_slice(&last_update_time.to_le_bytes());
    AccountData {
        owner: PROGRAM.to_string(),
        lamports: 2_039_280,
        data,
    }
}

pub fn failed_on_chain(err: Value) -> SignatureStatus {
    SignatureStatus {
        slot: 42,
        confirmations: Some(1),
        err: Some(err),
        confirmation_status: Some(Commitment::Confirmed),
    }
}

/// Retry policy without jitter, so delays are exact.
pub fn policy(max_attempts: u32, base_ms: u64, max_ms: u64, timeout: Duration) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(base_ms),
        Duration::from_millis(max_ms),
        timeout,
    )
    .without_jitter()
}

pub fn selection_policy() -> RetryPolicy {
    policy(3, 1_000, 8_000, Duration::from_secs(120))
}

pub fn submission_policy() -> RetryPolicy {
    policy(4, 250, 4_000, Duration::from_secs(15))
}

pub fn confirmation_policy() -> RetryPolicy {
    policy(6, 500, 16_000, Duration::from_secs(15))
}

pub fn tracker() -> ConfirmationTracker {
    ConfirmationTracker::new(
        confirmation_policy(),
        Commitment::Confirmed,
        Duration::from_secs(2),
        Duration::from_secs(90),
    )
}

// --- Fake RPC ---

struct Script<T> {
    queue: VecDeque<RpcResult<T>>,
    fallback: RpcResult<T>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: RpcResult<T>) -> Mutex<Self> {
        Mutex::new(Self {
            queue: VecDeque::new(),
            fallback,
        })
    }

    fn next(&mut self) -> RpcResult<T> {
        self.queue.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

/// Scripted RPC node. Each method answers from its queue, then from its fallback.
pub struct FakeRpc {
    url: Url,
    health: Mutex<Script<()>>,
    block_height: Mutex<Script<u64>>,
    blockhash: Mutex<Script<Blockhash>>,
    send: Mutex<Script<()>>,
    status: Mutex<Script<Option<SignatureStatus>>>,
    history: Mutex<Script<Option<SignatureStatus>>>,
    balance: Mutex<Script<u64>>,
    account: Mutex<Script<Option<AccountData>>>,
    /// Signature echoed by `sendTransaction` instead of the signed one.
    echoed_signature: Mutex<Option<String>>,
    probe_delay: Mutex<Duration>,
    calls: Mutex<Vec<(&'static str, Instant)>>,
    sent: Mutex<Vec<SignedTransaction>>,
}

impl FakeRpc {
    pub fn new(endpoint: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url(endpoint),
            health: Script::new(Ok(())),
            block_height: Script::new(Ok(START_HEIGHT)),
            blockhash: Script::new(Ok(Blockhash {
                blockhash: BLOCKHASH.to_string(),
                last_valid_block_height: EXPIRY_HEIGHT,
            })),
            send: Script::new(Ok(())),
            status: Script::new(Ok(None)),
            history: Script::new(Ok(None)),
            balance: Script::new(Ok(10 * LAMPORTS_PER_SOL)),
            account: Script::new(Ok(None)),
            echoed_signature: Mutex::new(None),
            probe_delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// An endpoint whose every call fails with `error`.
    pub fn down(endpoint: &str, error: RpcError) -> Arc<Self> {
        let fake = Self::new(endpoint);
        fake.set_health(Err(error.clone()));
        fake.set_block_height(Err(error.clone()));
        fake.set_blockhash(Err(error.clone()));
        fake.set_send(Err(error.clone()));
        fake.set_status(Err(error.clone()));
        fake.set_history(Err(error.clone()));
        fake.set_balance(Err(error.clone()));
        fake.set_account(Err(error));
        fake
    }

    pub fn set_health(&self, result: RpcResult<()>) {
        self.health.lock().unwrap().fallback = result;
    }

    pub fn set_block_height(&self, result: RpcResult<u64>) {
        self.block_height.lock().unwrap().fallback = result;
    }

    pub fn queue_block_height(&self, results: Vec<RpcResult<u64>>) {
        self.block_height.lock().unwrap().queue.extend(results);
    }

    pub fn set_blockhash(&self, result: RpcResult<Blockhash>) {
        self.blockhash.lock().unwrap().fallback = result;
    }

    pub fn set_send(&self, result: RpcResult<()>) {
        self.send.lock().unwrap().fallback = result;
    }

    pub fn queue_send(&self, results: Vec<RpcResult<()>>) {
        self.send.lock().unwrap().queue.extend(results);
    }

    pub fn set_status(&self, result: RpcResult<Option<SignatureStatus>>) {
        self.status.lock().unwrap().fallback = result;
    }

    pub fn queue_status(&self, results: Vec<RpcResult<Option<SignatureStatus>>>) {
        self.status.lock().unwrap().queue.extend(results);
    }

    pub fn set_history(&self, result: RpcResult<Option<SignatureStatus>>) {
        self.history.lock().unwrap().fallback = result;
    }

    pub fn queue_history(&self, results: Vec<RpcResult<Option<SignatureStatus>>>) {
        self.history.lock().unwrap().queue.extend(results);
    }

    pub fn set_balance(&self, result: RpcResult<u64>) {
        self.balance.lock().unwrap().fallback = result;
    }

    pub fn queue_balance(&self, results: Vec<RpcResult<u64>>) {
        self.balance.lock().unwrap().queue.extend(results);
    }

    pub fn set_account(&self, result: RpcResult<Option<AccountData>>) {
        self.account.lock().unwrap().fallback = result;
    }

    pub fn queue_account(&self, results: Vec<RpcResult<Option<AccountData>>>) {
        self.account.lock().unwrap().queue.extend(results);
    }

    /// Answer successful sends with `signature` rather than the transaction's own.
    pub fn echo_signature(&self, signature: &str) {
        *self.echoed_signature.lock().unwrap() = Some(signature.to_string());
    }

    /// Delay every `getBlockHeight` answer.
    pub fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(m, _)| *m == method).count()
    }

    pub fn call_times(&self, method: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| *m == method)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<SignedTransaction> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str) {
        self.calls.lock().unwrap().push((method, Instant::now()));
    }
}

#[async_trait]
impl RpcClient for FakeRpc {
    fn url(&self) -> &Url {
        &self.url
    }

    async fn get_health(&self) -> RpcResult<()> {
        self.record("getHealth");
        self.health.lock().unwrap().next()
    }

    async fn get_block_height(&self, _commitment: Commitment) -> RpcResult<u64> {
        self.record("getBlockHeight");
        let delay = *self.probe_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.block_height.lock().unwrap().next()
    }

    async fn get_latest_blockhash(&self, _commitment: Commitment) -> RpcResult<Blockhash> {
        self.record("getLatestBlockhash");
        self.blockhash.lock().unwrap().next()
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> RpcResult<String> {
        self.record("sendTransaction");
        self.sent.lock().unwrap().push(tx.clone());
        let echoed = self.echoed_signature.lock().unwrap().clone();
        self.send
            .lock()
            .unwrap()
            .next()
            .map(|()| echoed.unwrap_or_else(|| tx.signature.clone()))
    }

    async fn get_signature_status(
        &self,
        _signature: &str,
        search_history: bool,
    ) -> RpcResult<Option<SignatureStatus>> {
        if search_history {
            self.record("getSignatureStatuses/history");
            self.history.lock().unwrap().next()
        } else {
            self.record("getSignatureStatuses");
            self.status.lock().unwrap().next()
        }
    }

    async fn get_balance(&self, _address: &str, _commitment: Commitment) -> RpcResult<u64> {
        self.record("getBalance");
        self.balance.lock().unwrap().next()
    }

    async fn get_account_info(&self, _address: &str, _commitment: Commitment) -> RpcResult<Option<AccountData>> {
        self.record("getAccountInfo");
        self.account.lock().unwrap().next()
    }
}

/// Hands out registered fakes by URL; unknown URLs get a healthy default.
pub struct FakeConnector {
    fakes: Mutex<HashMap<String, Arc<FakeRpc>>>,
}

impl FakeConnector {
    pub fn new(fakes: &[Arc<FakeRpc>]) -> Arc<Self> {
        let map = fakes
            .iter()
            .map(|fake| (fake.url().as_str().to_string(), fake.clone()))
            .collect();
        Arc::new(Self { fakes: Mutex::new(map) })
    }

    pub fn get(&self, endpoint: &str) -> Arc<FakeRpc> {
        let key = url(endpoint).as_str().to_string();
        self.fakes
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert_with(|| FakeRpc::new(&key))
            .clone()
    }
}

impl RpcConnector for FakeConnector {
    fn connect(&self, url: &Url) -> Arc<dyn RpcClient> {
        self.get(url.as_str())
    }
}

// --- Fake wallet ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletBehavior {
    Sign,
    Reject,
    Unavailable,
}

pub struct FakeWallet {
    key: Address,
    behavior: Mutex<WalletBehavior>,
    requests: Mutex<Vec<UnsignedTransaction>>,
}

impl FakeWallet {
    pub fn new(key: &str) -> Arc<Self> {
        Arc::new(Self {
            key: address(key),
            behavior: Mutex::new(WalletBehavior::Sign),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_behavior(&self, behavior: WalletBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn requests(&self) -> Vec<UnsignedTransaction> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletSigner for FakeWallet {
    fn public_key(&self) -> &Address {
        &self.key
    }

    async fn sign_transaction(&self, tx: UnsignedTransaction) -> Result<SignedTransaction, WalletError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(tx);
            requests.len()
        };
        match *self.behavior.lock().unwrap() {
            WalletBehavior::Sign => Ok(SignedTransaction {
                signature: format!("sig{}", n),
                wire_bytes: vec![n as u8; 8],
            }),
            WalletBehavior::Reject => Err(WalletError::UserRejected),
            WalletBehavior::Unavailable => Err(WalletError::Unavailable("wallet locked".to_string())),
        }
    }
}

/// Interface signal flipped by the test.
pub struct FakeSignal {
    route: AtomicBool,
}

impl FakeSignal {
    pub fn new(route: bool) -> Arc<Self> {
        Arc::new(Self {
            route: AtomicBool::new(route),
        })
    }

    pub fn set(&self, route: bool) {
        self.route.store(route, Ordering::SeqCst);
    }
}

#[async_trait]
impl InterfaceSignal for FakeSignal {
    async fn has_route(&self) -> bool {
        self.route.load(Ordering::SeqCst)
    }
}

// --- Assembled pipeline ---

pub struct Harness {
    pub connector: Arc<FakeConnector>,
    pub endpoints: Vec<Arc<FakeRpc>>,
    pub probe: Arc<FakeRpc>,
    pub signal: Arc<FakeSignal>,
    pub wallet: Arc<FakeWallet>,
    pub selector: Arc<EndpointSelector>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub orchestrator: StakingOperationOrchestrator,
}

impl Harness {
    /// Calls made to any endpoint candidate.
    pub fn endpoint_calls(&self) -> usize {
        self.endpoints.iter().map(|e| e.total_calls()).sum()
    }
}

/// Full pipeline over fakes, one `FakeRpc` per endpoint URL.
pub fn harness(endpoints: Vec<Arc<FakeRpc>>) -> Harness {
    let probe = FakeRpc::new(PROBE_URL);
    let mut all = endpoints.clone();
    all.push(probe.clone());
    let connector = FakeConnector::new(&all);

    let candidates = endpoints.iter().map(|e| e.url().clone()).collect();
    let selector = Arc::new(EndpointSelector::new(
        connector.clone(),
        candidates,
        Duration::from_secs(30),
        selection_policy(),
    ));

    let signal = FakeSignal::new(true);
    let monitor = Arc::new(
        ConnectivityMonitor::new(signal.clone(), probe.clone(), Duration::from_secs(5), Duration::from_secs(15))
            .with_selector(selector.clone()),
    );

    let wallet = FakeWallet::new(USER);
    let sdk = Arc::new(StakePoolProgram::new(address(PROGRAM), address(POOL)));
    let submitter = TransactionSubmitter::new(wallet.clone(), sdk, submission_policy());

    let orchestrator = StakingOperationOrchestrator::new(
        monitor.clone(),
        selector.clone(),
        submitter,
        tracker(),
        AmountLimits::default(),
    );

    Harness {
        connector,
        endpoints,
        probe,
        signal,
        wallet,
        selector,
        monitor,
        orchestrator,
    }
}

// --- Raw TCP JSON-RPC backend ---

pub fn rpc_result(result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}

pub fn rpc_error(code: i64, message: &str) -> String {
    json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": code, "message": message } }).to_string()
}

/// Start a programmable JSON-RPC backend on an ephemeral port.
///
/// The handler receives the decoded request body and returns the HTTP status
/// and response body.
pub async fn start_rpc_backend<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request_body(&mut socket).await else {
                            return;
                        };
                        let (status, body) = handler(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            401 => "401 Unauthorized",
                            403 => "403 Forbidden",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request_body(socket: &mut TcpStream) -> Option<Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    serde_json::from_slice(&buf[header_end..header_end + content_length]).ok()
}
