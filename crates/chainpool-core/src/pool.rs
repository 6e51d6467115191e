//! Multi-provider pool with priority selection, circuit breaking, background
//! health checks and failover retries.
//!
//! Providers are ranked by their position in the configured list. Each call
//! goes to the best available provider; failures are recorded against that
//! provider and the next attempt re-selects after an exponential backoff.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::decode::{parse_hex_u128, parse_hex_u64};
use crate::error::{PoolError, TransportError};
use crate::policy::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryPolicy};
use crate::provider::{report_endpoint, Provider, ProviderSnapshot, ProviderStatus};
use crate::request::JsonRpcRequest;
use crate::transport::RpcTransport;

/// Configuration for the provider pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Delay between health-check rounds.
    pub health_check_interval: Duration,
    /// Circuit breaker config shared across all providers.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Attempts and backoff for [`RpcPool::execute`].
    pub retry: RetryConfig,
    /// Timeout per RPC call.
    pub request_timeout: Duration,
    /// Timeout per health probe.
    pub probe_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(60),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker.failure_threshold = threshold;
        self
    }

    pub fn with_open_duration(mut self, open_duration: Duration) -> Self {
        self.circuit_breaker.open_duration = open_duration;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(PoolError::InvalidConfig(
                "circuit breaker threshold must be at least 1".into(),
            ));
        }
        if self.health_check_interval.is_zero() {
            return Err(PoolError::InvalidConfig(
                "health check interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Aggregate and per-provider health, as returned by [`RpcPool::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub total_providers: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub failed: usize,
    pub circuit_open: usize,
    pub current_provider: Option<String>,
    pub providers: Vec<ProviderSnapshot>,
}

impl PoolStatus {
    /// Number of providers in `status`.
    pub fn count(&self, status: ProviderStatus) -> usize {
        match status {
            ProviderStatus::Healthy => self.healthy,
            ProviderStatus::Degraded => self.degraded,
            ProviderStatus::Failed => self.failed,
            ProviderStatus::CircuitOpen => self.circuit_open,
        }
    }
}

struct ProviderTable {
    providers: Vec<Provider>,
    /// Index of the provider chosen by the latest selection.
    current: Option<usize>,
}

/// The outcome of a selection, copied out so the lock can be released.
struct Selection {
    index: usize,
    endpoint: String,
}

struct PoolInner {
    table: Mutex<ProviderTable>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    config: PoolConfig,
    transport: Arc<dyn RpcTransport>,
}

/// Prioritised JSON-RPC provider pool for one chain.
///
/// Cheap to share behind an `Arc`. The provider table is guarded by a mutex
/// that is only held for selection and state transitions, never across
/// network I/O.
pub struct RpcPool {
    inner: Arc<PoolInner>,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl RpcPool {
    /// Build a pool over `endpoints`; list position is priority (0 = preferred).
    pub fn new(
        endpoints: Vec<String>,
        config: PoolConfig,
        transport: Arc<dyn RpcTransport>,
    ) -> Result<Self, PoolError> {
        if endpoints.is_empty() {
            return Err(PoolError::InvalidConfig(
                "at least one RPC endpoint is required".into(),
            ));
        }
        config.validate()?;

        let providers = endpoints
            .into_iter()
            .zip(0u32..)
            .map(|(endpoint, priority)| Provider::new(endpoint, priority))
            .collect::<Vec<_>>();
        tracing::info!(providers = providers.len(), "initialized RPC pool");

        Ok(Self {
            inner: Arc::new(PoolInner {
                table: Mutex::new(ProviderTable {
                    providers,
                    current: None,
                }),
                breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
                retry: RetryPolicy::new(config.retry.clone()),
                config,
                transport,
            }),
            health_task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Number of providers in the pool.
    pub fn len(&self) -> usize {
        self.inner.lock_table().providers.len()
    }

    /// Always `false`: construction rejects an empty endpoint list.
    pub fn is_empty(&self) -> bool {
        self.inner.lock_table().providers.is_empty()
    }

    /// Start the background health-check task. No-op if already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut slot = self.lock_task();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *slot = Some(tokio::spawn(health_check_loop(inner)));
        tracing::info!(
            interval_secs = self.inner.config.health_check_interval.as_secs(),
            "started RPC health check task"
        );
    }

    /// Stop the health-check task and wait until it has exited.
    ///
    /// Safe to call without [`start`](Self::start) and safe to call twice.
    /// An in-flight probe is dropped, releasing its connection.
    pub async fn stop(&self) {
        let handle = self.lock_task().take();
        if let Some(handle) = handle {
            handle.abort();
            match handle.await {
                Err(err) if err.is_panic() => {
                    tracing::error!(error = %err, "RPC health check task panicked");
                }
                _ => {}
            }
            tracing::info!("stopped RPC health check task");
        }
    }

    /// Returns `true` while the health-check task is running.
    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Probe every provider once, right now.
    pub async fn check_health_now(&self) {
        self.inner.check_all_providers().await;
    }

    /// Execute a JSON-RPC method with up to `max_retries` attempts, failing
    /// over between providers. Returns the response's `result`.
    ///
    /// Sleeps `initial_backoff * multiplier^attempt` between attempts (1s, 2s,
    /// 4s, ... by default), never after the last one.
    ///
    /// `max_retries` counts attempts, not retries after the first. Zero is
    /// clamped to a single attempt rather than failing without any request.
    pub async fn execute_with_failover(
        &self,
        method: &str,
        params: Vec<Value>,
        max_retries: u32,
    ) -> Result<Value, PoolError> {
        let attempts = max_retries.max(1);
        let req = JsonRpcRequest::new(method, params);
        let mut attempt = 0u32;
        loop {
            let selected = self.inner.select_provider()?;
            let err = match self.inner.send_once(&selected.endpoint, &req).await {
                Ok(result) => {
                    self.inner.record_success(selected.index);
                    return Ok(result);
                }
                Err(err) => err,
            };

            tracing::warn!(
                method,
                attempt = attempt + 1,
                attempts,
                endpoint = %report_endpoint(&selected.endpoint),
                error = %err,
                "RPC call failed"
            );
            self.inner.record_call_failure(selected.index);

            match self.inner.retry.backoff(attempt, attempts) {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    tracing::error!(method, attempts, error = %err, "RPC call retries exhausted");
                    return Err(PoolError::RetriesExhausted {
                        method: method.to_string(),
                        attempts,
                        endpoint: report_endpoint(&selected.endpoint),
                        source: err,
                    });
                }
            }
        }
    }

    /// [`execute_with_failover`](Self::execute_with_failover) with the
    /// configured `retry.max_retries`.
    pub async fn execute(&self, method: &str, params: Vec<Value>) -> Result<Value, PoolError> {
        self.execute_with_failover(method, params, self.inner.config.retry.max_retries)
            .await
    }

    /// Current block height (`eth_blockNumber`).
    pub async fn get_block_number(&self) -> Result<u64, PoolError> {
        let result = self.execute("eth_blockNumber", vec![]).await?;
        decode_quantity("eth_blockNumber", &result, parse_hex_u64)
    }

    /// Balance of `address` in wei at the latest block (`eth_getBalance`).
    pub async fn get_balance(&self, address: &str) -> Result<u128, PoolError> {
        let result = self
            .execute("eth_getBalance", vec![json!(address), json!("latest")])
            .await?;
        decode_quantity("eth_getBalance", &result, parse_hex_u128)
    }

    /// Nonce of `address` at the latest block (`eth_getTransactionCount`).
    pub async fn get_transaction_count(&self, address: &str) -> Result<u64, PoolError> {
        let result = self
            .execute("eth_getTransactionCount", vec![json!(address), json!("latest")])
            .await?;
        decode_quantity("eth_getTransactionCount", &result, parse_hex_u64)
    }

    /// Chain id reported by the provider (`eth_chainId`).
    pub async fn get_chain_id(&self) -> Result<u64, PoolError> {
        let result = self.execute("eth_chainId", vec![]).await?;
        decode_quantity("eth_chainId", &result, parse_hex_u64)
    }

    /// Read-only contract call (`eth_call`); returns the raw hex return data.
    pub async fn call(&self, transaction: Value, block: &str) -> Result<String, PoolError> {
        let result = self
            .execute("eth_call", vec![transaction, json!(block)])
            .await?;
        match result {
            Value::String(data) => Ok(data),
            other => Err(PoolError::Decode {
                method: "eth_call".into(),
                value: other.to_string(),
                reason: "expected hex string".into(),
            }),
        }
    }

    /// Endpoint of the current provider, for callers that need to hand a URL
    /// to another client. Pins the highest-priority provider if nothing has
    /// been selected yet.
    pub fn active_endpoint(&self) -> String {
        let mut table = self.inner.lock_table();
        let index = match table.current {
            Some(index) => index,
            None => {
                let index = table
                    .providers
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, p)| p.priority)
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                table.current = Some(index);
                index
            }
        };
        table.providers[index].endpoint.clone()
    }

    /// Snapshot of every provider's state. Takes the lock briefly; never
    /// mutates.
    pub fn status(&self) -> PoolStatus {
        let table = self.inner.lock_table();
        let count = |status: ProviderStatus| {
            table
                .providers
                .iter()
                .filter(|p| p.status == status)
                .count()
        };
        PoolStatus {
            total_providers: table.providers.len(),
            healthy: count(ProviderStatus::Healthy),
            degraded: count(ProviderStatus::Degraded),
            failed: count(ProviderStatus::Failed),
            circuit_open: count(ProviderStatus::CircuitOpen),
            current_provider: table
                .current
                .map(|i| report_endpoint(&table.providers[i].endpoint)),
            providers: table.providers.iter().map(Provider::snapshot).collect(),
        }
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RpcPool {
    fn drop(&mut self) {
        let slot = self
            .health_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for RpcPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcPool")
            .field("providers", &self.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl PoolInner {
    fn lock_table(&self) -> MutexGuard<'_, ProviderTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the provider for the next attempt and record it as current.
    fn select_provider(&self) -> Result<Selection, PoolError> {
        let now = Instant::now();
        let mut table = self.lock_table();
        let ProviderTable { providers, current } = &mut *table;

        if let Some(index) = *current {
            if self.breaker.is_available(&mut providers[index], now) {
                return Ok(Selection {
                    index,
                    endpoint: providers[index].endpoint.clone(),
                });
            }
        }

        let index = match self.best_available(providers, now) {
            Some(index) => index,
            None => {
                tracing::error!(
                    providers = providers.len(),
                    "all RPC providers unavailable, forcing circuits half-open"
                );
                for provider in providers.iter_mut() {
                    self.breaker.force_half_open(provider);
                }
                self.best_available(providers, now)
                    .ok_or(PoolError::AllProvidersDown {
                        providers: providers.len(),
                    })?
            }
        };

        *current = Some(index);
        let provider = &providers[index];
        tracing::info!(
            endpoint = %provider.log_label(),
            priority = provider.priority,
            "selected RPC provider"
        );
        Ok(Selection {
            index,
            endpoint: provider.endpoint.clone(),
        })
    }

    /// Lowest `(priority, failure_count)` among available providers.
    ///
    /// Every provider is checked, so expired circuits are demoted even when a
    /// better provider wins.
    fn best_available(&self, providers: &mut [Provider], now: Instant) -> Option<usize> {
        let mut best: Option<usize> = None;
        for index in 0..providers.len() {
            if !self.breaker.is_available(&mut providers[index], now) {
                continue;
            }
            let key = (providers[index].priority, providers[index].failure_count);
            if best.map_or(true, |b| key < (providers[b].priority, providers[b].failure_count)) {
                best = Some(index);
            }
        }
        best
    }

    async fn send_once(&self, endpoint: &str, req: &JsonRpcRequest) -> Result<Value, TransportError> {
        let resp = self
            .transport
            .send(endpoint, req, self.config.request_timeout)
            .await?;
        resp.into_result().map_err(TransportError::Rpc)
    }

    fn record_success(&self, index: usize) {
        let mut table = self.lock_table();
        self.breaker.on_success(&mut table.providers[index]);
    }

    fn record_call_failure(&self, index: usize) {
        let mut table = self.lock_table();
        self.breaker
            .on_failure(&mut table.providers[index], Instant::now());
        table.current = None;
    }

    /// Probe every provider concurrently and fold the outcomes into the table.
    async fn check_all_providers(&self) {
        let endpoints: Vec<String> = self
            .lock_table()
            .providers
            .iter()
            .map(|p| p.endpoint.clone())
            .collect();
        let probe = JsonRpcRequest::block_number_probe();
        let timeout = self.config.probe_timeout;

        let outcomes = join_all(
            endpoints
                .iter()
                .map(|endpoint| self.transport.probe(endpoint, &probe, timeout)),
        )
        .await;

        let now = Instant::now();
        let mut table = self.lock_table();
        for (provider, outcome) in table.providers.iter_mut().zip(outcomes) {
            match outcome {
                Ok(()) => {
                    tracing::debug!(endpoint = %provider.log_label(), "provider healthy");
                    self.breaker.on_success(provider);
                }
                Err(err) => {
                    tracing::warn!(
                        endpoint = %provider.log_label(),
                        error = %err,
                        "provider failed health check"
                    );
                    self.breaker.on_failure(provider, now);
                }
            }
        }
    }
}

async fn health_check_loop(inner: Arc<PoolInner>) {
    loop {
        tokio::time::sleep(inner.config.health_check_interval).await;
        inner.check_all_providers().await;
    }
}

fn decode_quantity<T>(
    method: &str,
    result: &Value,
    parse: fn(&str) -> Result<T, String>,
) -> Result<T, PoolError> {
    let decode_err = |reason: String| PoolError::Decode {
        method: method.to_string(),
        value: result.to_string(),
        reason,
    };
    let hex = result
        .as_str()
        .ok_or_else(|| decode_err("expected hex string".into()))?;
    parse(hex).map_err(decode_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    use async_trait::async_trait;

    use crate::request::JsonRpcResponse;

    #[derive(Clone)]
    enum Reply {
        Result(Value),
        RpcError,
        HttpError,
        /// Raw response body, decoded the way a transport would.
        Body(Value),
    }

    /// Scripted transport: each endpoint has a default reply plus an optional
    /// queue of one-shot replies consumed first.
    #[derive(Default)]
    struct MockTransport {
        defaults: Mutex<HashMap<String, Reply>>,
        scripted: Mutex<HashMap<String, VecDeque<Reply>>>,
        probes_healthy: Mutex<HashMap<String, bool>>,
        calls: Mutex<Vec<(String, String)>>,
        probes: Mutex<Vec<String>>,
        send_timeouts: Mutex<Vec<Duration>>,
        probe_timeouts: Mutex<Vec<Duration>>,
    }

    impl MockTransport {
        fn set(&self, endpoint: &str, reply: Reply) {
            self.defaults.lock().unwrap().insert(endpoint.into(), reply);
        }

        fn push(&self, endpoint: &str, reply: Reply) {
            self.scripted
                .lock()
                .unwrap()
                .entry(endpoint.into())
                .or_default()
                .push_back(reply);
        }

        fn set_probe(&self, endpoint: &str, healthy: bool) {
            self.probes_healthy
                .lock()
                .unwrap()
                .insert(endpoint.into(), healthy);
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn call_endpoints(&self) -> Vec<String> {
            self.calls().into_iter().map(|(e, _)| e).collect()
        }

        fn probe_count(&self) -> usize {
            self.probes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RpcTransport for MockTransport {
        async fn send(
            &self,
            endpoint: &str,
            req: &JsonRpcRequest,
            timeout: Duration,
        ) -> Result<JsonRpcResponse, TransportError> {
            self.send_timeouts.lock().unwrap().push(timeout);
            self.calls
                .lock()
                .unwrap()
                .push((endpoint.to_string(), req.method.clone()));
            let scripted = self
                .scripted
                .lock()
                .unwrap()
                .get_mut(endpoint)
                .and_then(VecDeque::pop_front);
            let reply = scripted.unwrap_or_else(|| {
                self.defaults
                    .lock()
                    .unwrap()
                    .get(endpoint)
                    .cloned()
                    .unwrap_or(Reply::Result(json!("0x1")))
            });
            match reply {
                Reply::Result(v) => Ok(JsonRpcResponse::success(v)),
                Reply::RpcError => Ok(JsonRpcResponse::failure(-32000, "header not found")),
                Reply::HttpError => Err(TransportError::Http("connection refused".into())),
                Reply::Body(body) => Ok(serde_json::from_value(body)?),
            }
        }

        async fn probe(
            &self,
            endpoint: &str,
            _req: &JsonRpcRequest,
            timeout: Duration,
        ) -> Result<(), TransportError> {
            self.probes.lock().unwrap().push(endpoint.to_string());
            self.probe_timeouts.lock().unwrap().push(timeout);
            let healthy = self
                .probes_healthy
                .lock()
                .unwrap()
                .get(endpoint)
                .copied()
                .unwrap_or(true);
            if healthy {
                Ok(())
            } else {
                Err(TransportError::Timeout {
                    ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    const A: &str = "https://a.example";
    const B: &str = "https://b.example";
    const C: &str = "https://c.example";

    fn pool_with(endpoints: &[&str], config: PoolConfig) -> (RpcPool, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::default());
        let pool = RpcPool::new(
            endpoints.iter().map(|e| e.to_string()).collect(),
            config,
            transport.clone(),
        )
        .unwrap();
        (pool, transport)
    }

    fn pool(endpoints: &[&str]) -> (RpcPool, Arc<MockTransport>) {
        pool_with(endpoints, PoolConfig::default())
    }

    fn snapshot<'a>(status: &'a PoolStatus, endpoint: &str) -> &'a ProviderSnapshot {
        status
            .providers
            .iter()
            .find(|p| p.endpoint == endpoint)
            .unwrap()
    }

    #[test]
    fn rejects_empty_endpoint_list() {
        let err = RpcPool::new(vec![], PoolConfig::default(), Arc::new(MockTransport::default()))
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_threshold() {
        let err = RpcPool::new(
            vec![A.into()],
            PoolConfig::default().with_failure_threshold(0),
            Arc::new(MockTransport::default()),
        )
        .unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));
    }

    #[test]
    fn priorities_follow_list_order() {
        let (pool, _) = pool(&[A, B, C]);
        let status = pool.status();
        let priorities: Vec<u32> = status.providers.iter().map(|p| p.priority).collect();
        assert_eq!(priorities, vec![0, 1, 2]);
        assert_eq!(status.total_providers, 3);
        assert_eq!(status.healthy, 3);
        assert!(status.current_provider.is_none());
        assert_eq!(pool.len(), 3);
    }

    #[tokio::test]
    async fn block_number_goes_to_primary_only() {
        let (pool, transport) = pool(&[A, B]);
        transport.set(A, Reply::Result(json!("0x10d4f")));

        let block = pool.get_block_number().await.unwrap();

        assert_eq!(block, 0x10d4f);
        assert_eq!(transport.calls(), vec![(A.to_string(), "eth_blockNumber".to_string())]);
        assert_eq!(pool.status().current_provider.as_deref(), Some(A));
    }

    #[tokio::test]
    async fn healthy_pool_always_prefers_priority_zero() {
        let (pool, transport) = pool(&[A, B, C]);
        for _ in 0..5 {
            pool.execute("eth_chainId", vec![]).await.unwrap();
        }
        assert!(transport.call_endpoints().iter().all(|e| e == A));
    }

    #[tokio::test]
    async fn balance_decodes_wei_beyond_u64() {
        let (pool, transport) = pool(&[A]);
        transport.set(A, Reply::Result(json!("0x152d02c7e14af6800000")));
        let wei = pool.get_balance("0xabc").await.unwrap();
        assert_eq!(wei, 100_000u128 * 10u128.pow(18));
    }

    #[tokio::test]
    async fn malformed_quantity_is_a_decode_error() {
        let (pool, transport) = pool(&[A]);
        transport.set(A, Reply::Result(json!(12)));
        let err = pool.get_block_number().await.unwrap_err();
        assert!(matches!(err, PoolError::Decode { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn eth_call_returns_raw_data() {
        let (pool, transport) = pool(&[A]);
        transport.set(A, Reply::Result(json!("0x0000000000000000000000000000000000000001")));
        let data = pool
            .call(json!({"to": "0xdead", "data": "0x70a08231"}), "latest")
            .await
            .unwrap();
        assert_eq!(data, "0x0000000000000000000000000000000000000001");
    }

    #[tokio::test]
    async fn five_failed_health_checks_open_the_circuit() {
        let (pool, transport) = pool(&[A, B]);
        transport.set_probe(A, false);

        for round in 1..=5u32 {
            pool.check_health_now().await;
            let status = pool.status();
            let a = snapshot(&status, A);
            assert_eq!(a.failure_count, round);
            let expected = if round < 5 {
                ProviderStatus::Degraded
            } else {
                ProviderStatus::CircuitOpen
            };
            assert_eq!(a.status, expected);
            assert!(a.last_checked_at.is_some());
        }
        assert_eq!(snapshot(&pool.status(), B).status, ProviderStatus::Healthy);

        transport.set(B, Reply::Result(json!("0x2a")));
        assert_eq!(pool.get_block_number().await.unwrap(), 42);
        assert_eq!(pool.get_block_number().await.unwrap(), 42);
        assert!(transport.call_endpoints().iter().all(|e| e == B));
    }

    #[tokio::test]
    async fn one_bad_probe_does_not_stop_the_round() {
        let (pool, transport) = pool(&[A, B, C]);
        transport.set_probe(B, false);

        pool.check_health_now().await;

        assert_eq!(transport.probe_count(), 3);
        let status = pool.status();
        assert_eq!(status.healthy, 2);
        assert_eq!(status.degraded, 1);
        assert_eq!(snapshot(&status, B).failure_count, 1);
        assert!(snapshot(&status, A).last_checked_at.is_some());
        assert!(snapshot(&status, C).last_checked_at.is_some());
    }

    #[tokio::test]
    async fn successful_probe_resets_failures() {
        let (pool, transport) = pool(&[A]);
        transport.set_probe(A, false);
        pool.check_health_now().await;
        pool.check_health_now().await;
        assert_eq!(snapshot(&pool.status(), A).failure_count, 2);

        transport.set_probe(A, true);
        pool.check_health_now().await;
        let status = pool.status();
        assert_eq!(snapshot(&status, A).failure_count, 0);
        assert_eq!(snapshot(&status, A).status, ProviderStatus::Healthy);
    }

    #[tokio::test]
    async fn all_open_circuits_are_forced_half_open() {
        let (pool, transport) = pool(&[A, B]);
        transport.set_probe(A, false);
        transport.set_probe(B, false);
        for _ in 0..5 {
            pool.check_health_now().await;
        }
        assert_eq!(pool.status().circuit_open, 2);

        let selected = pool.inner.select_provider().unwrap();
        assert_eq!(selected.endpoint, A);

        let status = pool.status();
        assert_eq!(status.circuit_open, 0);
        assert_eq!(status.degraded, 2);
        assert_eq!(status.healthy, 0);
        assert_eq!(status.total_providers, 2);
        assert!(status.providers.iter().all(|p| p.failure_count == 4));
    }

    #[tokio::test]
    async fn recovered_call_proceeds_against_first_provider() {
        let (pool, transport) = pool(&[A, B]);
        transport.set_probe(A, false);
        transport.set_probe(B, false);
        for _ in 0..5 {
            pool.check_health_now().await;
        }

        transport.set(A, Reply::Result(json!("0x7")));
        assert_eq!(pool.get_block_number().await.unwrap(), 7);
        assert_eq!(transport.call_endpoints(), vec![A.to_string()]);

        let status = pool.status();
        assert_eq!(snapshot(&status, A).status, ProviderStatus::Healthy);
        assert_eq!(snapshot(&status, B).status, ProviderStatus::Degraded);
        assert_eq!(snapshot(&status, B).failure_count, 4);
    }

    #[tokio::test]
    async fn one_miss_after_forced_recovery_reopens() {
        let (pool, transport) = pool(&[A]);
        transport.set_probe(A, false);
        for _ in 0..5 {
            pool.check_health_now().await;
        }
        pool.inner.select_provider().unwrap();
        assert_eq!(pool.status().degraded, 1);

        pool.check_health_now().await;
        assert_eq!(pool.status().circuit_open, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_retries_with_backoff() {
        let (pool, transport) = pool(&[A, B]);
        transport.set(A, Reply::HttpError);
        transport.set(B, Reply::HttpError);

        let started = Instant::now();
        let err = pool
            .execute_with_failover("eth_blockNumber", vec![], 3)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(transport.calls().len(), 3);
        // 1s + 2s, nothing after the last attempt
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
        match err {
            PoolError::RetriesExhausted {
                method,
                attempts,
                source,
                ..
            } => {
                assert_eq!(method, "eth_blockNumber");
                assert_eq!(attempts, 3);
                assert!(matches!(source, TransportError::Http(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        // the pool is still usable
        transport.set(A, Reply::Result(json!("0x1")));
        assert_eq!(pool.get_block_number().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_primary_keeps_priority() {
        let (pool, transport) = pool(&[A, B]);
        transport.set(A, Reply::HttpError);

        let _ = pool.execute_with_failover("eth_blockNumber", vec![], 3).await;

        // A stays below the threshold, so it is still the best provider
        assert_eq!(transport.call_endpoints(), vec![A, A, A]);
        let status = pool.status();
        assert_eq!(snapshot(&status, A).failure_count, 3);
        assert_eq!(snapshot(&status, A).status, ProviderStatus::Degraded);
        assert!(status.current_provider.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn fails_over_once_the_circuit_opens() {
        let (pool, transport) = pool_with(&[A, B], PoolConfig::default().with_failure_threshold(2));
        transport.set(A, Reply::HttpError);
        transport.set(B, Reply::Result(json!("0x64")));

        let block = pool.get_block_number().await.unwrap();

        assert_eq!(block, 100);
        assert_eq!(transport.call_endpoints(), vec![A, A, B]);
        let status = pool.status();
        assert_eq!(snapshot(&status, A).status, ProviderStatus::CircuitOpen);
        assert_eq!(status.current_provider.as_deref(), Some(B));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_success() {
        let (pool, transport) = pool(&[A, B]);
        transport.push(A, Reply::RpcError);
        transport.set(A, Reply::Result(json!("0x5")));

        let started = Instant::now();
        let result = pool
            .execute_with_failover("eth_blockNumber", vec![], 3)
            .await
            .unwrap();

        assert_eq!(result, json!("0x5"));
        assert_eq!(transport.calls().len(), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(2));
        let status = pool.status();
        assert_eq!(snapshot(&status, A).failure_count, 0);
        assert_eq!(snapshot(&status, A).status, ProviderStatus::Healthy);
    }

    #[tokio::test]
    async fn rpc_error_counts_as_failure() {
        let (pool, transport) = pool(&[A]);
        transport.set(A, Reply::RpcError);
        let err = pool
            .execute_with_failover("eth_getBlockByNumber", vec![json!("0x1"), json!(false)], 1)
            .await
            .unwrap_err();
        assert!(matches!(err.last_transport_error(), Some(TransportError::Rpc(_))));
        assert!(err.to_string().contains("header not found"));
        assert_eq!(snapshot(&pool.status(), A).failure_count, 1);
    }

    #[tokio::test]
    async fn null_error_key_counts_as_failure() {
        let (pool, transport) = pool(&[A]);
        transport.set(
            A,
            Reply::Body(json!({"jsonrpc": "2.0", "id": 1, "result": "0x5", "error": null})),
        );
        let err = pool
            .execute_with_failover("eth_blockNumber", vec![], 1)
            .await
            .unwrap_err();
        assert!(matches!(err.last_transport_error(), Some(TransportError::Rpc(_))));
        assert_eq!(snapshot(&pool.status(), A).failure_count, 1);
        assert_eq!(snapshot(&pool.status(), A).status, ProviderStatus::Degraded);
    }

    #[tokio::test]
    async fn calls_use_thirty_second_timeout() {
        let (pool, transport) = pool(&[A]);
        pool.execute("eth_blockNumber", vec![]).await.unwrap();
        pool.get_balance("0xabc").await.unwrap();
        assert_eq!(
            *transport.send_timeouts.lock().unwrap(),
            vec![Duration::from_secs(30); 2]
        );
    }

    #[tokio::test]
    async fn health_checks_use_five_second_timeout() {
        let (pool, transport) = pool(&[A, B]);
        pool.check_health_now().await;
        assert_eq!(
            *transport.probe_timeouts.lock().unwrap(),
            vec![Duration::from_secs(5); 2]
        );
    }

    #[tokio::test]
    async fn zero_retries_still_attempts_once() {
        let (pool, transport) = pool(&[A]);
        transport.set(A, Reply::HttpError);
        let err = pool
            .execute_with_failover("eth_blockNumber", vec![], 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn selection_is_sticky_after_cool_down() {
        let config = PoolConfig::default()
            .with_failure_threshold(1)
            .with_open_duration(Duration::from_secs(10));
        let (pool, transport) = pool_with(&[A, B], config);
        transport.set_probe(A, false);
        pool.check_health_now().await;

        pool.get_block_number().await.unwrap();
        assert_eq!(pool.status().current_provider.as_deref(), Some(B));

        tokio::time::advance(Duration::from_secs(11)).await;
        pool.get_block_number().await.unwrap();

        // B is still available, so A is not reconsidered
        assert_eq!(transport.call_endpoints(), vec![B, B]);
        assert_eq!(snapshot(&pool.status(), A).status, ProviderStatus::CircuitOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_circuit_is_selectable_again() {
        let config = PoolConfig::default()
            .with_failure_threshold(1)
            .with_open_duration(Duration::from_secs(10));
        let (pool, transport) = pool_with(&[A, B], config);
        transport.set_probe(A, false);
        pool.check_health_now().await;
        assert_eq!(pool.inner.select_provider().unwrap().endpoint, B);

        // losing B forces re-selection, which now sees A's expired circuit
        pool.inner.record_call_failure(1);
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(pool.inner.select_provider().unwrap().endpoint, A);
        assert_eq!(snapshot(&pool.status(), A).status, ProviderStatus::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_probes_every_interval() {
        let config = PoolConfig::default().with_health_check_interval(Duration::from_secs(10));
        let (pool, transport) = pool_with(&[A, B], config);

        pool.start();
        pool.start(); // idempotent
        assert!(pool.is_running());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(transport.probe_count(), 4);

        pool.stop().await;
        assert!(!pool.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn no_probes_after_stop() {
        let config = PoolConfig::default().with_health_check_interval(Duration::from_secs(10));
        let (pool, transport) = pool_with(&[A, B], config);
        transport.set_probe(A, false);

        pool.start();
        tokio::time::sleep(Duration::from_secs(15)).await;
        pool.stop().await;

        let probes = transport.probe_count();
        let before = pool.status();
        tokio::time::sleep(Duration::from_secs(100)).await;

        assert_eq!(transport.probe_count(), probes);
        assert_eq!(pool.status(), before);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (pool, _) = pool(&[A]);
        pool.stop().await;
        pool.start();
        pool.stop().await;
        pool.stop().await;
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn active_endpoint_pins_primary() {
        let (pool, _) = pool(&[A, B]);
        assert_eq!(pool.active_endpoint(), A);
        assert_eq!(pool.status().current_provider.as_deref(), Some(A));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_are_all_counted() {
        let (pool, transport) = pool_with(&[A, B], PoolConfig::default().with_failure_threshold(1000));
        transport.set(A, Reply::HttpError);
        let pool = Arc::new(pool);

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    pool.execute_with_failover("eth_blockNumber", vec![], 1).await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_err());
        }

        let status = pool.status();
        assert_eq!(snapshot(&status, A).failure_count, 40);
        assert_eq!(snapshot(&status, B).failure_count, 0);
    }

    #[test]
    fn status_serializes_for_reports() {
        let (pool, _) = pool(&[A]);
        let json = serde_json::to_value(pool.status()).unwrap();
        assert_eq!(json["total_providers"], 1);
        assert_eq!(json["providers"][0]["status"], "healthy");
        assert_eq!(json["current_provider"], Value::Null);
    }
}
