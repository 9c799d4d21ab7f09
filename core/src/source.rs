//! # Source Adapters
//!
//! A [`SourceAdapter`] turns a target domain into a lazy stream of
//! [`Candidate`]s. Every outbound request an adapter makes goes through
//! [`SourceBudget::call`], which applies the rate limiter, the per-request
//! timeout, cancellation and the retry policy.
//!
//! Adapters live in `sigma-plugins`; the orchestrator only sees trait objects
//! handed out by a [`SourceCatalog`].

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use sigma_common::config::Config;
use sigma_common::error::SourceError;
use sigma_common::models::candidate::{Candidate, SourceId};
use sigma_common::models::target::Target;
use sigma_common::utils::retry::RetryPolicy;
use tokio_util::sync::CancellationToken;

use crate::dns::DnsLookup;
use crate::http::{FetchError, HttpFetcher, HttpResponse};
use crate::limiter::{AcquireError, RateLimiter};
use crate::retry::{RetryError, retry};

pub type CandidateStream = BoxStream<'static, Result<Candidate, SourceError>>;

/// Shared services an adapter may use.
#[derive(Clone)]
pub struct SourceContext {
    pub config: Arc<Config>,
    pub http: Arc<dyn HttpFetcher>,
    pub dns: Arc<dyn DnsLookup>,
}

pub trait SourceAdapter: Send + Sync {
    fn id(&self) -> SourceId;

    fn requires_api_key(&self) -> bool {
        false
    }

    /// Fail-fast check run before anything is emitted.
    fn prepare(&self, ctx: &SourceContext) -> Result<(), SourceError> {
        if self.requires_api_key() && ctx.config.api_key(&self.id()).is_none() {
            return Err(SourceError::Unavailable {
                source_id: self.id().to_string(),
                reason: "no api key configured".into(),
            });
        }
        Ok(())
    }

    /// Lazy and finite. Candidates come out in the order this source found them.
    /// An `Err` item ends the stream.
    fn enumerate(&self, target: &Target, budget: SourceBudget) -> CandidateStream;
}

/// Hands the orchestrator the adapters enabled for a run.
pub trait SourceCatalog: Send + Sync {
    fn list_enabled(&self) -> Vec<Arc<dyn SourceAdapter>>;
}

impl SourceCatalog for Vec<Arc<dyn SourceAdapter>> {
    fn list_enabled(&self) -> Vec<Arc<dyn SourceAdapter>> {
        self.clone()
    }
}

#[derive(Debug, Default)]
struct BudgetFlags {
    rate_limited: AtomicBool,
    errors: AtomicU64,
}

/// One source's view of the shared request budget.
#[derive(Clone)]
pub struct SourceBudget {
    source: SourceId,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    request_timeout: Duration,
    acquire_timeout: Duration,
    cancel: CancellationToken,
    flags: Arc<BudgetFlags>,
}

impl SourceBudget {
    pub fn new(source: SourceId, limiter: Arc<RateLimiter>, cfg: &Config, cancel: CancellationToken) -> Self {
        Self {
            source,
            limiter,
            policy: cfg.source_retry_policy(),
            request_timeout: cfg.request_timeout(),
            acquire_timeout: cfg.rate_limit_wait(),
            cancel,
            flags: Arc::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the remote pushed back with its own rate limiting at least once.
    pub fn was_rate_limited(&self) -> bool {
        self.flags.rate_limited.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.flags.errors.load(Ordering::Relaxed)
    }

    /// Runs `op` under the limiter and timeout, retrying transient failures.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let result = retry(
            &self.policy,
            &self.cancel,
            |_| {
                let request = op();
                async move {
                    let _permit = self
                        .limiter
                        .acquire(&self.source, self.acquire_timeout, &self.cancel)
                        .await
                        .map_err(|e| match e {
                            AcquireError::Timeout(waited) => SourceError::RateLimitTimeout(waited),
                            AcquireError::Cancelled => SourceError::Cancelled,
                            AcquireError::Closed => SourceError::Transient("rate limiter closed".into()),
                        })?;
                    tokio::select! {
                        _ = self.cancel.cancelled() => Err(SourceError::Cancelled),
                        res = tokio::time::timeout(self.request_timeout, request) => {
                            res.unwrap_or(Err(SourceError::Timeout(self.request_timeout)))
                        }
                    }
                }
            },
            |err| {
                if matches!(err, SourceError::Cancelled) {
                    return false;
                }
                self.flags.errors.fetch_add(1, Ordering::Relaxed);
                if matches!(err, SourceError::RateLimited(_)) {
                    self.flags.rate_limited.store(true, Ordering::Relaxed);
                }
                tracing::debug!(source = %self.source, "request failed: {err}");
                err.is_transient()
            },
        )
        .await;

        result.map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => SourceError::Exhausted {
                attempts,
                last: last.to_string(),
            },
            RetryError::Fatal(err) => err,
            RetryError::Cancelled => SourceError::Cancelled,
        })
    }

    /// GET through [`call`](Self::call), mapping HTTP statuses onto source errors.
    pub async fn get(
        &self,
        http: &dyn HttpFetcher,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<HttpResponse, SourceError> {
        self.get_with(http, url, headers, Ok).await
    }

    /// Like [`get`](Self::get), with `parse` run inside the retried call so a
    /// 200 body can still report a retryable condition.
    pub async fn get_with<T, P>(
        &self,
        http: &dyn HttpFetcher,
        url: &str,
        headers: &[(&str, String)],
        parse: P,
    ) -> Result<T, SourceError>
    where
        P: Fn(HttpResponse) -> Result<T, SourceError>,
    {
        let timeout = self.request_timeout;
        let parse = &parse;
        self.call(|| async move {
            let response = http.get(url, headers).await.map_err(|e| match e {
                FetchError::Timeout => SourceError::Timeout(timeout),
                other => SourceError::Transient(other.to_string()),
            })?;
            parse(check_status(&self.source, response)?)
        })
        .await
    }
}

fn check_status(source: &SourceId, response: HttpResponse) -> Result<HttpResponse, SourceError> {
    match response.status {
        200..=299 => Ok(response),
        429 => Err(SourceError::RateLimited(format!("{source} answered 429"))),
        401 | 403 => Err(SourceError::Unavailable {
            source_id: source.to_string(),
            reason: format!("access denied ({})", response.status),
        }),
        500..=599 => Err(SourceError::Transient(format!("{source} answered {}", response.status))),
        other => Err(SourceError::Malformed(format!("unexpected status {other}"))),
    }
}

/// Stream for adapters that make one request and report every name it returned.
pub fn from_single_fetch<F>(source: SourceId, fetch: F) -> CandidateStream
where
    F: Future<Output = Result<Vec<String>, SourceError>> + Send + 'static,
{
    stream::once(fetch)
        .flat_map(move |result| {
            let items: Vec<Result<Candidate, SourceError>> = match result {
                Ok(names) => names
                    .into_iter()
                    .map(|name| Ok(Candidate::new(name, source.clone())))
                    .collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
        .boxed()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;

    use super::*;

    struct Scripted {
        replies: Mutex<Vec<Result<HttpResponse, FetchError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<HttpResponse, FetchError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpFetcher for Scripted {
        async fn get(&self, _url: &str, _headers: &[(&str, String)]) -> Result<HttpResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(FetchError::Connect("script exhausted".into())))
        }
    }

    fn budget(retries: u32) -> SourceBudget {
        let cfg = Config {
            retries,
            ..Config::default()
        };
        let limiter = Arc::new(RateLimiter::from_config(&cfg));
        SourceBudget::new(SourceId::new("test"), limiter, &cfg, CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn retries_429_and_5xx_then_succeeds() {
        let http = Scripted::new(vec![
            Ok(HttpResponse::ok("").with_status(429)),
            Ok(HttpResponse::ok("").with_status(503)),
            Ok(HttpResponse::ok("names")),
        ]);
        let budget = budget(3);

        let response = budget.get(&http, "https://example.test", &[]).await.unwrap();

        assert_eq!(response.body, "names");
        assert_eq!(http.calls.load(Ordering::SeqCst), 3);
        assert!(budget.was_rate_limited());
        assert_eq!(budget.errors(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_carry_the_last_error() {
        let http = Scripted::new(vec![
            Err(FetchError::Connect("refused".into())),
            Err(FetchError::Connect("refused".into())),
            Err(FetchError::Connect("refused".into())),
            Err(FetchError::Connect("refused".into())),
        ]);
        let budget = budget(3);

        let err = budget.get(&http, "https://example.test", &[]).await.unwrap_err();

        assert!(matches!(err, SourceError::Exhausted { attempts: 4, .. }));
        assert_eq!(http.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn forbidden_is_not_retried() {
        let http = Scripted::new(vec![Ok(HttpResponse::ok("").with_status(403))]);
        let budget = budget(3);

        let err = budget.get(&http, "https://example.test", &[]).await.unwrap_err();

        assert!(matches!(err, SourceError::Unavailable { .. }));
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_time_out() {
        let mut cfg = Config::default();
        cfg.retries = 0;
        cfg.timeout_seconds = 2;
        let limiter = Arc::new(RateLimiter::from_config(&cfg));
        let budget = SourceBudget::new(SourceId::new("slow"), limiter, &cfg, CancellationToken::new());

        let err = budget
            .call(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, SourceError>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Exhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn single_fetch_streams_names_then_stops() {
        let stream = from_single_fetch(SourceId::new("s"), async {
            Ok(vec!["a.example.com".to_string(), "b.example.com".to_string()])
        });
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_ref().unwrap().hostname, "b.example.com");
        assert_eq!(items[0].as_ref().unwrap().source, SourceId::new("s"));
    }
}
