use crate::error::{transport_error, Result, StepcastError, PAGE_NOT_READY};
use crate::messages::{Envelope, Request};
use crate::router::Router;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Number of readiness probe attempts before giving up.
pub const READY_ATTEMPTS: u32 = 3;
/// Delay before the first readiness retry; doubled on each attempt.
pub const READY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Reliable-request/response channel between a page agent and the
/// privileged process.
///
/// The remote side can vanish at any moment (navigation, tab close, process
/// restart), so every call may fail; callers treat failures as soft and
/// decide whether to retry.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn request(&self, request: Request) -> Result<Envelope>;
}

/// In-process transport that hands requests straight to a router.
pub struct LocalTransport {
    router: Arc<Router>,
}

impl LocalTransport {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn request(&self, request: Request) -> Result<Envelope> {
        Ok(self.router.handle(request))
    }
}

/// Retries an idempotent async operation with exponential backoff.
///
/// `attempts` bounds the total number of tries; the delay starts at
/// `base_delay` and doubles between tries.
pub async fn retry_with_backoff<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay = base_delay;
    let mut last_err = transport_error("no attempts made");
    for attempt in 0..attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(attempt, %err, "attempt failed");
                last_err = err;
            }
        }
        if attempt + 1 < attempts {
            sleep(delay).await;
            delay *= 2;
        }
    }
    Err(last_err)
}

/// Probes the remote side until it answers a state query, with bounded
/// exponential backoff. Exhaustion surfaces the user-actionable
/// "refresh the page" error rather than a raw transport failure.
pub async fn ensure_page_ready(transport: &dyn Transport) -> Result<()> {
    retry_with_backoff(READY_ATTEMPTS, READY_BASE_DELAY, || async {
        transport
            .request(Request::GetRecordingState)
            .await?
            .into_result()
            .map(|_| ())
    })
    .await
    .map_err(|_| StepcastError::Transport(PAGE_NOT_READY.to_owned()))
}
