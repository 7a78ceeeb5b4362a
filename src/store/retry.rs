// src/store/retry.rs

//! Bounded retry for transient storage failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::context::RunContext;
use crate::errors::StoreError;

/// Attempts made for object listing and attribute lookups.
pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// Run `op` up to `attempts` times, retrying only [`StoreError::Unavailable`].
///
/// The context is checked before every attempt; once it is done the last
/// error (or a `Unavailable` naming the context error) is returned.
pub async fn retry<T, F, Fut>(
    ctx: &RunContext,
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;

    loop {
        if let Some(err) = ctx.err() {
            return Err(StoreError::Unavailable(format!("giving up: {err}")));
        }

        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(StoreError::Unavailable(msg)) if attempt < attempts => {
                warn!(
                    parent: ctx.span(),
                    attempt,
                    attempts,
                    error = %msg,
                    "transient storage failure; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
