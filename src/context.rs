// src/context.rs

//! Per-run context handed to every component constructor.
//!
//! A [`RunContext`] carries the orchestration run's tracing span (the logger
//! handle components emit their events under), its trace id, and the
//! cancellation / deadline signals honoured by blocking operations such as
//! [`crate::pool::RequestPool::get_next`] and the squasher's merge loop.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::Span;

use crate::errors::ContextError;

#[derive(Debug, Clone)]
pub struct RunContext {
    trace_id: String,
    span: Span,
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Cancels every [`RunContext`] cloned from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RunContext {
    pub fn new(trace_id: impl Into<String>) -> (Self, CancelHandle) {
        let trace_id = trace_id.into();
        let span = tracing::info_span!("orchestration", trace_id = %trace_id);
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            trace_id,
            span,
            cancel: rx,
            deadline: None,
        };
        (ctx, CancelHandle { tx })
    }

    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        let (ctx, _handle) = Self::new("background");
        ctx
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derived context that is also done at `deadline` (the earlier deadline wins).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Non-blocking check: `Some` once the context is done.
    pub fn err(&self) -> Option<ContextError> {
        if *self.cancel.borrow() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is canceled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        let mut rx = self.cancel.clone();
        let canceled = async move {
            // A dropped handle can no longer cancel us.
            if rx.wait_for(|canceled| *canceled).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = canceled => ContextError::Canceled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                canceled.await;
                ContextError::Canceled
            }
        }
    }
}
