//! Waiting between requests
//!
//! Sleeping is behind a trait so that tests can run the whole pipeline
//! instantly while still checking which delays were requested.

use async_trait::async_trait;
use std::time::Duration;

/// Waits for a given duration
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Returns immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPacer;

#[async_trait]
impl Pacer for NoopPacer {
    async fn pause(&self, _delay: Duration) {}
}
