//! Counter service
//!
//! View, download and favorite counters are changed with the remote atomic
//! increment. Failures that prove the increment was not applied are retried
//! with exponential backoff. Anything else (a timeout, a 500) may already have
//! committed, so it is never retried. When the change is abandoned the caller
//! keeps showing the last confirmed value.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::CounterConfig;
use crate::data::{DataService, PostKind, RemoteError};
use crate::metrics::{COUNTER_RETRIES_TOTAL, COUNTER_ROLLBACKS_TOTAL};

/// Counter columns maintained by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Views,
    Downloads,
    Favorites,
}

impl Counter {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::Downloads => "downloads",
            Self::Favorites => "favorite_count",
        }
    }
}

/// Result of a counter change as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterUpdate {
    pub value: i64,
    /// False when the change was rolled back and `value` is the old one
    pub committed: bool,
}

pub struct CounterService {
    data: Arc<dyn DataService>,
    max_attempts: u32,
    backoff: Duration,
}

impl CounterService {
    pub fn new(data: Arc<dyn DataService>, config: &CounterConfig) -> Self {
        Self {
            data,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Add `delta` to a post counter
    ///
    /// # Arguments
    /// * `displayed` - Last confirmed value, returned if the change fails
    pub async fn apply(
        &self,
        kind: PostKind,
        post_id: &str,
        counter: Counter,
        delta: i64,
        displayed: i64,
    ) -> CounterUpdate {
        let column = counter.column();
        let mut delay = self.backoff;

        for attempt in 1..=self.max_attempts {
            match self
                .data
                .increment(kind.table(), post_id, column, delta)
                .await
            {
                Ok(value) => {
                    return CounterUpdate {
                        value,
                        committed: true,
                    };
                }
                Err(error) if is_retryable(&error) && attempt < self.max_attempts => {
                    COUNTER_RETRIES_TOTAL.with_label_values(&[column]).inc();
                    tracing::warn!(
                        %error,
                        attempt,
                        post_id,
                        column,
                        delay_ms = delay.as_millis() as u64,
                        "Counter update failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(error) => {
                    tracing::warn!(%error, attempt, post_id, column, "Counter update abandoned");
                    break;
                }
            }
        }

        COUNTER_ROLLBACKS_TOTAL.with_label_values(&[column]).inc();
        CounterUpdate {
            value: displayed,
            committed: false,
        }
    }
}

/// Only errors where the backend cannot have applied the increment
fn is_retryable(error: &RemoteError) -> bool {
    match error {
        RemoteError::Unreachable(_) => true,
        RemoteError::Backend { status, .. } => matches!(*status, 429 | 503),
        RemoteError::Network(_)
        | RemoteError::UniqueViolation
        | RemoteError::NotFound
        | RemoteError::Decode(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FailOp, MemoryDataService, Table};
    use serde_json::json;

    async fn service_with_post(views: i64) -> (Arc<MemoryDataService>, CounterService, String) {
        let data = Arc::new(MemoryDataService::new());
        data.seed(
            Table::ArchivePosts,
            [json!({"id": "p1", "title": "t", "views": views})],
        )
        .await;
        let config = CounterConfig {
            max_attempts: 3,
            backoff_ms: 100,
        };
        let service = CounterService::new(data.clone(), &config);
        (data, service, "p1".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn increments_on_first_try() {
        let (_, service, id) = service_with_post(4).await;
        let update = service
            .apply(PostKind::Archive, &id, Counter::Views, 1, 4)
            .await;
        assert_eq!(
            update,
            CounterUpdate {
                value: 5,
                committed: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures() {
        let (data, service, id) = service_with_post(4).await;
        data.fail_next(Table::ArchivePosts, FailOp::Increment, 2).await;
        let update = service
            .apply(PostKind::Archive, &id, Counter::Views, 1, 4)
            .await;
        assert!(update.committed);
        assert_eq!(update.value, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn rolls_back_after_last_attempt() {
        let (data, service, id) = service_with_post(4).await;
        data.fail_next(Table::ArchivePosts, FailOp::Increment, 3).await;
        let update = service
            .apply(PostKind::Archive, &id, Counter::Views, 1, 4)
            .await;
        assert_eq!(
            update,
            CounterUpdate {
                value: 4,
                committed: false
            }
        );
        assert_eq!(data.rows(Table::ArchivePosts).await[0]["views"], 4);
    }

    #[test]
    fn ambiguous_failures_are_not_retried() {
        assert!(is_retryable(&RemoteError::Unreachable("refused".to_string())));
        for status in [429, 503] {
            assert!(is_retryable(&RemoteError::Backend {
                status,
                code: None,
                message: String::new(),
            }));
        }
        assert!(!is_retryable(&RemoteError::Network("timed out".to_string())));
        assert!(!is_retryable(&RemoteError::Backend {
            status: 500,
            code: None,
            message: String::new(),
        }));
        assert!(!is_retryable(&RemoteError::Backend {
            status: 504,
            code: None,
            message: String::new(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_post_is_not_retried() {
        let (_, service, _) = service_with_post(0).await;
        let update = service
            .apply(PostKind::Archive, "missing", Counter::Downloads, 1, 0)
            .await;
        assert!(!update.committed);
    }
}
