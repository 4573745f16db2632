#![forbid(unsafe_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::{self, ERRORS_KEY, KeyValueStore};

pub const ANONYMOUS_USER: &str = "anonymous";
pub const UNKNOWN_ROUTE: &str = "unknown";
pub const DEFAULT_STATUS_CODE: u16 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppError {
    pub id: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub user_id: String,
    pub status_code: u16,
    pub route: String,
}

/// What a caller knows about a failure; the log adds id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    pub user_id: String,
    pub status_code: u16,
    pub route: String,
}

impl ErrorReport {
    /// Fills the gaps the way the error handler does: anonymous user, status
    /// 500, unknown route.
    #[must_use]
    pub fn new(
        message: impl Into<String>,
        user_id: Option<&str>,
        status_code: Option<u16>,
        route: Option<&str>,
    ) -> Self {
        let message = message.into();
        Self {
            message: if message.is_empty() {
                "Unknown error".to_owned()
            } else {
                message
            },
            user_id: user_id.unwrap_or(ANONYMOUS_USER).to_owned(),
            status_code: status_code.unwrap_or(DEFAULT_STATUS_CODE),
            route: route.unwrap_or(UNKNOWN_ROUTE).to_owned(),
        }
    }
}

/// Client-side error records kept in the local store for later review.
#[derive(Clone)]
pub struct ErrorLog {
    store: Arc<dyn KeyValueStore>,
}

impl ErrorLog {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Appends a record. Never fails: a broken store only produces a warning.
    pub async fn log_error(&self, report: ErrorReport) {
        let mut errors = self.stored_errors().await;
        let id = Uuid::new_v4().simple().to_string();
        errors.push(AppError {
            id: id.chars().take(12).collect(),
            message: report.message,
            timestamp: OffsetDateTime::now_utc(),
            user_id: report.user_id,
            status_code: report.status_code,
            route: report.route,
        });
        if let Err(err) = store::set_json(self.store.as_ref(), ERRORS_KEY, &errors).await {
            tracing::warn!(error = %err, "failed to log error");
        }
    }

    /// Oldest first. Unreadable logs read as empty.
    pub async fn stored_errors(&self) -> Vec<AppError> {
        match store::get_json::<Vec<AppError>>(self.store.as_ref(), ERRORS_KEY).await {
            Ok(errors) => errors.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to get stored errors");
                Vec::new()
            }
        }
    }

    pub async fn clear_errors(&self) {
        if let Err(err) = self.store.remove(ERRORS_KEY).await {
            tracing::warn!(error = %err, "failed to clear errors");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::store::MemoryStore;
    use crate::task::repository::tests::FlakyStore;

    #[tokio::test]
    async fn appends_lists_and_clears() {
        let log = ErrorLog::new(Arc::new(MemoryStore::new()));
        assert!(log.stored_errors().await.is_empty());

        log.log_error(ErrorReport::new("first", Some("2"), Some(404), Some("task show")))
            .await;
        log.log_error(ErrorReport::new("second", None, None, None))
            .await;

        let errors = log.stored_errors().await;
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "first");
        assert_eq!(errors[0].status_code, 404);
        assert_eq!(errors[1].user_id, ANONYMOUS_USER);
        assert_eq!(errors[1].status_code, DEFAULT_STATUS_CODE);
        assert_eq!(errors[1].route, UNKNOWN_ROUTE);
        assert_ne!(errors[0].id, errors[1].id);

        log.clear_errors().await;
        assert!(log.stored_errors().await.is_empty());
    }

    #[tokio::test]
    async fn broken_store_never_fails_the_caller() {
        let store = Arc::new(FlakyStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        store.fail_reads.store(true, Ordering::SeqCst);
        let log = ErrorLog::new(store);

        log.log_error(ErrorReport::new("lost", None, None, None)).await;
        log.clear_errors().await;
        assert!(log.stored_errors().await.is_empty());
    }

    #[test]
    fn blank_messages_become_unknown_error() {
        assert_eq!(ErrorReport::new("", None, None, None).message, "Unknown error");
    }
}
