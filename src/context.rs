#![forbid(unsafe_code)]

use std::sync::Arc;

use crate::auth::{MockAuthService, Session};
use crate::config::{Config, FeatureFlags};
use crate::error::{Result, TaskdeckError};
use crate::error_log::{ErrorLog, ErrorReport};
use crate::i18n::{self, Locale, Message};
use crate::prefs::Preferences;
use crate::store::{FileStore, KeyValueStore};
use crate::task::{StoredTaskRepository, TaskList, TaskRepository};

/// Everything a command needs, built once at startup and passed down
/// explicitly.
pub struct AppContext {
    pub config: Config,
    pub features: FeatureFlags,
    pub session: Session,
    pub prefs: Preferences,
    pub errors: ErrorLog,
    store: Arc<dyn KeyValueStore>,
    repo: Arc<dyn TaskRepository>,
}

impl AppContext {
    /// Opens the file store under the configured data directory.
    pub async fn init(config: Config) -> anyhow::Result<Self> {
        let dir = config.data_dir()?;
        tracing::debug!(data_dir = %dir.display(), "opening store");
        Ok(Self::with_store(config, Arc::new(FileStore::new(dir))).await)
    }

    pub async fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Self {
        let latency = config.latency();
        let repo: Arc<dyn TaskRepository> =
            Arc::new(StoredTaskRepository::new(store.clone()).with_latency(latency));
        let mut session = Session::new(MockAuthService::new(latency), store.clone());
        session.restore().await;
        let prefs = Preferences::load(store.clone(), config.ui.theme, config.ui.locale).await;

        Self {
            features: config.features,
            errors: ErrorLog::new(store.clone()),
            config,
            session,
            prefs,
            store,
            repo,
        }
    }

    #[must_use]
    pub fn locale(&self) -> Locale {
        self.prefs.locale()
    }

    #[must_use]
    pub fn text(&self, msg: Message) -> &'static str {
        i18n::text(self.locale(), msg)
    }

    /// Task list for the signed-in user, loaded and with saved filters applied.
    pub async fn open_task_list(&self) -> Result<TaskList> {
        let user = self.session.require_user()?;
        let mut list = TaskList::new(user.id.clone(), self.repo.clone(), self.store.clone())
            .with_page_size(self.config.page_size())
            .with_sort(self.config.default_sort());
        list.open().await;
        Ok(list)
    }

    /// Records a failed operation in the error log.
    pub async fn handle_error(&self, err: &anyhow::Error, route: &str) {
        tracing::error!(route, error = %err, "error occurred");
        let status = err
            .downcast_ref::<TaskdeckError>()
            .map(TaskdeckError::status_code);
        let user_id = self.session.user().map(|u| u.id.as_str());
        self.errors
            .log_error(ErrorReport::new(
                err.to_string(),
                user_id,
                status,
                Some(route),
            ))
            .await;
    }

    pub fn shutdown(self) {
        tracing::debug!(
            signed_in = self.session.is_authenticated(),
            "shutting down"
        );
    }
}
