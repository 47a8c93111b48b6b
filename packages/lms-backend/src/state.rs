use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::env_bool;
use crate::db::DatabaseProxy;
use crate::response::AppError;
use crate::services::assistant::Assistant;
use crate::services::llm_provider::LLMProvider;

/// Assistant switches read once at startup.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub llm_enabled: bool,
    pub llm_mock: bool,
}

impl RuntimeConfig {
    pub fn new(llm_enabled: bool, llm_mock: bool) -> Self {
        Self {
            llm_enabled,
            llm_mock,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            env_bool("LLM_ENABLED").unwrap_or(true),
            env_bool("LLM_MOCK").unwrap_or(false),
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db_proxy: Option<Arc<DatabaseProxy>>,
    llm: Arc<LLMProvider>,
    runtime: RuntimeConfig,
}

impl AppState {
    pub fn new(db_proxy: Option<Arc<DatabaseProxy>>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db_proxy,
            llm: Arc::new(LLMProvider::from_env()),
            runtime: RuntimeConfig::from_env(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db_proxy(&self) -> Option<Arc<DatabaseProxy>> {
        self.db_proxy.clone()
    }

    /// The pool owner, or `503` when the service started without a database.
    pub fn require_db(&self) -> Result<Arc<DatabaseProxy>, AppError> {
        self.db_proxy
            .clone()
            .ok_or_else(|| AppError::service_unavailable("Database unavailable"))
    }

    pub fn assistant(&self) -> Assistant<'_> {
        Assistant::new(&self.llm, &self.runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_is_service_unavailable() {
        let state = AppState::new(None);
        let err = state.require_db().err().unwrap();
        assert_eq!(err.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
