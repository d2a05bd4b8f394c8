use crate::api::{ApiClient, ApiError, HttpTransport, ReqwestTransport};
use crate::directory::Directory;
use crate::refresh::{DashboardAggregator, RefreshReport};
use crate::settings::ConsoleSettings;
use crate::state::{SessionError, SessionManager, TokenStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything the view layer holds, built once at startup.
pub struct AdminConsole {
    pub settings: ConsoleSettings,
    pub session: Arc<SessionManager>,
    pub dashboard: DashboardAggregator,
    pub directory: Directory,
}

impl AdminConsole {
    /// Wires the production stack: reqwest transport plus the OS keychain.
    pub async fn start(settings: ConsoleSettings) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(&settings.api_base_url, settings.request_timeout())?;
        let tokens = TokenStore::keyring(&settings.keyring_service);
        info!(
            api_base_url = %settings.api_base_url,
            timeout_seconds = settings.request_timeout_seconds,
            "admin console starting"
        );
        Ok(Self::from_parts(settings, Arc::new(transport), tokens).await)
    }

    pub async fn from_parts(
        settings: ConsoleSettings,
        transport: Arc<dyn HttpTransport>,
        tokens: TokenStore,
    ) -> Self {
        let api = ApiClient::new(transport, tokens);
        let session = Arc::new(SessionManager::new(api.clone()).await);
        let dashboard = DashboardAggregator::new(api, settings.recent_transactions_limit);
        let directory = Directory::new(session.clone());
        debug!(state = session.state().name(), "session initialized");
        Self {
            settings,
            session,
            dashboard,
            directory,
        }
    }

    /// Refreshes the dashboard for an authenticated operator. A 401 from any
    /// source ends the session once all sources have settled.
    pub async fn refresh_dashboard(&self) -> Result<RefreshReport, SessionError> {
        let state = self.session.state();
        if !state.is_authenticated() {
            return Err(SessionError::Precondition {
                operation: "refresh_dashboard",
                state: state.name(),
            });
        }

        let report = self.dashboard.refresh().await;
        if report.saw_unauthorized() {
            self.session.handle_unauthorized().await;
        }
        Ok(report)
    }
}
