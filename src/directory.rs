use crate::api::{ApiClient, ApiError};
use crate::state::SessionManager;
use crate::types::{
    Page, Partner, PartnerStats, UpdateRiskFlagRequest, UpdateUserStatusRequest, User, UserStats,
    UserStatus,
};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Default)]
struct QueryString {
    pairs: Vec<(&'static str, String)>,
}

impl QueryString {
    fn push<V: ToString>(&mut self, key: &'static str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            let value = value.to_string();
            if !value.trim().is_empty() {
                self.pairs.push((key, value));
            }
        }
        self
    }

    fn render(&self, path: &str) -> String {
        if self.pairs.is_empty() {
            return path.to_string();
        }
        let query = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{path}?{query}")
    }
}

/// Filters for `GET /users`. Unset fields are left off the query string.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub name: Option<String>,
    pub status: Option<UserStatus>,
    pub is_high_risk: Option<bool>,
    pub is_verified: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<SortDirection>,
}

impl UserQuery {
    fn path(&self) -> String {
        QueryString::default()
            .push("page", self.page)
            .push("size", self.size)
            .push("name", self.name.as_deref())
            .push("status", self.status.map(UserStatus::as_str))
            .push("isHighRisk", self.is_high_risk)
            .push("isVerified", self.is_verified)
            .push("sortBy", self.sort_by.as_deref())
            .push("sortDir", self.sort_dir.map(SortDirection::as_str))
            .render("/users")
    }
}

/// Filters for `GET /partners`.
#[derive(Debug, Clone, Default)]
pub struct PartnerQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub name: Option<String>,
    pub auth_method: Option<String>,
    pub is_active: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<SortDirection>,
}

impl PartnerQuery {
    fn path(&self) -> String {
        QueryString::default()
            .push("page", self.page)
            .push("size", self.size)
            .push("name", self.name.as_deref())
            .push("authMethod", self.auth_method.as_deref())
            .push("isActive", self.is_active)
            .push("sortBy", self.sort_by.as_deref())
            .push("sortDir", self.sort_dir.map(SortDirection::as_str))
            .render("/partners")
    }
}

/// User and partner management calls. A 401 from any of them ends the
/// session before the error is returned.
#[derive(Clone)]
pub struct Directory {
    session: Arc<SessionManager>,
}

impl Directory {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    fn api(&self) -> &ApiClient {
        self.session.api()
    }

    pub async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, ApiError> {
        let result = self.api().get(&query.path()).await;
        self.session.guard(result).await
    }

    pub async fn get_user(&self, id: u64) -> Result<User, ApiError> {
        let result = self.api().get(&format!("/users/{id}")).await;
        self.session.guard(result).await
    }

    pub async fn user_stats(&self) -> Result<UserStats, ApiError> {
        let result = self.api().get("/users/stats").await;
        self.session.guard(result).await
    }

    pub async fn update_user_status(
        &self,
        id: u64,
        status: UserStatus,
        reason: Option<&str>,
    ) -> Result<User, ApiError> {
        let body = UpdateUserStatusRequest { status, reason };
        let result = self.api().put(&format!("/users/{id}/status"), &body).await;
        self.session.guard(result).await
    }

    pub async fn update_user_risk_flag(
        &self,
        id: u64,
        is_high_risk: bool,
        reason: Option<&str>,
    ) -> Result<User, ApiError> {
        let body = UpdateRiskFlagRequest {
            is_high_risk,
            reason,
        };
        let result = self
            .api()
            .put(&format!("/users/{id}/risk-flag"), &body)
            .await;
        self.session.guard(result).await
    }

    pub async fn list_partners(&self, query: &PartnerQuery) -> Result<Page<Partner>, ApiError> {
        let result = self.api().get(&query.path()).await;
        self.session.guard(result).await
    }

    pub async fn partner_stats(&self) -> Result<PartnerStats, ApiError> {
        let result = self.api().get("/partners/stats").await;
        self.session.guard(result).await
    }

    pub async fn toggle_partner_status(&self, id: u64) -> Result<Partner, ApiError> {
        let result = self
            .api()
            .patch_empty(&format!("/partners/{id}/toggle-status"))
            .await;
        self.session.guard(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpMethod;
    use crate::state::TokenStore;
    use crate::test_support::{ok, rejected, Scripted, ScriptedTransport};
    use crate::types::{SessionState, TokenPair};
    use serde_json::json;

    const USERS_PAGE: &str = include_str!("fixtures/users_page.json");

    async fn directory(transport: &Arc<ScriptedTransport>) -> (Directory, Arc<SessionManager>) {
        transport.route(
            HttpMethod::Get,
            "/auth/me",
            ok(json!({ "id": 1, "email": "support@loyalbridge.io", "role": "SUPPORT_STAFF" })),
        );
        let tokens = TokenStore::in_memory();
        tokens
            .save(&TokenPair::from_parts(Some("acc".into()), Some("ref".into())).unwrap())
            .await
            .unwrap();
        let api = ApiClient::new(transport.clone(), tokens);
        let session = Arc::new(SessionManager::new(api).await);
        assert!(session.restore().await.is_authenticated());
        (Directory::new(session.clone()), session)
    }

    #[test]
    fn empty_query_has_no_query_string() {
        assert_eq!(UserQuery::default().path(), "/users");
        assert_eq!(PartnerQuery::default().path(), "/partners");
    }

    #[test]
    fn query_values_are_percent_encoded_and_absent_filters_omitted() {
        let query = UserQuery {
            page: Some(0),
            size: Some(10),
            name: Some("Kim & Lee".to_string()),
            status: Some(UserStatus::Frozen),
            is_high_risk: Some(true),
            sort_dir: Some(SortDirection::Desc),
            ..UserQuery::default()
        };
        assert_eq!(
            query.path(),
            "/users?page=0&size=10&name=Kim%20%26%20Lee&status=FROZEN&isHighRisk=true&sortDir=desc"
        );

        let query = PartnerQuery {
            auth_method: Some("API_KEY".to_string()),
            is_active: Some(false),
            name: Some("  ".to_string()),
            ..PartnerQuery::default()
        };
        assert_eq!(query.path(), "/partners?authMethod=API_KEY&isActive=false");
    }

    #[tokio::test]
    async fn list_users_decodes_a_page() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route(
            HttpMethod::Get,
            "/users?page=0&size=10",
            Scripted::Respond(200, USERS_PAGE.to_string()),
        );
        let (directory, _) = directory(&transport).await;

        let page = directory
            .list_users(&UserQuery {
                page: Some(0),
                size: Some(10),
                ..UserQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(page.total_elements, 21);
        assert_eq!(page.content[0].name.as_deref(), Some("Kim Lee"));
        assert_eq!(page.content[0].status, UserStatus::Active);
        assert!(page.content[0].is_verified);
    }

    #[tokio::test]
    async fn get_user_fetches_one_record_by_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route(
            HttpMethod::Get,
            "/users/7",
            ok(json!({
                "id": 7,
                "name": "Kim Lee",
                "email": "kim@example.com",
                "status": "SUSPENDED",
                "isHighRisk": true
            })),
        );
        let (directory, session) = directory(&transport).await;

        let user = directory.get_user(7).await.unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.status, UserStatus::Suspended);
        assert!(user.is_high_risk);

        let err = directory.get_user(8).await.unwrap_err();
        assert_eq!(err.status, Some(404));
        assert!(session.state().is_authenticated());
    }

    #[tokio::test]
    async fn update_user_status_sends_status_and_reason() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route(
            HttpMethod::Put,
            "/users/11/status",
            ok(json!({ "id": 11, "status": "FROZEN" })),
        );
        let (directory, _) = directory(&transport).await;

        let user = directory
            .update_user_status(11, UserStatus::Frozen, Some("chargeback"))
            .await
            .unwrap();

        assert_eq!(user.status, UserStatus::Frozen);
        let sent = transport
            .requests()
            .into_iter()
            .find(|r| r.path == "/users/11/status")
            .unwrap();
        assert_eq!(sent.body, Some(json!({ "status": "FROZEN", "reason": "chargeback" })));
        assert_eq!(sent.bearer.as_deref(), Some("acc"));
    }

    #[tokio::test]
    async fn toggle_partner_status_uses_patch() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route(
            HttpMethod::Patch,
            "/partners/4/toggle-status",
            ok(json!({ "id": 4, "name": "Acme Miles", "isActive": false })),
        );
        let (directory, _) = directory(&transport).await;

        let partner = directory.toggle_partner_status(4).await.unwrap();

        assert_eq!(partner.name, "Acme Miles");
        assert!(!partner.is_active);
    }

    #[tokio::test]
    async fn unauthorized_response_ends_the_session() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route(HttpMethod::Get, "/partners/stats", rejected(401, "Token expired"));
        let (directory, session) = directory(&transport).await;

        let err = directory.partner_stats().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.api().tokens().current().await, None);
    }

    #[tokio::test]
    async fn forbidden_response_keeps_the_session() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.route(HttpMethod::Get, "/users/stats", rejected(403, "Access denied"));
        let (directory, session) = directory(&transport).await;

        let err = directory.user_stats().await.unwrap_err();

        assert_eq!(err.message, "Access denied");
        assert!(session.state().is_authenticated());
    }
}
