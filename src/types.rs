use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use ts_rs::TS;

/// Java `Long`/`BigDecimal` fields arrive as `null` when unset; treat that as zero.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    SuperAdmin,
    FinanceTeam,
    SupportStaff,
    PartnerAdmin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ConsoleView {
    Dashboard,
    Users,
    Partners,
    Analytics,
    Settings,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::SuperAdmin => "Super Admin",
            Self::FinanceTeam => "Finance Team",
            Self::SupportStaff => "Support Staff",
            Self::PartnerAdmin => "Partner Admin",
        }
    }

    /// Mirrors the backend's role checks so the console can hide views that
    /// would only answer 403. The server remains the authority.
    pub fn can_view(self, view: ConsoleView) -> bool {
        match view {
            ConsoleView::Dashboard | ConsoleView::Settings => true,
            ConsoleView::Users => matches!(
                self,
                Self::SuperAdmin | Self::SupportStaff | Self::FinanceTeam
            ),
            ConsoleView::Partners => matches!(
                self,
                Self::SuperAdmin | Self::PartnerAdmin | Self::FinanceTeam
            ),
            ConsoleView::Analytics => matches!(
                self,
                Self::SuperAdmin | Self::FinanceTeam | Self::SupportStaff
            ),
        }
    }
}

/// Login input. Held only for the duration of the login call.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"[PROTECTED]")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    /// Builds a pair only when both halves are present and non-blank.
    pub fn from_parts(access_token: Option<String>, refresh_token: Option<String>) -> Option<Self> {
        let access_token = access_token
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())?;
        let refresh_token = refresh_token
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())?;
        Some(Self {
            access_token,
            refresh_token,
        })
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[PROTECTED]")
            .field("refresh_token", &"[PROTECTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OperatorProfile {
    pub id: u64,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

/// Admin record as returned by `/auth/me`, `/auth/login` and `/auth/verify-2fa`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminInfo {
    pub id: u64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl From<AdminInfo> for OperatorProfile {
    fn from(admin: AdminInfo) -> Self {
        let display_name = non_blank(admin.full_name.as_deref())
            .map(str::to_string)
            .or_else(|| {
                let joined = [admin.first_name.as_deref(), admin.last_name.as_deref()]
                    .into_iter()
                    .filter_map(non_blank)
                    .collect::<Vec<_>>()
                    .join(" ");
                (!joined.is_empty()).then_some(joined)
            })
            .unwrap_or_else(|| admin.email.clone());

        Self {
            id: admin.id,
            email: admin.email,
            display_name,
            role: admin.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(tag = "state", rename_all = "snake_case")]
#[ts(export)]
pub enum SessionState {
    Unauthenticated,
    Restoring,
    PendingTwoFactor {
        identifier: String,
        #[serde(rename = "challengeMessage")]
        challenge_message: String,
    },
    Authenticated {
        profile: OperatorProfile,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Restoring => "restoring",
            Self::PendingTwoFactor { .. } => "pending_two_factor",
            Self::Authenticated { .. } => "authenticated",
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub fn profile(&self) -> Option<&OperatorProfile> {
        match self {
            Self::Authenticated { profile } => Some(profile),
            _ => None,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct TwoFactorRequest<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub admin: Option<AdminInfo>,
    #[serde(default, rename = "requires2FA")]
    pub requires_two_factor: bool,
    #[serde(default)]
    pub otp_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserStats {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_users: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active_users: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub frozen_users: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suspended_users: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inactive_users: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub verified_users: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub high_risk_users: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_points_in_system: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_lifetime_earnings: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_lifetime_redemptions: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PartnerStats {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_partners: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active_partners: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inactive_partners: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_amount_processed: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_transactions: u64,
    #[serde(default)]
    pub top_partner_by_transactions: Option<String>,
    #[serde(default)]
    pub top_partner_by_amount: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ConversionStats {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_conversions: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed_conversions: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pending_conversions: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub failed_conversions: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_points_converted: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_amount_converted: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversion_success_rate: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub today_conversions: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weekly_conversions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RecentTransaction {
    pub id: u64,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub partner_name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub points_amount: f64,
    #[serde(default)]
    pub converted_amount: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SystemHealth {
    pub status: String,
    pub active_sessions: u64,
    pub database_status: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DashboardSource {
    UserStats,
    PartnerStats,
    ConversionStats,
    RecentTransactions,
}

impl DashboardSource {
    pub const ALL: [DashboardSource; 4] = [
        Self::UserStats,
        Self::PartnerStats,
        Self::ConversionStats,
        Self::RecentTransactions,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::UserStats => "User Stats",
            Self::PartnerStats => "Partner Stats",
            Self::ConversionStats => "Conversion Stats",
            Self::RecentTransactions => "Recent Transactions",
        }
    }
}

impl fmt::Display for DashboardSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One complete dashboard view. Every field is populated, either live or
/// from the fallback table; `fallback_sources` lists the substituted ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardSnapshot {
    pub user_stats: UserStats,
    pub partner_stats: PartnerStats,
    pub conversion_stats: ConversionStats,
    pub recent_transactions: Vec<RecentTransaction>,
    pub system_health: SystemHealth,
    pub fallback_sources: Vec<DashboardSource>,
}

impl DashboardSnapshot {
    pub fn used_fallback(&self, source: DashboardSource) -> bool {
        self.fallback_sources.contains(&source)
    }

    pub fn is_error(&self) -> bool {
        self.system_health.status == crate::refresh::HEALTH_STATUS_ERROR
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum UserStatus {
    Active,
    Frozen,
    Suspended,
    Inactive,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Frozen => "FROZEN",
            Self::Suspended => "SUSPENDED",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "FROZEN" => Ok(Self::Frozen),
            "SUSPENDED" => Ok(Self::Suspended),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(format!(
                "unknown user status `{other}` (expected ACTIVE, FROZEN, SUSPENDED or INACTIVE)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub status: UserStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_points: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lifetime_earnings: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lifetime_redemptions: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_high_risk: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_verified: bool,
    #[serde(default)]
    pub last_activity: Option<NaiveDateTime>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Partner {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub auth_method: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversion_rate: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_transactions: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_amount_processed: f64,
    #[serde(default)]
    pub last_transaction_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

/// Spring Data page as serialized by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateUserStatusRequest<'a> {
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateRiskFlagRequest<'a> {
    pub is_high_risk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_view_table_matches_backend_roles() {
        assert!(Role::PartnerAdmin.can_view(ConsoleView::Dashboard));
        assert!(!Role::PartnerAdmin.can_view(ConsoleView::Users));
        assert!(Role::PartnerAdmin.can_view(ConsoleView::Partners));
        assert!(!Role::SupportStaff.can_view(ConsoleView::Partners));
        assert!(Role::FinanceTeam.can_view(ConsoleView::Analytics));
        assert!(!Role::PartnerAdmin.can_view(ConsoleView::Analytics));
        assert!(Role::SuperAdmin.can_view(ConsoleView::Users));
    }

    #[test]
    fn token_pair_requires_both_halves() {
        assert!(TokenPair::from_parts(Some("a".into()), None).is_none());
        assert!(TokenPair::from_parts(Some("  ".into()), Some("r".into())).is_none());
        let pair = TokenPair::from_parts(Some("a".into()), Some("r".into())).unwrap();
        assert_eq!(pair.access_token, "a");
        assert_eq!(pair.refresh_token, "r");
    }

    #[test]
    fn secrets_are_hidden_from_debug_output() {
        let creds = Credentials::new("admin@loyalbridge.io", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));

        let pair = TokenPair::from_parts(Some("acc-123".into()), Some("ref-456".into())).unwrap();
        let out = format!("{pair:?}");
        assert!(!out.contains("acc-123"));
        assert!(!out.contains("ref-456"));
    }

    #[test]
    fn operator_profile_display_name_prefers_full_name() {
        let admin: AdminInfo = serde_json::from_value(json!({
            "id": 1,
            "email": "admin@loyalbridge.io",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "fullName": "Ada Lovelace",
            "role": "SUPER_ADMIN"
        }))
        .unwrap();
        assert_eq!(OperatorProfile::from(admin).display_name, "Ada Lovelace");

        let admin: AdminInfo = serde_json::from_value(json!({
            "id": 2,
            "email": "finance@loyalbridge.io",
            "firstName": "Grace",
            "lastName": null,
            "role": "FINANCE_TEAM"
        }))
        .unwrap();
        assert_eq!(OperatorProfile::from(admin).display_name, "Grace");

        let admin: AdminInfo = serde_json::from_value(json!({
            "id": 3,
            "email": "support@loyalbridge.io",
            "role": "SUPPORT_STAFF"
        }))
        .unwrap();
        let profile = OperatorProfile::from(admin);
        assert_eq!(profile.display_name, "support@loyalbridge.io");
        assert_eq!(profile.role, Role::SupportStaff);
    }

    #[test]
    fn stats_decode_null_fields_as_zero() {
        let stats: UserStats = serde_json::from_str(
            r#"{"totalUsers":10,"activeUsers":null,"totalPointsInSystem":1250.50}"#,
        )
        .unwrap();
        assert_eq!(stats.total_users, 10);
        assert_eq!(stats.active_users, 0);
        assert_eq!(stats.frozen_users, 0);
        assert_eq!(stats.total_points_in_system, 1250.5);
    }

    #[test]
    fn recent_transaction_parses_local_datetime() {
        let tx: RecentTransaction = serde_json::from_value(json!({
            "id": 7,
            "userName": "Kim",
            "partnerName": null,
            "type": "CONVERSION",
            "pointsAmount": 40,
            "status": "COMPLETED",
            "timestamp": "2024-03-01T12:30:15.123"
        }))
        .unwrap();
        assert_eq!(tx.kind.as_deref(), Some("CONVERSION"));
        assert_eq!(tx.points_amount, 40.0);
        assert!(tx.timestamp.is_some());
    }

    #[test]
    fn session_state_serializes_with_state_tag() {
        let state = SessionState::PendingTwoFactor {
            identifier: "admin@loyalbridge.io".to_string(),
            challenge_message: "OTP sent".to_string(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "pending_two_factor");
        assert_eq!(json["challengeMessage"], "OTP sent");
    }

    #[test]
    fn user_status_parses_case_insensitively() {
        assert_eq!("frozen".parse::<UserStatus>().unwrap(), UserStatus::Frozen);
        assert!("banned".parse::<UserStatus>().is_err());
    }
}
