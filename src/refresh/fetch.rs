use super::fallback;
use crate::api::{ApiClient, ApiOutcome};
use crate::redact::redact_secrets;
use crate::types::{
    ConversionStats, DashboardSnapshot, DashboardSource, PartnerStats, RecentTransaction,
    UserStats,
};
use tracing::warn;

pub(crate) const USER_STATS_PATH: &str = "/users/stats";
pub(crate) const PARTNER_STATS_PATH: &str = "/partners/stats";
pub(crate) const CONVERSION_STATS_PATH: &str = "/dashboard/conversions/stats";

pub(crate) fn recent_transactions_path(limit: u32) -> String {
    format!("/dashboard/transactions/recent?limit={limit}")
}

/// A source that could not be read and was replaced by its fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: DashboardSource,
    pub message: String,
    pub status: Option<u16>,
}

impl SourceFailure {
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

pub(crate) async fn fetch_user_stats(api: ApiClient) -> ApiOutcome<UserStats> {
    api.get::<UserStats>(USER_STATS_PATH).await.into()
}

pub(crate) async fn fetch_partner_stats(api: ApiClient) -> ApiOutcome<PartnerStats> {
    api.get::<PartnerStats>(PARTNER_STATS_PATH).await.into()
}

pub(crate) async fn fetch_conversion_stats(api: ApiClient) -> ApiOutcome<ConversionStats> {
    api.get::<ConversionStats>(CONVERSION_STATS_PATH).await.into()
}

pub(crate) async fn fetch_recent_transactions(
    api: ApiClient,
    limit: u32,
) -> ApiOutcome<Vec<RecentTransaction>> {
    api.get::<Vec<RecentTransaction>>(&recent_transactions_path(limit)).await.into()
}

pub(crate) struct SourceOutcomes {
    pub(crate) user_stats: ApiOutcome<UserStats>,
    pub(crate) partner_stats: ApiOutcome<PartnerStats>,
    pub(crate) conversion_stats: ApiOutcome<ConversionStats>,
    pub(crate) recent_transactions: ApiOutcome<Vec<RecentTransaction>>,
}

struct Assembler {
    fallback_sources: Vec<DashboardSource>,
    failures: Vec<SourceFailure>,
}

impl Assembler {
    fn take<T>(
        &mut self,
        source: DashboardSource,
        outcome: ApiOutcome<T>,
        fallback: fn() -> T,
    ) -> T {
        match outcome {
            ApiOutcome::Ok { data } => data,
            ApiOutcome::Failed { message, status } => {
                warn!(
                    source = %source,
                    status = ?status,
                    error = %redact_secrets(&message),
                    "dashboard source failed; using fallback"
                );
                self.fallback_sources.push(source);
                self.failures.push(SourceFailure {
                    source,
                    message,
                    status,
                });
                fallback()
            }
        }
    }
}

/// Folds the four outcomes into one complete snapshot.
pub(crate) fn bundle(outcomes: SourceOutcomes) -> (DashboardSnapshot, Vec<SourceFailure>) {
    let mut asm = Assembler {
        fallback_sources: Vec::new(),
        failures: Vec::new(),
    };

    let user_stats = asm.take(
        DashboardSource::UserStats,
        outcomes.user_stats,
        fallback::user_stats,
    );
    let partner_stats = asm.take(
        DashboardSource::PartnerStats,
        outcomes.partner_stats,
        fallback::partner_stats,
    );
    let conversion_stats = asm.take(
        DashboardSource::ConversionStats,
        outcomes.conversion_stats,
        fallback::conversion_stats,
    );
    let recent_transactions = asm.take(
        DashboardSource::RecentTransactions,
        outcomes.recent_transactions,
        fallback::recent_transactions,
    );

    let snapshot = DashboardSnapshot {
        user_stats,
        partner_stats,
        conversion_stats,
        recent_transactions,
        system_health: fallback::healthy_system(),
        fallback_sources: asm.fallback_sources,
    };
    (snapshot, asm.failures)
}
