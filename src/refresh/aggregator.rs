use super::fallback;
use super::fetch::{
    bundle, fetch_conversion_stats, fetch_partner_stats, fetch_recent_transactions,
    fetch_user_stats, SourceFailure, SourceOutcomes,
};
use crate::api::ApiClient;
use crate::types::DashboardSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, error};

fn now_iso() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[derive(Debug, Clone)]
pub struct PublishedSnapshot {
    pub snapshot: Arc<DashboardSnapshot>,
    pub refreshed_at: String,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub snapshot: Arc<DashboardSnapshot>,
    /// False when a newer refresh started before this one finished.
    pub applied: bool,
    pub failures: Vec<SourceFailure>,
}

impl RefreshReport {
    pub fn saw_unauthorized(&self) -> bool {
        self.failures.iter().any(SourceFailure::is_unauthorized)
    }
}

pub struct DashboardAggregator {
    api: ApiClient,
    recent_limit: u32,
    generation: AtomicU64,
    published: watch::Sender<Option<PublishedSnapshot>>,
}

impl DashboardAggregator {
    pub fn new(api: ApiClient, recent_limit: u32) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            api,
            recent_limit,
            generation: AtomicU64::new(0),
            published,
        }
    }

    pub fn current(&self) -> Option<Arc<DashboardSnapshot>> {
        self.published
            .borrow()
            .as_ref()
            .map(|p| Arc::clone(&p.snapshot))
    }

    pub fn last_refreshed_at(&self) -> Option<String> {
        self.published
            .borrow()
            .as_ref()
            .map(|p| p.refreshed_at.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<PublishedSnapshot>> {
        self.published.subscribe()
    }

    /// Reads all four sources concurrently and publishes the combined view
    /// unless a newer refresh has started meanwhile.
    pub async fn refresh(&self) -> RefreshReport {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (snapshot, failures) = match self.collect().await {
            Ok(outcomes) => bundle(outcomes),
            Err(err) => {
                error!(generation, error = %err, "dashboard refresh failed unexpectedly");
                (fallback::error_snapshot(), Vec::new())
            }
        };

        let snapshot = Arc::new(snapshot);
        let applied = self.publish(generation, &snapshot);
        debug!(
            generation,
            applied,
            fallbacks = snapshot.fallback_sources.len(),
            "dashboard refresh finished"
        );

        RefreshReport {
            snapshot,
            applied,
            failures,
        }
    }

    async fn collect(&self) -> Result<SourceOutcomes, JoinError> {
        let users = tokio::spawn(fetch_user_stats(self.api.clone()));
        let partners = tokio::spawn(fetch_partner_stats(self.api.clone()));
        let conversions = tokio::spawn(fetch_conversion_stats(self.api.clone()));
        let recent = tokio::spawn(fetch_recent_transactions(
            self.api.clone(),
            self.recent_limit,
        ));

        let (users, partners, conversions, recent) =
            tokio::join!(users, partners, conversions, recent);

        Ok(SourceOutcomes {
            user_stats: users?,
            partner_stats: partners?,
            conversion_stats: conversions?,
            recent_transactions: recent?,
        })
    }

    fn publish(&self, generation: u64, snapshot: &Arc<DashboardSnapshot>) -> bool {
        self.published.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = Some(PublishedSnapshot {
                snapshot: Arc::clone(snapshot),
                refreshed_at: now_iso(),
                generation,
            });
            true
        })
    }
}
