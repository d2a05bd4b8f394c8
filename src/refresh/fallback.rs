use super::{HEALTH_STATUS_ERROR, HEALTH_STATUS_HEALTHY};
use crate::types::{
    ConversionStats, DashboardSnapshot, PartnerStats, RecentTransaction, SystemHealth, UserStats,
};
use chrono::{NaiveDate, NaiveDateTime};

pub(crate) fn user_stats() -> UserStats {
    UserStats {
        total_users: 156,
        active_users: 134,
        total_points_in_system: 52_430.0,
        verified_users: 98,
        high_risk_users: 12,
        ..UserStats::default()
    }
}

pub(crate) fn partner_stats() -> PartnerStats {
    PartnerStats {
        total_partners: 7,
        active_partners: 6,
        total_transactions: 2_340,
        total_amount_processed: 45_600.0,
        ..PartnerStats::default()
    }
}

pub(crate) fn conversion_stats() -> ConversionStats {
    ConversionStats {
        total_conversions: 1_856,
        conversion_success_rate: 94.8,
        completed_conversions: 1_760,
        pending_conversions: 42,
        failed_conversions: 54,
        ..ConversionStats::default()
    }
}

fn at(day: u32, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2024, 1, day).and_then(|d| d.and_hms_opt(hour, minute, 0))
}

fn placeholder(
    id: u64,
    user: &str,
    partner: &str,
    points: f64,
    status: &str,
    timestamp: Option<NaiveDateTime>,
) -> RecentTransaction {
    RecentTransaction {
        id,
        user_name: Some(user.to_string()),
        partner_name: Some(partner.to_string()),
        kind: Some("CONVERSION".to_string()),
        points_amount: points,
        converted_amount: None,
        status: status.to_string(),
        timestamp,
    }
}

pub(crate) fn recent_transactions() -> Vec<RecentTransaction> {
    vec![
        placeholder(1, "John Doe", "Amazon Rewards", 150.0, "COMPLETED", at(15, 10, 30)),
        placeholder(2, "Jane Smith", "Starbucks Plus", 75.0, "PENDING", at(15, 9, 45)),
        placeholder(3, "Bob Johnson", "Netflix Premium", 200.0, "COMPLETED", at(15, 9, 15)),
        placeholder(4, "Alice Brown", "PayPal Cash", 120.0, "FAILED", at(14, 16, 20)),
        placeholder(5, "Charlie Wilson", "Uber Credits", 90.0, "COMPLETED", at(14, 14, 10)),
    ]
}

pub(crate) fn healthy_system() -> SystemHealth {
    SystemHealth {
        status: HEALTH_STATUS_HEALTHY.to_string(),
        active_sessions: 3,
        database_status: "Connected".to_string(),
    }
}

/// Shown only when the refresh itself broke, not when sources failed.
pub(crate) fn error_snapshot() -> DashboardSnapshot {
    DashboardSnapshot {
        user_stats: UserStats::default(),
        partner_stats: PartnerStats::default(),
        conversion_stats: ConversionStats::default(),
        recent_transactions: Vec::new(),
        system_health: SystemHealth {
            status: HEALTH_STATUS_ERROR.to_string(),
            active_sessions: 0,
            database_status: "Unknown".to_string(),
        },
        fallback_sources: Vec::new(),
    }
}
