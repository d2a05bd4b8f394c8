use crate::types::{
    ConsoleView, DashboardSnapshot, DashboardSource, OperatorProfile, Page, Partner,
    RecentTransaction, User,
};
use chrono::NaiveDateTime;
use std::fmt::Write;

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub(crate) fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Two decimals with thousands separators; non-finite values render as `--`.
pub(crate) fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return "--".to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{}.{frac}", group_thousands(whole))
}

pub(crate) fn format_percent(value: f64) -> String {
    if !value.is_finite() {
        return "--%".to_string();
    }
    format!("{value:.1}%")
}

pub(crate) fn format_timestamp(value: Option<NaiveDateTime>) -> String {
    value
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "--".to_string())
}

fn or_dash(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("--")
}

pub(crate) fn render_profile(profile: &OperatorProfile) -> String {
    let views = [
        ConsoleView::Dashboard,
        ConsoleView::Users,
        ConsoleView::Partners,
        ConsoleView::Analytics,
        ConsoleView::Settings,
    ]
    .into_iter()
    .filter(|v| profile.role.can_view(*v))
    .map(|v| format!("{v:?}").to_lowercase())
    .collect::<Vec<_>>()
    .join(", ");

    format!(
        "{} <{}>\nRole: {}\nViews: {views}\n",
        profile.display_name,
        profile.email,
        profile.role.label()
    )
}

fn render_transaction(out: &mut String, tx: &RecentTransaction) {
    let _ = writeln!(
        out,
        "  #{:<5} {:<16} {:<18} {:>10} pts  {:<10} {}",
        tx.id,
        or_dash(tx.user_name.as_deref()),
        or_dash(tx.partner_name.as_deref()),
        format_amount(tx.points_amount),
        tx.status,
        format_timestamp(tx.timestamp)
    );
}

pub(crate) fn render_dashboard(
    snapshot: &DashboardSnapshot,
    refreshed_at: Option<&str>,
) -> String {
    let mut out = String::new();
    let users = &snapshot.user_stats;
    let partners = &snapshot.partner_stats;
    let conversions = &snapshot.conversion_stats;
    let health = &snapshot.system_health;

    let _ = writeln!(
        out,
        "System: {} ({} active sessions, database {})",
        health.status,
        format_count(health.active_sessions),
        health.database_status
    );
    if let Some(at) = refreshed_at {
        let _ = writeln!(out, "Refreshed: {at}");
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Users        {} total, {} active, {} verified, {} high risk",
        format_count(users.total_users),
        format_count(users.active_users),
        format_count(users.verified_users),
        format_count(users.high_risk_users)
    );
    let _ = writeln!(
        out,
        "Points       {} in system",
        format_amount(users.total_points_in_system)
    );
    let _ = writeln!(
        out,
        "Partners     {} total, {} active, {} transactions, {} processed",
        format_count(partners.total_partners),
        format_count(partners.active_partners),
        format_count(partners.total_transactions),
        format_amount(partners.total_amount_processed)
    );
    let _ = writeln!(
        out,
        "Conversions  {} total, {} completed, {} pending, {} failed, {} success",
        format_count(conversions.total_conversions),
        format_count(conversions.completed_conversions),
        format_count(conversions.pending_conversions),
        format_count(conversions.failed_conversions),
        format_percent(conversions.conversion_success_rate)
    );

    let _ = writeln!(out, "\nRecent transactions:");
    if snapshot.recent_transactions.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for tx in &snapshot.recent_transactions {
        render_transaction(&mut out, tx);
    }

    let names = DashboardSource::ALL
        .into_iter()
        .filter(|s| snapshot.used_fallback(*s))
        .map(DashboardSource::label)
        .collect::<Vec<_>>();
    if !names.is_empty() {
        let _ = writeln!(out, "\nShowing placeholder data for: {}", names.join(", "));
    }
    out
}

fn render_page_footer<T>(out: &mut String, page: &Page<T>) {
    let _ = writeln!(
        out,
        "Page {} of {} ({} total)",
        page.number + 1,
        page.total_pages.max(1),
        format_count(page.total_elements)
    );
}

fn render_user_row(out: &mut String, user: &User) {
    let mut flags = Vec::new();
    if user.is_verified {
        flags.push("verified");
    }
    if user.is_high_risk {
        flags.push("high-risk");
    }
    let _ = writeln!(
        out,
        "#{:<6} {:<20} {:<28} {:<10} {:>12} pts  {}",
        user.id,
        or_dash(user.name.as_deref()),
        or_dash(user.email.as_deref()),
        user.status.as_str(),
        format_amount(user.total_points),
        flags.join(",")
    );
}

pub(crate) fn render_user(user: &User) -> String {
    let mut out = String::new();
    render_user_row(&mut out, user);
    out
}

pub(crate) fn render_users(page: &Page<User>) -> String {
    let mut out = String::new();
    for user in &page.content {
        render_user_row(&mut out, user);
    }
    render_page_footer(&mut out, page);
    out
}

pub(crate) fn render_partners(page: &Page<Partner>) -> String {
    let mut out = String::new();
    for partner in &page.content {
        let _ = writeln!(
            out,
            "#{:<6} {:<22} {:<10} {:<8} rate {:<8} {:>8} tx  {:>14}",
            partner.id,
            partner.name,
            or_dash(partner.auth_method.as_deref()),
            if partner.is_active { "active" } else { "inactive" },
            partner.conversion_rate,
            format_count(partner.total_transactions),
            format_amount(partner.total_amount_processed)
        );
    }
    render_page_footer(&mut out, page);
    out
}
