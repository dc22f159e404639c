use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::types::{Alert, Discrepancy, DiscrepancyKind, MatchRef, RosterEntry, Urgency};

/// Urgency assigned to each classification.
pub fn urgency_for(kind: DiscrepancyKind) -> Urgency {
    match kind {
        DiscrepancyKind::BenchedUnexpectedly => Urgency::Urgent,
        DiscrepancyKind::StartedUnexpectedly => Urgency::Important,
        DiscrepancyKind::AsExpected => Urgency::Info,
    }
}

/// Per-classification counts for operational logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertSummary {
    pub total: usize,
    pub urgent: usize,
    pub important: usize,
    pub info: usize,
    pub warning: usize,
    pub benchings: usize,
    pub unexpected_starts: usize,
    pub confirmations: usize,
}

/// Turn discrepancies into rendered, urgency-classified alerts.
///
/// When `include_confirmations` is false, as-expected results are dropped
/// rather than rendered as info alerts.
pub fn generate(
    discrepancies: &[Discrepancy],
    match_ref: &MatchRef,
    include_confirmations: bool,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for discrepancy in discrepancies {
        let kind = discrepancy.kind();
        if kind == DiscrepancyKind::AsExpected && !include_confirmations {
            continue;
        }
        debug!(
            "generating {} alert for {}",
            kind.as_str(),
            discrepancy.player.name
        );
        alerts.push(Alert {
            player: discrepancy.player.clone(),
            match_ref: match_ref.clone(),
            kind,
            urgency: urgency_for(kind),
            message: render_message(discrepancy, match_ref),
            context: build_context(discrepancy, match_ref),
            timestamp: Utc::now(),
        });
    }
    alerts
}

fn render_message(discrepancy: &Discrepancy, match_ref: &MatchRef) -> String {
    let player = &discrepancy.player;
    let opponent = match_ref
        .opponent_of(&player.team.name)
        .unwrap_or("Unknown");
    let kickoff = match_ref.kickoff.format("%H:%M");
    let games_played = player
        .games_played
        .map(|g| g.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let draft = player.draft_percentage.as_deref().unwrap_or("N/A");

    match discrepancy.kind() {
        DiscrepancyKind::BenchedUnexpectedly => format!(
            "🚨 **{name}** BENCHED!\n\n\
             **Team:** {team}\n\
             **Position:** {position}\n\
             **Match:** {home} vs {away}\n\
             **Kickoff:** {kickoff}\n\
             **Games Played:** {games_played}\n\n\
             ⚠️ You may want to update your lineup!",
            name = player.name,
            team = player.team.name,
            position = player.position,
            home = match_ref.home.name,
            away = match_ref.away.name,
        ),
        DiscrepancyKind::StartedUnexpectedly => format!(
            "⚡ **{name}** STARTING!\n\n\
             **Team:** {team}\n\
             **Position:** {position}\n\
             **Match:** {home} vs {away}\n\
             **Kickoff:** {kickoff}\n\
             **Avg Points:** {avg:.1}\n\
             **Draft %:** {draft}\n\n\
             💡 Consider moving to starting XI!",
            name = player.name,
            team = player.team.name,
            position = player.position,
            home = match_ref.home.name,
            away = match_ref.away.name,
            avg = player.average_points,
        ),
        DiscrepancyKind::AsExpected => {
            if discrepancy.expected_starting && discrepancy.actually_starting {
                format!(
                    "✅ {} confirmed starting for {} vs {opponent}",
                    player.name, player.team.name
                )
            } else {
                format!(
                    "✅ {} lineup status as expected ({})",
                    player.name, player.team.name
                )
            }
        }
    }
}

fn build_context(discrepancy: &Discrepancy, match_ref: &MatchRef) -> Map<String, Value> {
    let player = &discrepancy.player;
    let mut context = Map::new();
    context.insert("player_id".into(), json!(player.id));
    context.insert("team_abbreviation".into(), json!(player.team.abbreviation));
    context.insert("match_id".into(), json!(match_ref.id));
    context.insert(
        "kickoff_timestamp".into(),
        json!(match_ref.kickoff.to_rfc3339()),
    );
    context.insert(
        "player_data".into(),
        json!({
            "games_played": player.games_played,
            "average_points": player.average_points,
            "draft_percentage": player.draft_percentage,
            "opponent": player.opponent,
        }),
    );
    context.insert(
        "discrepancy".into(),
        json!({
            "expected_starting": discrepancy.expected_starting,
            "actually_starting": discrepancy.actually_starting,
            "kind": discrepancy.kind().as_str(),
        }),
    );
    context
}

/// Keep only alerts at or above the given urgency.
pub fn filter_by_min_urgency(alerts: Vec<Alert>, min_urgency: Urgency) -> Vec<Alert> {
    alerts
        .into_iter()
        .filter(|a| a.urgency >= min_urgency)
        .collect()
}

/// Group alerts by the player's team name.
pub fn group_by_team(alerts: &[Alert]) -> HashMap<String, Vec<&Alert>> {
    let mut grouped: HashMap<String, Vec<&Alert>> = HashMap::new();
    for alert in alerts {
        grouped
            .entry(alert.player.team.name.clone())
            .or_default()
            .push(alert);
    }
    grouped
}

/// Aggregate counts by urgency and classification.
pub fn summarize(alerts: &[Alert]) -> AlertSummary {
    let mut summary = AlertSummary {
        total: alerts.len(),
        ..AlertSummary::default()
    };
    for alert in alerts {
        match alert.urgency {
            Urgency::Urgent => summary.urgent += 1,
            Urgency::Important => summary.important += 1,
            Urgency::Info => summary.info += 1,
            Urgency::Warning => summary.warning += 1,
        }
        match alert.kind {
            DiscrepancyKind::BenchedUnexpectedly => summary.benchings += 1,
            DiscrepancyKind::StartedUnexpectedly => summary.unexpected_starts += 1,
            DiscrepancyKind::AsExpected => summary.confirmations += 1,
        }
    }
    summary
}
