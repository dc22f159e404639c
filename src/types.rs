use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Football team identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub abbreviation: String,
}

impl Team {
    pub fn new(name: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abbreviation: abbreviation.into(),
        }
    }
}

/// Player position on the pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerPosition {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl fmt::Display for PlayerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlayerPosition::Goalkeeper => "Goalkeeper",
            PlayerPosition::Defender => "Defender",
            PlayerPosition::Midfielder => "Midfielder",
            PlayerPosition::Forward => "Forward",
        };
        f.write_str(s)
    }
}

/// One roster expectation: a player we own and whether we expect them to start.
///
/// Immutable for the run once loaded; everything downstream reads it only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    pub team: Team,
    pub position: PlayerPosition,
    /// True when the player sits in the active (expected-starting) slot.
    pub expected_starting: bool,
    pub average_points: f64,
    pub games_played: Option<u32>,
    pub draft_percentage: Option<String>,
    pub opponent: Option<String>,
}

/// Match status as reported by the upstream feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    NotStarted,
    Live,
    Finished,
    Unknown,
}

/// A scheduled match. Replaced wholesale each cycle, never partially mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRef {
    pub id: String,
    pub home: Team,
    pub away: Team,
    pub kickoff: DateTime<Utc>,
    pub status: MatchStatus,
}

impl MatchRef {
    pub fn involves_team(&self, team_name: &str) -> bool {
        self.home.name == team_name || self.away.name == team_name
    }

    /// The other side of the match, from `team_name`'s point of view.
    pub fn opponent_of(&self, team_name: &str) -> Option<&str> {
        if self.home.name == team_name {
            Some(&self.away.name)
        } else if self.away.name == team_name {
            Some(&self.home.name)
        } else {
            None
        }
    }
}

/// Starting set plus bench for one side of one match. Immutable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupSnapshot {
    pub team: Team,
    pub starting: Vec<String>,
    pub bench: Vec<String>,
}

impl LineupSnapshot {
    pub fn has_starter(&self, player_name: &str) -> bool {
        self.starting.iter().any(|n| n == player_name)
    }
}

/// Normalized lineup result from the upstream feed.
///
/// A not-found response upstream means the lineup simply has not been
/// published yet; it is normalized here at the client boundary and never
/// re-interpreted downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum LineupResponse {
    NotPublished,
    Published {
        home: LineupSnapshot,
        away: LineupSnapshot,
    },
}

/// Classification of a single expectation-vs-reality comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscrepancyKind {
    BenchedUnexpectedly,
    StartedUnexpectedly,
    AsExpected,
}

impl DiscrepancyKind {
    /// Pure classification of (expected, actual).
    pub fn classify(expected_starting: bool, actually_starting: bool) -> Self {
        match (expected_starting, actually_starting) {
            (true, false) => DiscrepancyKind::BenchedUnexpectedly,
            (false, true) => DiscrepancyKind::StartedUnexpectedly,
            _ => DiscrepancyKind::AsExpected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::BenchedUnexpectedly => "benched_unexpectedly",
            DiscrepancyKind::StartedUnexpectedly => "started_unexpectedly",
            DiscrepancyKind::AsExpected => "as_expected",
        }
    }
}

/// One comparison result for one (player, match) pair in one cycle.
#[derive(Debug, Clone)]
pub struct Discrepancy {
    pub player: RosterEntry,
    pub match_id: String,
    pub expected_starting: bool,
    pub actually_starting: bool,
}

impl Discrepancy {
    pub fn kind(&self) -> DiscrepancyKind {
        DiscrepancyKind::classify(self.expected_starting, self.actually_starting)
    }
}

/// Alert urgency, ordered least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Urgency {
    Info,
    Warning,
    Important,
    Urgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Info => "info",
            Urgency::Warning => "warning",
            Urgency::Important => "important",
            Urgency::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered, urgency-classified alert ready for routing.
#[derive(Debug, Clone)]
pub struct Alert {
    pub player: RosterEntry,
    pub match_ref: MatchRef,
    pub kind: DiscrepancyKind,
    pub urgency: Urgency,
    pub message: String,
    pub context: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Per-match monitoring state. Owned and mutated exclusively by the
/// monitoring loop (single writer).
#[derive(Debug, Clone)]
pub struct WatchEntry {
    pub match_ref: MatchRef,
    /// Roster player names whose teams play in this match.
    pub roster_players: HashSet<String>,
    pub last_check: Option<Instant>,
    /// Whether any published lineup has ever been observed for this match.
    pub lineup_seen: bool,
    /// Whether the one-shot "not yet available" warning has gone out.
    pub missing_reported: bool,
    pub alerts_sent: u32,
    /// 1 = kickoff imminent … 5 = distant. Recomputed every cycle.
    pub priority: u8,
}

impl WatchEntry {
    pub fn new(match_ref: MatchRef, roster_players: HashSet<String>, priority: u8) -> Self {
        Self {
            match_ref,
            roster_players,
            last_check: None,
            lineup_seen: false,
            missing_reported: false,
            alerts_sent: 0,
            priority,
        }
    }
}
