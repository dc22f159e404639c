use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::types::{Discrepancy, DiscrepancyKind, LineupSnapshot, MatchRef, RosterEntry};

/// Player-name matching policy between roster and lineup.
///
/// `Exact` is the default: case-sensitive string equality, no diacritic
/// folding. `Normalized` lower-cases and folds diacritics before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameMatching {
    #[default]
    Exact,
    Normalized,
}

/// Lower-case a name and fold common Latin diacritics for tolerant matching.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .flat_map(|c| {
            let folded = match c {
                'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
                'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'a',
                'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
                'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
                'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => 'o',
                'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
                'ý' | 'ÿ' | 'Ý' => 'y',
                'ñ' | 'Ñ' => 'n',
                'ç' | 'Ç' => 'c',
                'š' | 'Š' => 's',
                'ž' | 'Ž' => 'z',
                'ć' | 'č' | 'Ć' | 'Č' => 'c',
                'ı' | 'İ' => 'i',
                'ğ' | 'Ğ' => 'g',
                'ß' => 's',
                other => other,
            };
            folded.to_lowercase()
        })
        .collect()
}

/// Per-classification counts for one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub total: usize,
    pub benched: usize,
    pub started: usize,
    pub as_expected: usize,
}

/// Compares roster expectations against actual lineups.
///
/// Pure: identical inputs always produce identical discrepancy sets.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    matching: NameMatching,
}

impl Analyzer {
    pub fn new(matching: NameMatching) -> Self {
        Self { matching }
    }

    /// One discrepancy per roster player whose team plays in this match.
    /// Players on uninvolved teams produce nothing.
    pub fn analyze(
        &self,
        match_ref: &MatchRef,
        home: &LineupSnapshot,
        away: &LineupSnapshot,
        roster: &[RosterEntry],
    ) -> Vec<Discrepancy> {
        let starters_by_team: HashMap<&str, HashSet<&str>> = [home, away]
            .into_iter()
            .map(|lineup| {
                (
                    lineup.team.name.as_str(),
                    lineup.starting.iter().map(String::as_str).collect(),
                )
            })
            .collect();

        let mut discrepancies = Vec::new();
        for player in roster {
            if !match_ref.involves_team(&player.team.name) {
                continue;
            }
            let starters = starters_by_team
                .get(player.team.name.as_str())
                .cloned()
                .unwrap_or_default();
            let actually_starting = self.is_starting(&player.name, &starters);

            debug!(
                "{} ({}): expected {}, actually {}",
                player.name,
                player.team.name,
                if player.expected_starting { "starting" } else { "bench" },
                if actually_starting { "starting" } else { "not starting" },
            );

            discrepancies.push(Discrepancy {
                player: player.clone(),
                match_id: match_ref.id.clone(),
                expected_starting: player.expected_starting,
                actually_starting,
            });
        }
        discrepancies
    }

    fn is_starting(&self, player_name: &str, starters: &HashSet<&str>) -> bool {
        match self.matching {
            NameMatching::Exact => starters.contains(player_name),
            NameMatching::Normalized => {
                let wanted = normalize_name(player_name);
                starters.iter().any(|s| normalize_name(s) == wanted)
            }
        }
    }
}

/// Per-classification counts, for operational logging.
pub fn summarize(discrepancies: &[Discrepancy]) -> AnalysisSummary {
    let mut summary = AnalysisSummary {
        total: discrepancies.len(),
        ..AnalysisSummary::default()
    };
    for d in discrepancies {
        match d.kind() {
            DiscrepancyKind::BenchedUnexpectedly => summary.benched += 1,
            DiscrepancyKind::StartedUnexpectedly => summary.started += 1,
            DiscrepancyKind::AsExpected => summary.as_expected += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchStatus, PlayerPosition, Team};
    use chrono::Utc;

    fn entry(name: &str, team: &str, expected_starting: bool) -> RosterEntry {
        RosterEntry {
            id: name.to_lowercase(),
            name: name.to_string(),
            team: Team::new(team, &team[..3.min(team.len())]),
            position: PlayerPosition::Midfielder,
            expected_starting,
            average_points: 10.0,
            games_played: Some(12),
            draft_percentage: Some("88".into()),
            opponent: None,
        }
    }

    fn match_ref() -> MatchRef {
        MatchRef {
            id: "55".into(),
            home: Team::new("Arsenal", "ARS"),
            away: Team::new("Chelsea", "CHE"),
            kickoff: Utc::now(),
            status: MatchStatus::NotStarted,
        }
    }

    fn snapshot(team: &str, starters: &[&str]) -> LineupSnapshot {
        LineupSnapshot {
            team: Team::new(team, &team[..3.min(team.len())]),
            starting: starters.iter().map(|s| s.to_string()).collect(),
            bench: Vec::new(),
        }
    }

    #[test]
    fn benched_player_detected() {
        let roster = vec![entry("Saka", "Arsenal", true)];
        let home = snapshot("Arsenal", &["Martinelli", "Odegaard"]);
        let away = snapshot("Chelsea", &["Palmer"]);

        let found = Analyzer::default().analyze(&match_ref(), &home, &away, &roster);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind(), DiscrepancyKind::BenchedUnexpectedly);
    }

    #[test]
    fn unexpected_starter_detected() {
        let roster = vec![entry("Nwaneri", "Arsenal", false)];
        let home = snapshot("Arsenal", &["Nwaneri"]);
        let away = snapshot("Chelsea", &[]);

        let found = Analyzer::default().analyze(&match_ref(), &home, &away, &roster);
        assert_eq!(found[0].kind(), DiscrepancyKind::StartedUnexpectedly);
    }

    #[test]
    fn uninvolved_team_produces_nothing() {
        let roster = vec![entry("Salah", "Liverpool", true)];
        let home = snapshot("Arsenal", &["Saka"]);
        let away = snapshot("Chelsea", &["Palmer"]);

        let found = Analyzer::default().analyze(&match_ref(), &home, &away, &roster);
        assert!(found.is_empty());
    }

    #[test]
    fn exact_matching_is_case_sensitive() {
        let roster = vec![entry("Saka", "Arsenal", true)];
        let home = snapshot("Arsenal", &["SAKA"]);
        let away = snapshot("Chelsea", &[]);

        let found = Analyzer::default().analyze(&match_ref(), &home, &away, &roster);
        // Exact match misses the differently-cased name.
        assert_eq!(found[0].kind(), DiscrepancyKind::BenchedUnexpectedly);
    }

    #[test]
    fn normalized_matching_folds_diacritics() {
        let roster = vec![entry("Odegaard", "Arsenal", true)];
        let home = snapshot("Arsenal", &["Ødegaard"]);
        let away = snapshot("Chelsea", &[]);

        let analyzer = Analyzer::new(NameMatching::Normalized);
        let found = analyzer.analyze(&match_ref(), &home, &away, &roster);
        assert_eq!(found[0].kind(), DiscrepancyKind::AsExpected);
        assert!(found[0].actually_starting);
    }

    #[test]
    fn analysis_is_idempotent() {
        let roster = vec![
            entry("Saka", "Arsenal", true),
            entry("Palmer", "Chelsea", false),
            entry("Salah", "Liverpool", true),
        ];
        let home = snapshot("Arsenal", &["Saka"]);
        let away = snapshot("Chelsea", &["Palmer"]);
        let analyzer = Analyzer::default();

        let first = analyzer.analyze(&match_ref(), &home, &away, &roster);
        let second = analyzer.analyze(&match_ref(), &home, &away, &roster);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.player.name, b.player.name);
            assert_eq!(a.kind(), b.kind());
            assert_eq!(a.actually_starting, b.actually_starting);
        }
    }

    #[test]
    fn summary_counts_by_kind() {
        let roster = vec![
            entry("Saka", "Arsenal", true),     // starting: as expected
            entry("Havertz", "Arsenal", true),  // missing: benched
            entry("Palmer", "Chelsea", false),  // starting: unexpected
        ];
        let home = snapshot("Arsenal", &["Saka"]);
        let away = snapshot("Chelsea", &["Palmer"]);

        let found = Analyzer::default().analyze(&match_ref(), &home, &away, &roster);
        let summary = summarize(&found);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.benched, 1);
        assert_eq!(summary.started, 1);
        assert_eq!(summary.as_expected, 1);
    }

    #[test]
    fn normalize_name_folds_and_lowercases() {
        assert_eq!(normalize_name("Ødegaard"), "odegaard");
        assert_eq!(normalize_name("Sørloth"), "sorloth");
        assert_eq!(normalize_name("Kudus"), "kudus");
    }
}
