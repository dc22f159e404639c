use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::types::{PlayerPosition, RosterEntry, Team};

/// Team abbreviation to full name mapping for the tracked league.
const TEAM_ABBREVIATIONS: &[(&str, &str)] = &[
    ("ARS", "Arsenal"),
    ("AVL", "Aston Villa"),
    ("BOU", "Bournemouth"),
    ("BRF", "Brentford"),
    ("BHA", "Brighton"),
    ("CHE", "Chelsea"),
    ("CRY", "Crystal Palace"),
    ("EVE", "Everton"),
    ("FUL", "Fulham"),
    ("IPS", "Ipswich Town"),
    ("LEE", "Leeds United"),
    ("LEI", "Leicester City"),
    ("LIV", "Liverpool"),
    ("MCI", "Manchester City"),
    ("MUN", "Manchester United"),
    ("NEW", "Newcastle United"),
    ("NOT", "Nottingham Forest"),
    ("SOU", "Southampton"),
    ("SUN", "Sunderland"),
    ("TOT", "Tottenham"),
    ("WHU", "West Ham United"),
    ("WOL", "Wolverhampton Wanderers"),
];

/// Alternative names different data sources use for the same team.
const TEAM_NAME_VARIANTS: &[(&str, &str)] = &[
    ("Brighton & Hove Albion", "Brighton"),
    ("Brighton and Hove Albion", "Brighton"),
    ("Tottenham Hotspur", "Tottenham"),
    ("Spurs", "Tottenham"),
    ("Man United", "Manchester United"),
    ("Man City", "Manchester City"),
    ("Newcastle", "Newcastle United"),
    ("West Ham", "West Ham United"),
    ("Wolves", "Wolverhampton Wanderers"),
    ("Nottm Forest", "Nottingham Forest"),
];

/// Expand a team abbreviation to its full name, passing unknown values through.
pub fn full_team_name(abbreviation: &str) -> String {
    let upper = abbreviation.to_uppercase();
    TEAM_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == upper)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| abbreviation.to_string())
}

/// Canonicalize a team name that may be a known variant.
pub fn canonical_team_name(name: &str) -> String {
    TEAM_NAME_VARIANTS
        .iter()
        .find(|(variant, _)| *variant == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Load roster expectations from a CSV file.
///
/// Expected columns (header-driven, extra columns ignored):
/// `ID,Player,Team,Pos,Status[,AvgPts][,GP][,Opponent][,Draft%]`.
/// Status "Act" marks an expected starter, "Res" a reserve.
pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster {}", path.display()))?;
    let roster = parse_roster(&contents)
        .with_context(|| format!("failed to parse roster {}", path.display()))?;
    info!(
        "loaded roster with {} players ({} expected starters)",
        roster.len(),
        roster.iter().filter(|p| p.expected_starting).count()
    );
    Ok(roster)
}

fn parse_roster(contents: &str) -> Result<Vec<RosterEntry>> {
    let mut lines = contents.lines().enumerate();
    let header = loop {
        match lines.next() {
            Some((_, line)) if line.trim().is_empty() => continue,
            Some((_, line)) => break line,
            None => bail!("roster file is empty"),
        }
    };

    let columns: Vec<String> = split_csv_line(header)
        .into_iter()
        .map(|c| c.trim().to_string())
        .collect();
    let find = |name: &str| columns.iter().position(|c| c == name);

    let id_col = find("ID").context("roster header missing ID column")?;
    let player_col = find("Player").context("roster header missing Player column")?;
    let team_col = find("Team").context("roster header missing Team column")?;
    let pos_col = find("Pos").context("roster header missing Pos column")?;
    let status_col = find("Status").context("roster header missing Status column")?;
    let avg_col = find("AvgPts");
    let gp_col = find("GP");
    let opp_col = find("Opponent");
    let draft_col = find("Draft%");

    let mut roster = Vec::new();
    let mut seen_ids = HashSet::new();

    for (line_num, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let field = |idx: usize| fields.get(idx).map(|f| f.trim()).unwrap_or("");

        let id = field(id_col);
        let name = field(player_col);
        let team_abbrev = field(team_col);
        if id.is_empty() || name.is_empty() || team_abbrev.is_empty() {
            debug!("skipping incomplete roster row at line {}", line_num + 1);
            continue;
        }
        if !seen_ids.insert(id.to_string()) {
            bail!("duplicate roster id {id:?} at line {}", line_num + 1);
        }

        let expected_starting = match field(status_col) {
            "Act" => true,
            "Res" => false,
            other => bail!("unknown status {other:?} at line {}", line_num + 1),
        };

        roster.push(RosterEntry {
            id: id.to_string(),
            name: name.to_string(),
            team: Team::new(full_team_name(team_abbrev), team_abbrev.to_uppercase()),
            position: parse_position(field(pos_col)),
            expected_starting,
            average_points: avg_col
                .map(|c| field(c).parse().unwrap_or(0.0))
                .unwrap_or(0.0),
            games_played: gp_col.and_then(|c| field(c).parse().ok()),
            draft_percentage: draft_col
                .map(|c| field(c))
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            opponent: opp_col
                .map(|c| field(c))
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        });
    }

    if roster.is_empty() {
        bail!("roster contains no players");
    }
    Ok(roster)
}

fn parse_position(code: &str) -> PlayerPosition {
    match code {
        "G" | "GK" => PlayerPosition::Goalkeeper,
        "D" => PlayerPosition::Defender,
        "F" => PlayerPosition::Forward,
        _ => PlayerPosition::Midfielder,
    }
}

/// Split one CSV line, honoring double-quoted fields.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
