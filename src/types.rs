use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Odds value
// ---------------------------------------------------------------------------

/// A provider odds/support value after coercion.
///
/// `Absent` covers a missing field, the sentinels `""`, `"-"` and `"null"`,
/// and anything that does not parse as a float. It never becomes a stored zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Odds {
    Present(f64),
    Absent,
}

impl Odds {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Odds::Absent;
        };
        if matches!(raw, "" | "-" | "null") {
            return Odds::Absent;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Odds::Present(v),
            _ => Odds::Absent,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Odds::Present(v) => Some(v),
            Odds::Absent => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// Provider market groups, each fetched with one HTTP call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    HadHhad,
    Crs,
    Ttg,
    Hafu,
}

impl Pool {
    /// Fetch order for one cycle. `HadHhad` first: it is the only pool that
    /// writes the match rows themselves.
    pub const ALL: [Pool; 4] = [Pool::HadHhad, Pool::Crs, Pool::Ttg, Pool::Hafu];

    /// Comma-joined market identifiers sent as `poolCode`.
    pub fn code(self) -> &'static str {
        match self {
            Pool::HadHhad => "hhad,had",
            Pool::Crs => "crs",
            Pool::Ttg => "ttg",
            Pool::Hafu => "hafu",
        }
    }
}

impl std::fmt::Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Pool::HadHhad => "had_hhad",
            Pool::Crs => "crs",
            Pool::Ttg => "ttg",
            Pool::Hafu => "hafu",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    NotStarted,
    Finished,
    Cancelled,
}

impl MatchStatus {
    /// Unknown or missing provider statuses fall back to `NotStarted`.
    pub fn from_provider(status: Option<&str>) -> Self {
        match status {
            Some("Selling") => MatchStatus::NotStarted,
            Some("Finished") => MatchStatus::Finished,
            Some("Cancelled") => MatchStatus::Cancelled,
            _ => MatchStatus::NotStarted,
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchStatus::NotStarted => "not_started",
            MatchStatus::Finished => "finished",
            MatchStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Full-match (`had`) vs. handicapped (`hhad`) win/draw/lose market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OddsType {
    Had,
    Hhad,
}

impl std::fmt::Display for OddsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OddsType::Had => write!(f, "had"),
            OddsType::Hhad => write!(f, "hhad"),
        }
    }
}

/// Result from the home side's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Draw,
    Lose,
}

impl Outcome {
    pub fn from_score(home: u8, away: u8) -> Self {
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Outcome::Win,
            std::cmp::Ordering::Equal => Outcome::Draw,
            std::cmp::Ordering::Less => Outcome::Lose,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Win => "win",
            Outcome::Draw => "draw",
            Outcome::Lose => "lose",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub match_id: String,
    pub match_number: Option<String>,
    pub match_code: Option<String>,
    pub league_id: Option<String>,
    pub league_name: Option<String>,
    pub league_full_name: Option<String>,
    pub match_date: Option<String>,
    pub match_time: Option<String>,
    /// Unix seconds; `None` when the kickoff could not be derived.
    pub match_timestamp: Option<i64>,
    pub home_team_id: Option<String>,
    pub home_team_name: Option<String>,
    pub home_team_rank: Option<String>,
    pub away_team_id: Option<String>,
    pub away_team_name: Option<String>,
    pub away_team_rank: Option<String>,
    pub is_single: bool,
    pub match_status: MatchStatus,
    pub notice: Option<String>,
    pub odds_update_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinDrawLoseOdds {
    pub odds_type: OddsType,
    /// Always 0 for `had`.
    pub handicap: f64,
    pub win_odds: f64,
    pub draw_odds: Option<f64>,
    pub lose_odds: Option<f64>,
    pub win_support: Option<f64>,
    pub draw_support: Option<f64>,
    pub lose_support: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectScoreOdds {
    pub result_type: Outcome,
    /// Both `None` exactly when `is_other` is set.
    pub home_score: Option<u8>,
    pub away_score: Option<u8>,
    pub is_other: bool,
    pub score_label: String,
    pub odds: f64,
}

impl CorrectScoreOdds {
    /// Non-null stand-in for `(home_score, away_score, is_other)` in the
    /// table's unique index; SQLite treats NULL scores as distinct.
    pub fn score_key(&self) -> String {
        match (self.is_other, self.home_score, self.away_score) {
            (false, Some(h), Some(a)) => format!("{h}:{a}"),
            _ => "other".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalGoalsOdds {
    pub goal_range: String,
    pub min_goals: u8,
    /// `None` for the open-ended "7+" bucket.
    pub max_goals: Option<u8>,
    pub odds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HalfFullTimeOdds {
    pub half_result: Outcome,
    pub full_result: Outcome,
    pub result_label: String,
    pub odds: f64,
}

/// Everything one provider fragment produced for one match in one pool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchRecords {
    pub match_id: String,
    /// Only set by the `had_hhad` pool.
    pub info: Option<Match>,
    pub win_draw_lose: Vec<WinDrawLoseOdds>,
    pub correct_scores: Vec<CorrectScoreOdds>,
    pub total_goals: Vec<TotalGoalsOdds>,
    pub half_full_time: Vec<HalfFullTimeOdds>,
}

impl MatchRecords {
    pub fn new(match_id: String) -> Self {
        Self {
            match_id,
            ..Self::default()
        }
    }

    pub fn odds_count(&self) -> usize {
        self.win_draw_lose.len()
            + self.correct_scores.len()
            + self.total_goals.len()
            + self.half_full_time.len()
    }
}

/// Per-cycle counters, also the manual trigger's response payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub matches: u64,
    pub odds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_absent() {
        for raw in [None, Some(""), Some("-"), Some("null"), Some("  ")] {
            assert_eq!(Odds::parse(raw), Odds::Absent, "raw={raw:?}");
        }
    }

    #[test]
    fn decimal_string_is_present() {
        assert_eq!(Odds::parse(Some("1.85")), Odds::Present(1.85));
        assert_eq!(Odds::parse(Some(" 3.50 ")).value(), Some(3.5));
    }

    #[test]
    fn garbage_is_absent_not_panic() {
        assert_eq!(Odds::parse(Some("abc")), Odds::Absent);
        assert_eq!(Odds::parse(Some("1.2.3")), Odds::Absent);
        assert_eq!(Odds::parse(Some("NaN")), Odds::Absent);
    }

    #[test]
    fn status_mapping_defaults_to_not_started() {
        assert_eq!(MatchStatus::from_provider(Some("Finished")), MatchStatus::Finished);
        assert_eq!(MatchStatus::from_provider(Some("Cancelled")), MatchStatus::Cancelled);
        assert_eq!(MatchStatus::from_provider(Some("Selling")), MatchStatus::NotStarted);
        assert_eq!(MatchStatus::from_provider(Some("Suspended")), MatchStatus::NotStarted);
        assert_eq!(MatchStatus::from_provider(None), MatchStatus::NotStarted);
        assert_eq!(MatchStatus::Finished.to_string(), "finished");
    }

    #[test]
    fn outcome_from_score() {
        assert_eq!(Outcome::from_score(2, 1), Outcome::Win);
        assert_eq!(Outcome::from_score(3, 3), Outcome::Draw);
        assert_eq!(Outcome::from_score(0, 4), Outcome::Lose);
    }

    #[test]
    fn score_key_separates_other_bucket() {
        let concrete = CorrectScoreOdds {
            result_type: Outcome::Win,
            home_score: Some(2),
            away_score: Some(1),
            is_other: false,
            score_label: "2:1".to_string(),
            odds: 3.5,
        };
        let other = CorrectScoreOdds {
            home_score: None,
            away_score: None,
            is_other: true,
            ..concrete.clone()
        };
        assert_eq!(concrete.score_key(), "2:1");
        assert_eq!(other.score_key(), "other");
    }
}
