//! Row types for reads. Written with `sqlx::FromRow`, serialized as-is by the API.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MatchRow {
    pub match_id: String,
    pub match_number: Option<String>,
    pub match_code: Option<String>,
    pub league_id: Option<String>,
    pub league_name: Option<String>,
    pub league_full_name: Option<String>,
    pub match_date: Option<String>,
    pub match_time: Option<String>,
    pub match_timestamp: Option<i64>,
    pub home_team_id: Option<String>,
    pub home_team_name: Option<String>,
    pub home_team_rank: Option<String>,
    pub away_team_id: Option<String>,
    pub away_team_name: Option<String>,
    pub away_team_rank: Option<String>,
    pub is_single: bool,
    pub match_status: String,
    pub notice: Option<String>,
    pub odds_update_time: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WinDrawLoseRow {
    pub match_id: String,
    pub odds_type: String,
    pub handicap: f64,
    pub win_odds: Option<f64>,
    pub draw_odds: Option<f64>,
    pub lose_odds: Option<f64>,
    pub win_support: Option<f64>,
    pub draw_support: Option<f64>,
    pub lose_support: Option<f64>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CorrectScoreRow {
    pub result_type: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub score_label: String,
    pub odds: f64,
    pub is_other: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TotalGoalsRow {
    pub goal_range: String,
    pub min_goals: i64,
    pub max_goals: Option<i64>,
    pub odds: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HalfFullTimeRow {
    pub half_result: String,
    pub full_result: String,
    pub result_label: String,
    pub odds: f64,
}

/// The sync ledger singleton. Reflects the last successful cycle only.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SyncStatusRow {
    pub last_synced_at: Option<String>,
    pub total_matches: i64,
    pub total_odds: i64,
}
