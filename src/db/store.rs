use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::config::PROVIDER_UTC_OFFSET_SECS;
use crate::db::models::{
    CorrectScoreRow, HalfFullTimeRow, MatchRow, SyncStatusRow, TotalGoalsRow, WinDrawLoseRow,
};
use crate::error::Result;
use crate::types::{
    CorrectScoreOdds, HalfFullTimeOdds, Match, MatchRecords, SyncCounts, TotalGoalsOdds,
    WinDrawLoseOdds,
};

/// Idempotent persistence for normalized records plus the read helpers the
/// API needs. Writes insert-or-update on each entity's natural key and never
/// delete: odds the provider stops quoting stay at their last value.
#[derive(Clone)]
pub struct OddsStore {
    pool: SqlitePool,
}

/// Filters for the match listing.
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    pub date: Option<String>,
    pub league: Option<String>,
    /// 1-based.
    pub page: i64,
    pub page_size: i64,
}

impl OddsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write everything one fragment produced in a single transaction, so a
    /// failure never leaves the match with only some of its rows updated.
    /// Returns the number of odds rows written.
    pub async fn persist(&self, records: &MatchRecords) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        if let Some(info) = &records.info {
            upsert_match(&mut tx, info).await?;
        }
        for row in &records.win_draw_lose {
            upsert_win_draw_lose(&mut tx, &records.match_id, row).await?;
        }
        upsert_correct_scores(&mut tx, &records.match_id, &records.correct_scores).await?;
        upsert_total_goals(&mut tx, &records.match_id, &records.total_goals).await?;
        upsert_half_full_time(&mut tx, &records.match_id, &records.half_full_time).await?;

        tx.commit().await?;
        Ok(records.odds_count())
    }

    /// Overwrite the ledger after a successful cycle.
    pub async fn record_sync(&self, counts: SyncCounts) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        ensure_sync_status(&mut tx).await?;
        sqlx::query(
            "UPDATE sync_status SET last_synced_at = ?, total_matches = ?, total_odds = ? \
             WHERE id = 1",
        )
        .bind(now)
        .bind(counts.matches as i64)
        .bind(counts.odds as i64)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn sync_status(&self) -> Result<SyncStatusRow> {
        let mut conn = self.pool.acquire().await?;
        ensure_sync_status(&mut conn).await?;
        let row = sqlx::query_as::<_, SyncStatusRow>(
            "SELECT last_synced_at, total_matches, total_odds FROM sync_status WHERE id = 1",
        )
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Paged listing. Finished and cancelled matches are always hidden; without
    /// a date filter, matches already kicked off are hidden too. A missing
    /// date or timestamp counts as "unknown" and stays listed.
    pub async fn list_matches(
        &self,
        query: &MatchQuery,
        now: DateTime<Utc>,
    ) -> Result<(Vec<MatchRow>, i64)> {
        let page = query.page.max(1);
        let page_size = query.page_size.max(1);

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM matches");
        push_match_filters(&mut select, query, now);
        select.push(" ORDER BY match_date ASC, COALESCE(match_time, ''), match_code ASC LIMIT ");
        select.push_bind(page_size);
        select.push(" OFFSET ");
        select.push_bind((page - 1) * page_size);
        let rows = select
            .build_query_as::<MatchRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM matches");
        push_match_filters(&mut count, query, now);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((rows, total))
    }

    pub async fn get_match(&self, match_id: &str) -> Result<Option<MatchRow>> {
        let row = sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE match_id = ?")
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Highest issue number on record; the API flags matches from that issue.
    pub async fn latest_issue(&self) -> Result<Option<String>> {
        let issue = sqlx::query_scalar::<_, Option<String>>("SELECT MAX(match_number) FROM matches")
            .fetch_one(&self.pool)
            .await?;
        Ok(issue)
    }

    pub async fn win_draw_lose_for(&self, match_ids: &[String]) -> Result<Vec<WinDrawLoseRow>> {
        if match_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT match_id, odds_type, handicap, win_odds, draw_odds, lose_odds, \
             win_support, draw_support, lose_support, updated_at \
             FROM odds_win_draw_lose WHERE match_id IN (",
        );
        let mut ids = qb.separated(", ");
        for id in match_ids {
            ids.push_bind(id);
        }
        ids.push_unseparated(")");
        let rows = qb.build_query_as::<WinDrawLoseRow>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn correct_scores(&self, match_id: &str) -> Result<Vec<CorrectScoreRow>> {
        let rows = sqlx::query_as::<_, CorrectScoreRow>(
            "SELECT result_type, home_score, away_score, score_label, odds, is_other \
             FROM odds_correct_score WHERE match_id = ? ORDER BY id",
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn total_goals(&self, match_id: &str) -> Result<Vec<TotalGoalsRow>> {
        let rows = sqlx::query_as::<_, TotalGoalsRow>(
            "SELECT goal_range, min_goals, max_goals, odds \
             FROM odds_total_goals WHERE match_id = ? ORDER BY min_goals",
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn half_full_time(&self, match_id: &str) -> Result<Vec<HalfFullTimeRow>> {
        let rows = sqlx::query_as::<_, HalfFullTimeRow>(
            "SELECT half_result, full_result, result_label, odds \
             FROM odds_half_full_time WHERE match_id = ? ORDER BY id",
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn push_match_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &MatchQuery, now: DateTime<Utc>) {
    qb.push(" WHERE (match_status NOT IN ('finished', 'cancelled'))");
    if let Some(date) = &query.date {
        qb.push(" AND match_date = ").push_bind(date.clone());
    } else {
        let today = FixedOffset::east_opt(PROVIDER_UTC_OFFSET_SECS)
            .map(|tz| now.with_timezone(&tz).format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| now.format("%Y-%m-%d").to_string());
        qb.push(" AND (match_date IS NULL OR match_date >= ")
            .push_bind(today)
            .push(")");
        qb.push(" AND (match_timestamp IS NULL OR match_timestamp >= ")
            .push_bind(now.timestamp())
            .push(")");
    }
    if let Some(league) = &query.league {
        qb.push(" AND league_name = ").push_bind(league.clone());
    }
}

// ---------------------------------------------------------------------------
// Upserts
// ---------------------------------------------------------------------------

async fn upsert_match(conn: &mut SqliteConnection, m: &Match) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO matches (
            match_id, match_number, match_code, league_id, league_name, league_full_name,
            match_date, match_time, match_timestamp,
            home_team_id, home_team_name, home_team_rank,
            away_team_id, away_team_name, away_team_rank,
            is_single, match_status, notice, odds_update_time
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(match_id) DO UPDATE SET
            match_number = excluded.match_number,
            match_code = excluded.match_code,
            league_id = excluded.league_id,
            league_name = excluded.league_name,
            league_full_name = excluded.league_full_name,
            match_date = excluded.match_date,
            match_time = excluded.match_time,
            match_timestamp = excluded.match_timestamp,
            home_team_id = excluded.home_team_id,
            home_team_name = excluded.home_team_name,
            home_team_rank = excluded.home_team_rank,
            away_team_id = excluded.away_team_id,
            away_team_name = excluded.away_team_name,
            away_team_rank = excluded.away_team_rank,
            is_single = excluded.is_single,
            match_status = excluded.match_status,
            notice = excluded.notice,
            odds_update_time = excluded.odds_update_time,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&m.match_id)
    .bind(&m.match_number)
    .bind(&m.match_code)
    .bind(&m.league_id)
    .bind(&m.league_name)
    .bind(&m.league_full_name)
    .bind(&m.match_date)
    .bind(&m.match_time)
    .bind(m.match_timestamp)
    .bind(&m.home_team_id)
    .bind(&m.home_team_name)
    .bind(&m.home_team_rank)
    .bind(&m.away_team_id)
    .bind(&m.away_team_name)
    .bind(&m.away_team_rank)
    .bind(m.is_single)
    .bind(m.match_status.to_string())
    .bind(&m.notice)
    .bind(&m.odds_update_time)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_win_draw_lose(
    conn: &mut SqliteConnection,
    match_id: &str,
    row: &WinDrawLoseOdds,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO odds_win_draw_lose (
            match_id, odds_type, handicap,
            win_odds, draw_odds, lose_odds,
            win_support, draw_support, lose_support
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(match_id, odds_type) DO UPDATE SET
            handicap = excluded.handicap,
            win_odds = excluded.win_odds,
            draw_odds = excluded.draw_odds,
            lose_odds = excluded.lose_odds,
            win_support = excluded.win_support,
            draw_support = excluded.draw_support,
            lose_support = excluded.lose_support,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(match_id)
    .bind(row.odds_type.to_string())
    .bind(row.handicap)
    .bind(row.win_odds)
    .bind(row.draw_odds)
    .bind(row.lose_odds)
    .bind(row.win_support)
    .bind(row.draw_support)
    .bind(row.lose_support)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_correct_scores(
    conn: &mut SqliteConnection,
    match_id: &str,
    rows: &[CorrectScoreOdds],
) -> Result<()> {
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO odds_correct_score (
                match_id, result_type, home_score, away_score, is_other,
                score_key, score_label, odds
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(match_id, result_type, score_key) DO UPDATE SET
                score_label = excluded.score_label,
                odds = excluded.odds,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(match_id)
        .bind(row.result_type.to_string())
        .bind(row.home_score)
        .bind(row.away_score)
        .bind(row.is_other)
        .bind(row.score_key())
        .bind(&row.score_label)
        .bind(row.odds)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn upsert_total_goals(
    conn: &mut SqliteConnection,
    match_id: &str,
    rows: &[TotalGoalsOdds],
) -> Result<()> {
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO odds_total_goals (match_id, goal_range, min_goals, max_goals, odds)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(match_id, goal_range) DO UPDATE SET
                min_goals = excluded.min_goals,
                max_goals = excluded.max_goals,
                odds = excluded.odds,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(match_id)
        .bind(&row.goal_range)
        .bind(row.min_goals)
        .bind(row.max_goals)
        .bind(row.odds)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn upsert_half_full_time(
    conn: &mut SqliteConnection,
    match_id: &str,
    rows: &[HalfFullTimeOdds],
) -> Result<()> {
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO odds_half_full_time (match_id, half_result, full_result, result_label, odds)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(match_id, half_result, full_result) DO UPDATE SET
                result_label = excluded.result_label,
                odds = excluded.odds,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(match_id)
        .bind(row.half_result.to_string())
        .bind(row.full_result.to_string())
        .bind(&row.result_label)
        .bind(row.odds)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// The ledger row is created lazily on first read or write.
async fn ensure_sync_status(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO sync_status (id, last_synced_at, total_matches, total_odds) \
         VALUES (1, NULL, 0, 0)",
    )
    .execute(conn)
    .await?;
    Ok(())
}
