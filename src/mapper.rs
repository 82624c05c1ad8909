use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::config::{KICKOFF_FORMAT, PROVIDER_UTC_OFFSET_SECS};
use crate::payload::{
    CorrectScoreMarket, HalfFullTimeMarket, MatchFragment, PoolResponse, TotalGoalsMarket,
    WinDrawLoseMarket,
};
use crate::types::{
    CorrectScoreOdds, HalfFullTimeOdds, Match, MatchRecords, MatchStatus, Odds, OddsType, Outcome,
    Pool, TotalGoalsOdds, WinDrawLoseOdds,
};

/// Labels for the catch-all correct-score buckets.
const OTHER_SCORE_LABELS: [(Outcome, &str); 3] = [
    (Outcome::Win, "胜其他"),
    (Outcome::Draw, "平其他"),
    (Outcome::Lose, "负其他"),
];

const TOTAL_GOALS_LABELS: [&str; 8] = ["0", "1", "2", "3", "4", "5", "6", "7+"];

/// Decode a raw pool document. Returns `None` when the provider flags the
/// pool as unsuccessful or empty, or the envelope is not an object at all.
pub fn decode_pool(raw: &Value) -> Option<Vec<MatchFragment>> {
    let resp = match PoolResponse::deserialize(raw) {
        Ok(r) => r,
        Err(e) => {
            warn!("[MAPPER] pool envelope not decodable, treating as empty: {e}");
            return None;
        }
    };
    if !resp.success || resp.empty_flag {
        return None;
    }
    let fragments = resp
        .value
        .map(|v| v.match_info_list)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|group| group.sub_match_list)
        .collect();
    Some(fragments)
}

/// Map one fragment into the records its pool is responsible for.
/// `None` when the fragment carries no usable match id.
pub fn map_fragment(pool: Pool, fragment: &MatchFragment) -> Option<MatchRecords> {
    let match_id = fragment
        .match_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();

    let mut records = MatchRecords::new(match_id);
    match pool {
        Pool::HadHhad => {
            records.info = Some(map_match(&records.match_id, fragment));
            records.win_draw_lose = map_win_draw_lose(fragment);
        }
        Pool::Crs => {
            if let Some(crs) = &fragment.crs {
                records.correct_scores = map_correct_scores(crs);
            }
        }
        Pool::Ttg => {
            if let Some(ttg) = &fragment.ttg {
                records.total_goals = map_total_goals(ttg);
            }
        }
        Pool::Hafu => {
            if let Some(hafu) = &fragment.hafu {
                records.half_full_time = map_half_full_time(hafu);
            }
        }
    }
    Some(records)
}

pub fn map_match(match_id: &str, f: &MatchFragment) -> Match {
    Match {
        match_id: match_id.to_string(),
        match_number: f.match_num_date.clone(),
        match_code: f.match_num_str.clone(),
        league_id: f.league_id.clone(),
        league_name: f.league_abb_name.clone(),
        league_full_name: f.league_all_name.clone(),
        match_date: f.match_date.clone(),
        match_time: f.match_time.clone(),
        match_timestamp: kickoff_timestamp(f.match_date.as_deref(), f.match_time.as_deref()),
        home_team_id: f.home_team_id.clone(),
        home_team_name: f.home_team_abb_name.clone(),
        home_team_rank: f.home_rank.clone(),
        away_team_id: f.away_team_id.clone(),
        away_team_name: f.away_team_abb_name.clone(),
        away_team_rank: f.away_rank.clone(),
        is_single: f.betting_single.as_deref().map(str::trim) == Some("1"),
        match_status: MatchStatus::from_provider(f.match_status.as_deref()),
        notice: f.match_tips.clone(),
        odds_update_time: f.odds_update_time.clone(),
    }
}

/// Unix seconds for a provider-local kickoff. `None` if either half is
/// missing or the pair does not parse.
pub fn kickoff_timestamp(date: Option<&str>, time: Option<&str>) -> Option<i64> {
    let (date, time) = (date?.trim(), time?.trim());
    if date.is_empty() || time.is_empty() {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(&format!("{date} {time}"), KICKOFF_FORMAT).ok()?;
    let offset = FixedOffset::east_opt(PROVIDER_UTC_OFFSET_SECS)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp())
}

/// 0, 1 or 2 rows: one per `had`/`hhad` sub-object that has a win price.
pub fn map_win_draw_lose(f: &MatchFragment) -> Vec<WinDrawLoseOdds> {
    let mut rows = Vec::with_capacity(2);
    if let Some(had) = &f.had {
        if let Some(row) = win_draw_lose_row(OddsType::Had, had, 0.0) {
            rows.push(row);
        }
    }
    if let Some(hhad) = &f.hhad {
        let handicap = hhad
            .goal_line_value
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);
        if let Some(row) = win_draw_lose_row(OddsType::Hhad, hhad, handicap) {
            rows.push(row);
        }
    }
    rows
}

fn win_draw_lose_row(
    odds_type: OddsType,
    market: &WinDrawLoseMarket,
    handicap: f64,
) -> Option<WinDrawLoseOdds> {
    let Odds::Present(win_odds) = Odds::parse(market.h.as_deref()) else {
        return None;
    };
    Some(WinDrawLoseOdds {
        odds_type,
        handicap,
        win_odds,
        draw_odds: Odds::parse(market.d.as_deref()).value(),
        lose_odds: Odds::parse(market.a.as_deref()).value(),
        win_support: Odds::parse(market.h_trend.as_deref()).value(),
        draw_support: Odds::parse(market.d_trend.as_deref()).value(),
        lose_support: Odds::parse(market.a_trend.as_deref()).value(),
    })
}

/// Concrete scorelines first (win, draw, lose), then the "other" buckets.
pub fn map_correct_scores(crs: &CorrectScoreMarket) -> Vec<CorrectScoreOdds> {
    let lines = crs.scorelines();
    let mut rows = Vec::new();

    for bucket in [Outcome::Win, Outcome::Draw, Outcome::Lose] {
        let in_bucket = lines
            .iter()
            .filter(|(h, a, _)| Outcome::from_score(*h, *a) == bucket);
        for &(home, away, raw) in in_bucket {
            if let Odds::Present(odds) = Odds::parse(raw) {
                rows.push(CorrectScoreOdds {
                    result_type: bucket,
                    home_score: Some(home),
                    away_score: Some(away),
                    is_other: false,
                    score_label: format!("{home}:{away}"),
                    odds,
                });
            }
        }
    }

    let others = [crs.s1sh.as_deref(), crs.spsh.as_deref(), crs.sash.as_deref()];
    for ((result_type, label), raw) in OTHER_SCORE_LABELS.into_iter().zip(others) {
        if let Odds::Present(odds) = Odds::parse(raw) {
            rows.push(CorrectScoreOdds {
                result_type,
                home_score: None,
                away_score: None,
                is_other: true,
                score_label: label.to_string(),
                odds,
            });
        }
    }
    rows
}

pub fn map_total_goals(ttg: &TotalGoalsMarket) -> Vec<TotalGoalsOdds> {
    ttg.buckets()
        .into_iter()
        .zip(TOTAL_GOALS_LABELS)
        .enumerate()
        .filter_map(|(goals, (raw, label))| {
            let odds = Odds::parse(raw).value()?;
            let goals = goals as u8;
            Some(TotalGoalsOdds {
                goal_range: label.to_string(),
                min_goals: goals,
                max_goals: (goals < 7).then_some(goals),
                odds,
            })
        })
        .collect()
}

pub fn map_half_full_time(hafu: &HalfFullTimeMarket) -> Vec<HalfFullTimeOdds> {
    use Outcome::{Draw, Lose, Win};

    let combinations = [
        (Win, Win, "胜胜", hafu.hh.as_deref()),
        (Win, Draw, "胜平", hafu.hd.as_deref()),
        (Win, Lose, "胜负", hafu.ha.as_deref()),
        (Draw, Win, "平胜", hafu.dh.as_deref()),
        (Draw, Draw, "平平", hafu.dd.as_deref()),
        (Draw, Lose, "平负", hafu.da.as_deref()),
        (Lose, Win, "负胜", hafu.ah.as_deref()),
        (Lose, Draw, "负平", hafu.ad.as_deref()),
        (Lose, Lose, "负负", hafu.aa.as_deref()),
    ];

    combinations
        .into_iter()
        .filter_map(|(half_result, full_result, label, raw)| {
            let odds = Odds::parse(raw).value()?;
            Some(HalfFullTimeOdds {
                half_result,
                full_result,
                result_label: label.to_string(),
                odds,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(v: Value) -> MatchFragment {
        serde_json::from_value(v).unwrap()
    }

    fn had_hhad_fixture() -> Value {
        json!({
            "success": true,
            "emptyFlag": false,
            "value": {
                "matchInfoList": [{
                    "businessDate": "2024-06-01",
                    "subMatchList": [{
                        "matchId": 1024315,
                        "matchNumDate": "20240601",
                        "matchNumStr": "周六001",
                        "leagueId": "72",
                        "leagueAbbName": "英超",
                        "leagueAllName": "英格兰超级联赛",
                        "matchDate": "2024-06-01",
                        "matchTime": "20:00:00",
                        "homeTeamId": 611,
                        "homeTeamAbbName": "阿森纳",
                        "homeRank": "[英超2]",
                        "awayTeamId": "622",
                        "awayTeamAbbName": "切尔西",
                        "awayRank": "[英超6]",
                        "bettingSingle": 1,
                        "matchStatus": "Selling",
                        "matchTips": "",
                        "oddsUpdateTime": "2024-06-01 10:11:12",
                        "had": {"h": "1.85", "d": "3.40", "a": "3.90",
                                "h_trend": "0", "d_trend": "1", "a_trend": "-1"},
                        "hhad": {"h": "3.60", "d": "3.55", "a": "1.80", "goalLineValue": "-1"}
                    }]
                }]
            }
        })
    }

    #[test]
    fn decode_skips_unsuccessful_and_empty() {
        assert!(decode_pool(&json!({"success": false, "value": {"matchInfoList": []}})).is_none());
        assert!(decode_pool(&json!({"success": true, "emptyFlag": true})).is_none());
        assert!(decode_pool(&json!("not an object")).is_none());
    }

    #[test]
    fn decode_flattens_date_groups() {
        let raw = json!({
            "success": true,
            "value": {"matchInfoList": [
                {"subMatchList": [{"matchId": "1"}, {"matchId": "2"}]},
                {"subMatchList": [{"matchId": "3"}]},
                {}
            ]}
        });
        let ids: Vec<_> = decode_pool(&raw)
            .unwrap()
            .into_iter()
            .map(|f| f.match_id.unwrap())
            .collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[test]
    fn had_hhad_pool_maps_match_and_both_markets() {
        let fragments = decode_pool(&had_hhad_fixture()).unwrap();
        let records = map_fragment(Pool::HadHhad, &fragments[0]).unwrap();

        let m = records.info.as_ref().expect("match info");
        assert_eq!(m.match_id, "1024315");
        assert_eq!(m.match_number.as_deref(), Some("20240601"));
        assert_eq!(m.match_code.as_deref(), Some("周六001"));
        assert_eq!(m.home_team_id.as_deref(), Some("611"));
        assert!(m.is_single);
        assert_eq!(m.match_status, MatchStatus::NotStarted);
        // 2024-06-01 20:00:00 +08:00
        assert_eq!(m.match_timestamp, Some(1_717_243_200));

        assert_eq!(records.win_draw_lose.len(), 2);
        let had = &records.win_draw_lose[0];
        assert_eq!(had.odds_type, OddsType::Had);
        assert_eq!(had.handicap, 0.0);
        assert_eq!(had.win_odds, 1.85);
        assert_eq!(had.lose_support, Some(-1.0));
        let hhad = &records.win_draw_lose[1];
        assert_eq!(hhad.odds_type, OddsType::Hhad);
        assert_eq!(hhad.handicap, -1.0);
        assert_eq!(hhad.win_support, None);
        assert_eq!(records.odds_count(), 2);
    }

    #[test]
    fn finished_and_unknown_status() {
        let finished = map_match("1", &fragment(json!({"matchStatus": "Finished"})));
        assert_eq!(finished.match_status, MatchStatus::Finished);
        let odd = map_match("1", &fragment(json!({"matchStatus": "Postponed"})));
        assert_eq!(odd.match_status, MatchStatus::NotStarted);
    }

    #[test]
    fn kickoff_requires_both_parts() {
        assert_eq!(kickoff_timestamp(Some("2024-06-01"), None), None);
        assert_eq!(kickoff_timestamp(None, Some("20:00:00")), None);
        assert_eq!(kickoff_timestamp(Some("2024-06-01"), Some("20:00")), None);
        assert_eq!(kickoff_timestamp(Some("06/01/2024"), Some("20:00:00")), None);
        assert_eq!(kickoff_timestamp(Some("2024-06-01"), Some("")), None);
    }

    #[test]
    fn match_without_kickoff_still_maps() {
        let records = map_fragment(
            Pool::HadHhad,
            &fragment(json!({"matchId": "9", "matchDate": "2024-06-01", "matchTime": "TBD"})),
        )
        .unwrap();
        let m = records.info.unwrap();
        assert_eq!(m.match_timestamp, None);
        assert!(!m.is_single);
        assert!(records.win_draw_lose.is_empty());
    }

    #[test]
    fn wdl_requires_win_price() {
        let f = fragment(json!({
            "matchId": "1",
            "had": {"h": "-", "d": "3.10", "a": "2.50"},
            "hhad": {"h": "2.05", "d": "null", "a": "", "goalLineValue": "abc"}
        }));
        let rows = map_win_draw_lose(&f);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].odds_type, OddsType::Hhad);
        assert_eq!(rows[0].handicap, 0.0);
        assert_eq!(rows[0].draw_odds, None);
        assert_eq!(rows[0].lose_odds, None);
    }

    #[test]
    fn hhad_positive_handicap() {
        let f = fragment(json!({"hhad": {"h": "1.50", "goalLineValue": "+2"}}));
        assert_eq!(map_win_draw_lose(&f)[0].handicap, 2.0);
    }

    #[test]
    fn correct_score_single_line() {
        let f = fragment(json!({"matchId": "1", "crs": {"s02s01": "3.50"}}));
        let records = map_fragment(Pool::Crs, &f).unwrap();
        assert!(records.info.is_none());
        assert_eq!(
            records.correct_scores,
            vec![CorrectScoreOdds {
                result_type: Outcome::Win,
                home_score: Some(2),
                away_score: Some(1),
                is_other: false,
                score_label: "2:1".to_string(),
                odds: 3.50,
            }]
        );
    }

    #[test]
    fn correct_score_partitions_and_other_buckets() {
        let mut crs = serde_json::Map::new();
        // Wins up to 5:2, draws up to 3:3, losses up to 2:5.
        for h in 0..=5u8 {
            for a in 0..=5u8 {
                let priced = match h.cmp(&a) {
                    std::cmp::Ordering::Greater => a <= 2,
                    std::cmp::Ordering::Equal => h <= 3,
                    std::cmp::Ordering::Less => h <= 2,
                };
                if priced {
                    crs.insert(format!("s{h:02}s{a:02}"), json!("10.00"));
                }
            }
        }
        crs.insert("s1sh".into(), json!("40.00"));
        crs.insert("spsh".into(), json!("-"));
        crs.insert("sash".into(), json!(80));
        let f = fragment(json!({"crs": crs}));
        let rows = map_correct_scores(f.crs.as_ref().unwrap());

        let count = |o: Outcome, other: bool| {
            rows.iter().filter(|r| r.result_type == o && r.is_other == other).count()
        };
        assert_eq!(count(Outcome::Win, false), 12);
        assert_eq!(count(Outcome::Draw, false), 4);
        assert_eq!(count(Outcome::Lose, false), 12);
        assert_eq!(count(Outcome::Win, true), 1);
        assert_eq!(count(Outcome::Draw, true), 0);
        assert_eq!(count(Outcome::Lose, true), 1);

        let lose_other = rows
            .iter()
            .find(|r| r.is_other && r.result_type == Outcome::Lose)
            .unwrap();
        assert_eq!(lose_other.home_score, None);
        assert_eq!(lose_other.away_score, None);
        assert_eq!(lose_other.score_label, "负其他");
        assert_eq!(lose_other.odds, 80.0);
    }

    #[test]
    fn total_goals_open_bucket() {
        let f = fragment(json!({"ttg": {"s0": "9.00", "s3": "", "s7": "21.00"}}));
        let rows = map_total_goals(f.ttg.as_ref().unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].goal_range, "0");
        assert_eq!((rows[0].min_goals, rows[0].max_goals), (0, Some(0)));
        assert_eq!(rows[1].goal_range, "7+");
        assert_eq!((rows[1].min_goals, rows[1].max_goals), (7, None));
        assert_eq!(rows[1].odds, 21.0);
    }

    #[test]
    fn total_goals_sentinel_yields_nothing() {
        let f = fragment(json!({"ttg": {"s7": "null"}}));
        assert!(map_total_goals(f.ttg.as_ref().unwrap()).is_empty());
    }

    #[test]
    fn half_full_time_combinations() {
        let f = fragment(json!({"matchId": "5", "hafu": {
            "hh": "2.10", "hd": "15.0", "ha": "30.0",
            "dh": "4.50", "dd": "5.00", "da": "9.00",
            "ah": "28.0", "ad": "abc", "aa": "6.50"
        }}));
        let records = map_fragment(Pool::Hafu, &f).unwrap();
        assert_eq!(records.half_full_time.len(), 8);
        let first = &records.half_full_time[0];
        assert_eq!((first.half_result, first.full_result), (Outcome::Win, Outcome::Win));
        assert_eq!(first.result_label, "胜胜");
        assert!(!records
            .half_full_time
            .iter()
            .any(|r| r.half_result == Outcome::Lose && r.full_result == Outcome::Draw));
    }

    #[test]
    fn pool_only_maps_its_own_market() {
        let f = fragment(json!({
            "matchId": "1",
            "had": {"h": "1.50"},
            "ttg": {"s1": "4.00"},
        }));
        let ttg = map_fragment(Pool::Ttg, &f).unwrap();
        assert!(ttg.info.is_none());
        assert!(ttg.win_draw_lose.is_empty());
        assert_eq!(ttg.total_goals.len(), 1);

        let crs = map_fragment(Pool::Crs, &f).unwrap();
        assert_eq!(crs.odds_count(), 0);
    }

    #[test]
    fn fragment_without_id_is_skipped() {
        assert!(map_fragment(Pool::HadHhad, &fragment(json!({"had": {"h": "1.5"}}))).is_none());
        assert!(map_fragment(Pool::Crs, &fragment(json!({"matchId": "  "}))).is_none());
    }
}
