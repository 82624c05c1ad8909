//! Typed shape of the provider's pool response.
//!
//! The provider is loose about scalar types: ids, ranks and odds arrive as
//! strings, numbers or `null` depending on the market and the day. Every
//! scalar is therefore decoded into `Option<String>` and interpreted later
//! by the mapper. Sub-objects that do not have the expected shape decode
//! as `None` instead of failing the whole fragment.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

static FRAGMENT_DECODE_FAILURES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolResponse {
    #[serde(default, deserialize_with = "flag")]
    pub success: bool,
    #[serde(default, deserialize_with = "flag")]
    pub empty_flag: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<PoolValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolValue {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub match_info_list: Vec<DateGroup>,
}

/// Matches grouped under one business date.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateGroup {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub sub_match_list: Vec<MatchFragment>,
}

/// One match as the provider describes it inside a pool response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFragment {
    #[serde(default, deserialize_with = "scalar")]
    pub match_id: Option<String>,
    /// Issue number, e.g. `"20240601"`.
    #[serde(default, deserialize_with = "scalar")]
    pub match_num_date: Option<String>,
    /// Display code, e.g. `"周六001"`.
    #[serde(default, deserialize_with = "scalar")]
    pub match_num_str: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub league_id: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub league_abb_name: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub league_all_name: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub match_date: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub match_time: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub home_team_id: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub home_team_abb_name: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub home_rank: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub away_team_id: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub away_team_abb_name: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub away_rank: Option<String>,
    /// `1` when single-match betting is allowed.
    #[serde(default, deserialize_with = "scalar")]
    pub betting_single: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub match_status: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub match_tips: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub odds_update_time: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub had: Option<WinDrawLoseMarket>,
    #[serde(default, deserialize_with = "lenient")]
    pub hhad: Option<WinDrawLoseMarket>,
    #[serde(default, deserialize_with = "lenient")]
    pub crs: Option<CorrectScoreMarket>,
    #[serde(default, deserialize_with = "lenient")]
    pub ttg: Option<TotalGoalsMarket>,
    #[serde(default, deserialize_with = "lenient")]
    pub hafu: Option<HalfFullTimeMarket>,
}

/// `had` / `hhad` sub-object. `*_trend` are the support indicators.
#[derive(Debug, Default, Deserialize)]
pub struct WinDrawLoseMarket {
    #[serde(default, deserialize_with = "scalar")]
    pub h: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub d: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub a: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub h_trend: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub d_trend: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub a_trend: Option<String>,
    /// Handicap line, `hhad` only (e.g. `"-1"`, `"+2"`).
    #[serde(default, rename = "goalLineValue", deserialize_with = "scalar")]
    pub goal_line_value: Option<String>,
}

/// `crs` sub-object. `sHHsAA` holds the odds for home `HH` : away `AA`;
/// `s1sh` / `spsh` / `sash` are the "any other win/draw/lose score" buckets.
#[derive(Debug, Default, Deserialize)]
pub struct CorrectScoreMarket {
    #[serde(default, deserialize_with = "scalar")]
    pub s01s00: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s02s00: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s02s01: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s03s00: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s03s01: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s03s02: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s04s00: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s04s01: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s04s02: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s05s00: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s05s01: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s05s02: Option<String>,

    #[serde(default, deserialize_with = "scalar")]
    pub s00s00: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s01s01: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s02s02: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s03s03: Option<String>,

    #[serde(default, deserialize_with = "scalar")]
    pub s00s01: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s00s02: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s01s02: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s00s03: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s01s03: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s02s03: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s00s04: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s01s04: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s02s04: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s00s05: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s01s05: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s02s05: Option<String>,

    #[serde(default, deserialize_with = "scalar")]
    pub s1sh: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub spsh: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub sash: Option<String>,
}

impl CorrectScoreMarket {
    /// Every concrete scoreline the provider prices, as `(home, away, raw odds)`.
    pub fn scorelines(&self) -> [(u8, u8, Option<&str>); 28] {
        [
            (1, 0, self.s01s00.as_deref()),
            (2, 0, self.s02s00.as_deref()),
            (2, 1, self.s02s01.as_deref()),
            (3, 0, self.s03s00.as_deref()),
            (3, 1, self.s03s01.as_deref()),
            (3, 2, self.s03s02.as_deref()),
            (4, 0, self.s04s00.as_deref()),
            (4, 1, self.s04s01.as_deref()),
            (4, 2, self.s04s02.as_deref()),
            (5, 0, self.s05s00.as_deref()),
            (5, 1, self.s05s01.as_deref()),
            (5, 2, self.s05s02.as_deref()),
            (0, 0, self.s00s00.as_deref()),
            (1, 1, self.s01s01.as_deref()),
            (2, 2, self.s02s02.as_deref()),
            (3, 3, self.s03s03.as_deref()),
            (0, 1, self.s00s01.as_deref()),
            (0, 2, self.s00s02.as_deref()),
            (1, 2, self.s01s02.as_deref()),
            (0, 3, self.s00s03.as_deref()),
            (1, 3, self.s01s03.as_deref()),
            (2, 3, self.s02s03.as_deref()),
            (0, 4, self.s00s04.as_deref()),
            (1, 4, self.s01s04.as_deref()),
            (2, 4, self.s02s04.as_deref()),
            (0, 5, self.s00s05.as_deref()),
            (1, 5, self.s01s05.as_deref()),
            (2, 5, self.s02s05.as_deref()),
        ]
    }
}

/// `ttg` sub-object. `s0`..`s6` are exact totals, `s7` is seven or more.
#[derive(Debug, Default, Deserialize)]
pub struct TotalGoalsMarket {
    #[serde(default, deserialize_with = "scalar")]
    pub s0: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s1: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s2: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s3: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s4: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s5: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s6: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub s7: Option<String>,
}

impl TotalGoalsMarket {
    /// Raw odds indexed by goal total; index 7 is the open-ended bucket.
    pub fn buckets(&self) -> [Option<&str>; 8] {
        [
            self.s0.as_deref(),
            self.s1.as_deref(),
            self.s2.as_deref(),
            self.s3.as_deref(),
            self.s4.as_deref(),
            self.s5.as_deref(),
            self.s6.as_deref(),
            self.s7.as_deref(),
        ]
    }
}

/// `hafu` sub-object. Keys are `<half><full>` with `h`=home win, `d`=draw, `a`=away win.
#[derive(Debug, Default, Deserialize)]
pub struct HalfFullTimeMarket {
    #[serde(default, deserialize_with = "scalar")]
    pub hh: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub hd: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub ha: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub dh: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub dd: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub da: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub ah: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub ad: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub aa: Option<String>,
}

// ---------------------------------------------------------------------------
// Lenient decoders
// ---------------------------------------------------------------------------

/// String or number → `Some(text)`; `null`, bools, arrays and objects → `None`.
fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts `true`/`false`, `1`/`0` and their string forms.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.trim(), "true" | "1"),
        _ => false,
    })
}

/// Decodes a nested object, mapping any shape mismatch to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(Value::is_object)
        .and_then(|v| serde_json::from_value(v).ok()))
}

/// Decodes an array element by element, dropping elements that fail.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value(item) {
            Ok(decoded) => out.push(decoded),
            Err(e) => {
                let count = FRAGMENT_DECODE_FAILURES.fetch_add(1, Ordering::Relaxed) + 1;
                if count <= 10 || count % 1000 == 0 {
                    warn!(count, "[PAYLOAD] dropped undecodable element: {e}");
                }
            }
        }
    }
    Ok(out)
}
