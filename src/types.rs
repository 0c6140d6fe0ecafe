use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, FailureKind};

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// Number of comma-separated fields in one parser data row.
pub const RECORD_FIELD_COUNT: usize = 16;

/// Column names of the output surface, in wire order.
pub const COLUMNS: [&str; RECORD_FIELD_COUNT] = [
    "player", "x", "y", "z", "time", "mana", "mana_regen", "max_mana", "hp", "hp_regen",
    "max_hp", "xp", "level", "str", "int", "agi",
];

/// One position/state sample for one entity.
///
/// `time` is seconds as emitted by the parser until the row is resampled,
/// after which it holds the grid point in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub player: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub time: f64,
    pub mana: f64,
    pub mana_regen: f64,
    pub max_mana: f64,
    pub hp: f64,
    pub hp_regen: f64,
    pub max_hp: f64,
    pub xp: f64,
    pub level: f64,
    #[serde(rename = "str")]
    pub strength: f64,
    #[serde(rename = "int")]
    pub intelligence: f64,
    #[serde(rename = "agi")]
    pub agility: f64,
}

/// All records of one match in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityTable {
    pub records: Vec<RawRecord>,
}

impl EntityTable {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows belonging to `entity_id`, original order preserved.
    pub fn rows_for<'a>(&'a self, entity_id: &'a str) -> impl Iterator<Item = &'a RawRecord> + 'a {
        self.records.iter().filter(move |r| r.player == entity_id)
    }

    /// Distinct entity ids in order of first appearance.
    pub fn entity_ids(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for r in &self.records {
            if !seen.contains(&r.player.as_str()) {
                seen.push(&r.player);
            }
        }
        seen
    }
}

// ---------------------------------------------------------------------------
// Resampled output
// ---------------------------------------------------------------------------

/// One row per grid point; `time` is the grid point in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResampledSeries {
    pub rows: Vec<RawRecord>,
}

impl ResampledSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.time)
    }
}

/// entity_id → series for one match.
pub type MatchSeries = BTreeMap<String, ResampledSeries>;

/// match_id → entity_id → series. Built once by the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MatchResultSet {
    matches: BTreeMap<String, MatchSeries>,
}

impl MatchResultSet {
    pub(crate) fn insert(&mut self, match_id: String, series: MatchSeries) {
        self.matches.insert(match_id, series);
    }

    pub fn get(&self, match_id: &str) -> Option<&MatchSeries> {
        self.matches.get(match_id)
    }

    pub fn series(&self, match_id: &str, entity_id: &str) -> Option<&ResampledSeries> {
        self.matches.get(match_id)?.get(entity_id)
    }

    pub fn match_ids(&self) -> impl Iterator<Item = &str> {
        self.matches.keys().map(String::as_str)
    }

    pub fn contains(&self, match_id: &str) -> bool {
        self.matches.contains_key(match_id)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MatchSeries)> {
        self.matches.iter()
    }
}

// ---------------------------------------------------------------------------
// Batch outcome
// ---------------------------------------------------------------------------

/// A match omitted from the result set, with the reason it was dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchFailure {
    pub match_id: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl MatchFailure {
    pub fn from_error(match_id: &str, err: &AppError) -> Self {
        Self {
            match_id: match_id.to_string(),
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub results: MatchResultSet,
    pub failures: Vec<MatchFailure>,
}

impl BatchReport {
    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.match_id.as_str())
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Handling of a tracked entity with no rows in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEntityPolicy {
    /// Emit an empty series for the entity.
    #[default]
    Empty,
    /// Fail the whole match with a sampling failure.
    Fail,
}

impl std::fmt::Display for MissingEntityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingEntityPolicy::Empty => write!(f, "empty"),
            MissingEntityPolicy::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for MissingEntityPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => Ok(MissingEntityPolicy::Empty),
            "fail" => Ok(MissingEntityPolicy::Fail),
            other => Err(AppError::Config(format!(
                "MISSING_ENTITY_POLICY must be `empty` or `fail`, got `{other}`"
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_record(player: &str, time: f64) -> RawRecord {
    RawRecord {
        player: player.to_string(),
        x: 0.0,
        y: 0.0,
        z: 0.0,
        time,
        mana: 0.0,
        mana_regen: 0.0,
        max_mana: 0.0,
        hp: 0.0,
        hp_regen: 0.0,
        max_hp: 0.0,
        xp: 0.0,
        level: 1.0,
        strength: 0.0,
        intelligence: 0.0,
        agility: 0.0,
    }
}
