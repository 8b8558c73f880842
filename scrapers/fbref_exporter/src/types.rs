use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Body of a successful upstream fetch.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub html: String,
    pub status: u16,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSource {
    Visible,
    Comment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub player: String,
    pub team: String,
    pub goals: Option<f64>,
    pub assists: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalkeeperRecord {
    pub player: String,
    pub team: String,
    pub clean_sheets: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamRecord {
    pub team: String,
    pub points: Option<f64>,
    pub goals_for: Option<f64>,
    pub goals_against: Option<f64>,
    pub wins: Option<f64>,
    pub draws: Option<f64>,
    pub losses: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatRecord {
    Player(PlayerRecord),
    Goalkeeper(GoalkeeperRecord),
    Team(TeamRecord),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub players: usize,
    pub teams: usize,
    pub goalkeepers: usize,
}

impl RecordCounts {
    pub fn from_records(records: &[StatRecord]) -> Self {
        records.iter().fold(Self::default(), |mut counts, record| {
            match record {
                StatRecord::Player(_) => counts.players += 1,
                StatRecord::Goalkeeper(_) => counts.goalkeepers += 1,
                StatRecord::Team(_) => counts.teams += 1,
            }
            counts
        })
    }
}

/// Outcome of one scrape cycle, as exposed on `/stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub success: bool,
    pub duration_secs: f64,
    pub counts: RecordCounts,
    pub finished_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl CycleReport {
    pub fn succeeded(duration: Duration, counts: RecordCounts) -> Self {
        Self {
            success: true,
            duration_secs: duration.as_secs_f64(),
            counts,
            finished_at: Utc::now(),
            error: None,
        }
    }

    pub fn failed(duration: Duration, error: String) -> Self {
        Self {
            success: false,
            duration_secs: duration.as_secs_f64(),
            counts: RecordCounts::default(),
            finished_at: Utc::now(),
            error: Some(error),
        }
    }
}
