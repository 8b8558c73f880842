//! Column-signature classification of stat tables.
//!
//! Tables are recognised by the `data-stat` identifiers on their cells rather
//! than by table ids, so the upstream can rename or reorder tables freely. The
//! identifiers below are the contract with the upstream markup: if the site
//! renames a column, the matching family stops being populated.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Selector};
use tracing::debug;

use crate::{
    tables::TableCandidate,
    types::{GoalkeeperRecord, PlayerRecord, StatRecord, TeamRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSchema {
    Player,
    Goalkeeper,
    Team,
}

struct Selectors {
    body_rows: Selector,
    any_player: Selector,
    header_team: Selector,
    data_goals: Selector,
    data_clean_sheets: Selector,
    data_points: Selector,
    player: Selector,
    team: Selector,
    goals: Selector,
    assists: Selector,
    clean_sheets: Selector,
    points: Selector,
    goals_for: Selector,
    goals_against: Selector,
    wins: Selector,
    draws: Selector,
    losses: Selector,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {}: {:?}", css, e))
}

/// Matches a cell by `data-stat`, whether it is a row header or a data cell.
fn stat_cell(stat: &str) -> Result<Selector> {
    selector(&format!(
        "th[data-stat='{stat}'], td[data-stat='{stat}']"
    ))
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            // Repeated header rows inside <tbody> carry class="thead".
            body_rows: selector("tbody > tr:not(.thead)")?,
            any_player: stat_cell("player")?,
            header_team: selector("th[data-stat='team']")?,
            data_goals: selector("td[data-stat='goals']")?,
            data_clean_sheets: selector("td[data-stat='clean_sheets']")?,
            data_points: selector("td[data-stat='points']")?,
            player: stat_cell("player")?,
            team: stat_cell("team")?,
            goals: stat_cell("goals")?,
            assists: stat_cell("assists")?,
            clean_sheets: stat_cell("clean_sheets")?,
            points: stat_cell("points")?,
            goals_for: stat_cell("goals_for")?,
            goals_against: stat_cell("goals_against")?,
            wins: stat_cell("wins")?,
            draws: stat_cell("draws")?,
            losses: stat_cell("losses")?,
        })
    }
}

fn cell_text(row: &ElementRef<'_>, selector: &Selector) -> String {
    row.select(selector)
        .next()
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn identity(row: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text = cell_text(row, selector);
    (!text.is_empty()).then_some(text)
}

/// Decimal parse of a trimmed cell; anything non-finite counts as missing.
pub fn parse_stat(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub struct StatExtractor {
    selectors: Selectors,
}

impl StatExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            selectors: Selectors::new()?,
        })
    }

    /// Every schema whose signature columns are present in `table`.
    pub fn classify(&self, table: &ElementRef<'_>) -> Vec<TableSchema> {
        let s = &self.selectors;
        let has = |sel: &Selector| table.select(sel).next().is_some();

        let mut schemas = Vec::new();
        if has(&s.any_player) && has(&s.data_goals) {
            schemas.push(TableSchema::Player);
        }
        if has(&s.any_player) && has(&s.data_clean_sheets) {
            schemas.push(TableSchema::Goalkeeper);
        }
        if has(&s.header_team) && has(&s.data_points) {
            schemas.push(TableSchema::Team);
        }
        schemas
    }

    pub fn classify_and_extract(&self, candidates: &[TableCandidate<'_>]) -> Vec<StatRecord> {
        let mut records = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            for schema in self.classify(&candidate.table) {
                let before = records.len();
                for row in candidate.table.select(&self.selectors.body_rows) {
                    if let Some(record) = self.extract_row(schema, &row) {
                        records.push(record);
                    }
                }
                debug!(
                    "Table {} ({:?}) classified as {:?}: {} rows extracted",
                    index,
                    candidate.source,
                    schema,
                    records.len() - before
                );
            }
        }

        records
    }

    fn extract_row(&self, schema: TableSchema, row: &ElementRef<'_>) -> Option<StatRecord> {
        let s = &self.selectors;
        let stat = |sel: &Selector| parse_stat(&cell_text(row, sel));

        match schema {
            TableSchema::Player => Some(StatRecord::Player(PlayerRecord {
                player: identity(row, &s.player)?,
                team: identity(row, &s.team)?,
                goals: stat(&s.goals),
                assists: stat(&s.assists),
            })),
            TableSchema::Goalkeeper => Some(StatRecord::Goalkeeper(GoalkeeperRecord {
                player: identity(row, &s.player)?,
                team: identity(row, &s.team)?,
                clean_sheets: stat(&s.clean_sheets)?,
            })),
            TableSchema::Team => Some(StatRecord::Team(TeamRecord {
                team: identity(row, &s.team)?,
                points: stat(&s.points),
                goals_for: stat(&s.goals_for),
                goals_against: stat(&s.goals_against),
                wins: stat(&s.wins),
                draws: stat(&s.draws),
                losses: stat(&s.losses),
            })),
        }
    }
}
