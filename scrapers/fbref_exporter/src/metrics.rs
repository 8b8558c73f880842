use anyhow::{Context, Result};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::{
    sync::{Mutex, PoisonError, RwLock, RwLockWriteGuard},
    time::Duration,
};

use crate::types::{CycleReport, StatRecord};

const PLAYER_LABELS: &[&str] = &["player", "team"];
const TEAM_LABELS: &[&str] = &["team"];

struct StatGauges {
    player_goals: GaugeVec,
    player_assists: GaugeVec,
    goalkeeper_clean_sheets: GaugeVec,
    team_points: GaugeVec,
    team_goals_for: GaugeVec,
    team_goals_against: GaugeVec,
    team_wins: GaugeVec,
    team_draws: GaugeVec,
    team_losses: GaugeVec,
}

impl StatGauges {
    fn all(&self) -> [&GaugeVec; 9] {
        [
            &self.player_goals,
            &self.player_assists,
            &self.goalkeeper_clean_sheets,
            &self.team_points,
            &self.team_goals_for,
            &self.team_goals_against,
            &self.team_wins,
            &self.team_draws,
            &self.team_losses,
        ]
    }
}

fn gauge_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), labels)
        .with_context(|| format!("Failed to create gauge {}", name))?;
    registry
        .register(Box::new(gauge.clone()))
        .with_context(|| format!("Failed to register gauge {}", name))?;
    Ok(gauge)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge> {
    let gauge = Gauge::new(name, help).with_context(|| format!("Failed to create gauge {}", name))?;
    registry
        .register(Box::new(gauge.clone()))
        .with_context(|| format!("Failed to register gauge {}", name))?;
    Ok(gauge)
}

/// Owns every exported gauge. Stat families are replaced wholesale per cycle;
/// the two health gauges persist across cycles.
pub struct Publisher {
    registry: Registry,
    stats: StatGauges,
    scrape_success: Gauge,
    scrape_duration: Gauge,
    // Held for writing across reset + repopulate, for reading while encoding.
    snapshot: RwLock<()>,
    last_report: Mutex<Option<CycleReport>>,
}

impl Publisher {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let r = &registry;

        let stats = StatGauges {
            player_goals: gauge_vec(r, "premier_league_player_goals", "Goals scored by each Premier League player", PLAYER_LABELS)?,
            player_assists: gauge_vec(r, "premier_league_player_assists", "Assists made by each Premier League player", PLAYER_LABELS)?,
            goalkeeper_clean_sheets: gauge_vec(r, "premier_league_goalkeeper_clean_sheets", "Number of clean sheets by each goalkeeper", PLAYER_LABELS)?,
            team_points: gauge_vec(r, "premier_league_team_points", "Current Premier League points per team", TEAM_LABELS)?,
            team_goals_for: gauge_vec(r, "premier_league_team_goals_for", "Total goals scored per team", TEAM_LABELS)?,
            team_goals_against: gauge_vec(r, "premier_league_team_goals_against", "Total goals conceded per team", TEAM_LABELS)?,
            team_wins: gauge_vec(r, "premier_league_team_wins", "Total wins per team", TEAM_LABELS)?,
            team_draws: gauge_vec(r, "premier_league_team_draws", "Total draws per team", TEAM_LABELS)?,
            team_losses: gauge_vec(r, "premier_league_team_losses", "Total losses per team", TEAM_LABELS)?,
        };

        let scrape_success = gauge(r, "fbref_scrape_success", "Whether the last scrape succeeded (1=success, 0=failure)")?;
        let scrape_duration = gauge(r, "fbref_scrape_duration_seconds", "Time taken for the last fbref scrape in seconds")?;

        Ok(Self {
            registry,
            stats,
            scrape_success,
            scrape_duration,
            snapshot: RwLock::new(()),
            last_report: Mutex::new(None),
        })
    }

    /// Clears every stat family and returns a writer for this cycle's records.
    /// Readers are blocked until the writer is dropped, so they never observe
    /// a half-populated snapshot.
    pub fn begin_cycle(&self) -> CycleWriter<'_> {
        let guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        for family in self.stats.all() {
            family.reset();
        }
        CycleWriter {
            stats: &self.stats,
            _guard: guard,
        }
    }

    pub fn end_cycle(&self, success: bool, duration: Duration) {
        let _guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        self.scrape_duration.set(duration.as_secs_f64());
        self.scrape_success.set(if success { 1.0 } else { 0.0 });
    }

    pub fn record_report(&self, report: CycleReport) {
        *self.last_report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Encodes the current snapshot in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let families = {
            let _guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
            self.registry.gather()
        };
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output was not UTF-8")
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

/// Write access to the stat families for the duration of one cycle.
pub struct CycleWriter<'a> {
    stats: &'a StatGauges,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl CycleWriter<'_> {
    /// Sets the gauges for `record`; a repeated label tuple overwrites.
    pub fn publish(&mut self, record: &StatRecord) {
        let s = self.stats;
        match record {
            StatRecord::Player(p) => {
                let labels = [p.player.as_str(), p.team.as_str()];
                if let Some(goals) = p.goals {
                    s.player_goals.with_label_values(&labels).set(goals);
                }
                if let Some(assists) = p.assists {
                    s.player_assists.with_label_values(&labels).set(assists);
                }
            }
            StatRecord::Goalkeeper(gk) => {
                s.goalkeeper_clean_sheets
                    .with_label_values(&[gk.player.as_str(), gk.team.as_str()])
                    .set(gk.clean_sheets);
            }
            StatRecord::Team(t) => {
                let labels = [t.team.as_str()];
                let fields = [
                    (&s.team_points, t.points),
                    (&s.team_goals_for, t.goals_for),
                    (&s.team_goals_against, t.goals_against),
                    (&s.team_wins, t.wins),
                    (&s.team_draws, t.draws),
                    (&s.team_losses, t.losses),
                ];
                for (family, value) in fields {
                    if let Some(value) = value {
                        family.with_label_values(&labels).set(value);
                    }
                }
            }
        }
    }
}
