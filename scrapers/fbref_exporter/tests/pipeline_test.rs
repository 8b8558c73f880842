use std::sync::Arc;

use fbref_exporter::{
    config::{ExporterConfig, UpstreamConfig},
    extract::StatExtractor,
    metrics::Publisher,
    scheduler::Scheduler,
    tables::locate,
    types::{PlayerRecord, RecordCounts, StatRecord, TableSource, TeamRecord},
};
use pretty_assertions::assert_eq;

const STATS_PAGE: &str = include_str!("fixtures/premier_league_stats.html");

fn scheduler_for(url: String, publisher: Arc<Publisher>) -> Scheduler {
    let config = ExporterConfig {
        upstream: UpstreamConfig {
            url,
            backoff_secs: 0,
            request_timeout_secs: 5,
            ..UpstreamConfig::default()
        },
        ..ExporterConfig::default()
    };
    Scheduler::new(&config, publisher).unwrap()
}

fn extract_fixture() -> Vec<StatRecord> {
    let extractor = StatExtractor::new().unwrap();
    let tables = locate(STATS_PAGE).unwrap();
    extractor.classify_and_extract(&tables.candidates())
}

#[test]
fn test_fixture_tables_are_located() {
    let tables = locate(STATS_PAGE).unwrap();
    let sources: Vec<_> = tables.candidates().iter().map(|c| c.source).collect();
    assert_eq!(
        sources,
        vec![TableSource::Visible, TableSource::Comment, TableSource::Comment]
    );
}

#[test]
fn test_fixture_extraction() {
    let records = extract_fixture();
    assert_eq!(
        RecordCounts::from_records(&records),
        RecordCounts { players: 3, teams: 3, goalkeepers: 2 }
    );

    let city = records.iter().find_map(|r| match r {
        StatRecord::Team(t) if t.team == "Manchester City" => Some(t.clone()),
        _ => None,
    });
    assert_eq!(
        city,
        Some(TeamRecord {
            team: "Manchester City".to_string(),
            points: Some(23.0),
            goals_for: Some(22.0),
            goals_against: None,
            wins: Some(7.0),
            draws: Some(2.0),
            losses: Some(3.0),
        })
    );

    let saka = records.iter().find_map(|r| match r {
        StatRecord::Player(p) if p.player == "Bukayo Saka" => Some(p.clone()),
        _ => None,
    });
    assert_eq!(
        saka,
        Some(PlayerRecord {
            player: "Bukayo Saka".to_string(),
            team: "Arsenal".to_string(),
            goals: Some(5.0),
            assists: None,
        })
    );
}

#[tokio::test]
async fn test_full_cycle_against_mock_upstream() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/en/comps/9/Premier-League-Stats")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(STATS_PAGE)
        .create_async()
        .await;

    let publisher = Arc::new(Publisher::new().unwrap());
    let scheduler = scheduler_for(
        format!("{}/en/comps/9/Premier-League-Stats", server.url()),
        publisher.clone(),
    );

    let report = scheduler.run_cycle().await;
    assert!(report.success, "cycle failed: {:?}", report.error);

    let output = publisher.render().unwrap();
    for line in [
        r#"premier_league_player_goals{player="Erling Haaland",team="Manchester City"} 12"#,
        r#"premier_league_player_assists{player="Mohamed Salah",team="Liverpool"} 6"#,
        r#"premier_league_goalkeeper_clean_sheets{player="David Raya",team="Arsenal"} 4"#,
        r#"premier_league_team_points{team="Liverpool"} 31"#,
        r#"premier_league_team_wins{team="Arsenal"} 6"#,
        r#"premier_league_team_goals_against{team="Liverpool"} 6"#,
        "fbref_scrape_success 1",
    ] {
        assert!(output.contains(line), "missing line: {line}");
    }

    assert!(!output.contains(r#"premier_league_team_goals_against{team="Manchester City"}"#));
    assert!(!output.contains(r#"premier_league_player_assists{player="Bukayo Saka""#));
    assert!(!output.contains("Unknown"));
    assert!(!output.contains(r#"team="Squad""#));
}
