use std::fs;
use std::path::PathBuf;

use serde_json::json;
use tipgraph::analyzer::{AnalyzeRequest, AnalyzerConfig, MARKET_1X2, MatchAnalyzer};
use tipgraph::entities::{NodeKind, Player, Team, TipOutcome};
use tipgraph::graph::{EdgeKind, SharedGraph};
use tipgraph::reasoning::Direction;

fn read_fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(path).expect("read fixture")
}

fn request(name: &str) -> AnalyzeRequest {
    serde_json::from_str(&read_fixture(name)).expect("valid request json")
}

#[test]
fn full_request_produces_home_tip() {
    let analyzer = MatchAnalyzer::default();
    let report = analyzer.run(&request("analyze_request.json")).unwrap();

    assert_eq!(report.synthesis.direction, Direction::Home);
    assert_eq!(report.tip.selection, "1");
    assert_eq!(report.tip.market, MARKET_1X2);
    assert_eq!(report.tip.outcome, TipOutcome::Pending);

    // Form 2 + ranking 0.5 + h2h 1 + home advantage 0.4 vs. one key absence.
    assert_eq!(report.synthesis.home_score, 3.9);
    assert_eq!(report.synthesis.away_score, -0.8);

    // Nine steps: form and ranking per side, h2h summary, two roster
    // steps, venue and cold weather.
    assert_eq!(report.reasoning_steps.len(), 9);
    assert_eq!(report.tip.reasoning_path, report.reasoning_steps);
    assert_eq!(report.tip.confidence, 47.8);
    assert!(
        report
            .reasoning_steps
            .iter()
            .all(|s| (0.0..=1.0).contains(&s.weight))
    );

    let h2h = report
        .reasoning_steps
        .iter()
        .find(|s| s.source_node == "graph:h2h")
        .unwrap();
    assert!(h2h.insight.starts_with("H2H (3 matches): 2W-1D-0L"));

    assert_eq!(report.synthesis.key_factors.len(), 3);
    assert!(
        report
            .synthesis
            .key_factors
            .iter()
            .any(|f| f.contains("Karim Diallo"))
    );

    assert_eq!(report.tip.odds_estimated, Some(1.55));
    let ev = report.tip.ev_score.unwrap();
    assert!((ev - -0.259).abs() < 1e-9);
}

#[test]
fn similar_matches_are_the_stored_meetings() {
    let analyzer = MatchAnalyzer::default();
    let report = analyzer.run(&request("analyze_request.json")).unwrap();

    let ids: Vec<_> = report
        .similar_matches
        .iter()
        .map(|m| m.match_id.as_str())
        .collect();
    assert_eq!(ids, vec!["match:801", "match:802", "match:803"]);
    assert!(report.similar_matches.iter().all(|m| m.score == 4.8));
    assert_eq!(report.similar_matches[0].home_score, Some(2));
}

#[test]
fn store_is_populated_and_tip_linked() {
    let analyzer = MatchAnalyzer::default();
    let report = analyzer.run(&request("analyze_request.json")).unwrap();

    let stats = &report.graph_stats;
    assert_eq!(stats.total_nodes, 11);
    assert_eq!(stats.total_edges, 23);
    assert_eq!(stats.nodes_by_type.get(&NodeKind::Player), Some(&4));
    assert_eq!(stats.nodes_by_type.get(&NodeKind::Tip), Some(&1));
    assert_eq!(stats.nodes_by_type.get(&NodeKind::Unknown), None);

    let graph = analyzer.graph().read();
    let tip = graph.tip("tip:900_1X2").unwrap();
    assert_eq!(tip.selection, "1");
    assert_eq!(
        graph.neighbors_in("tip:900_1X2", Some(EdgeKind::GeneratesTip)),
        vec!["match:900"]
    );
    let ctx = graph.match_context("match:900").unwrap();
    assert_eq!(ctx.home_players.len(), 2);
    assert_eq!(ctx.tips.len(), 1);
}

#[test]
fn rerunning_overwrites_the_tip() {
    let analyzer = MatchAnalyzer::default();
    let req = request("analyze_request.json");
    analyzer.run(&req).unwrap();
    let second = analyzer.run(&req).unwrap();

    assert_eq!(second.graph_stats.total_nodes, 11);
    assert_eq!(second.graph_stats.total_edges, 23);
}

#[test]
fn bare_fixture_falls_back_to_defaults() {
    let analyzer = MatchAnalyzer::default();
    let report = analyzer.run(&request("quick_request.json")).unwrap();

    // Only the unplayed fixture itself links the two sides, so no step at all.
    assert!(report.reasoning_steps.is_empty());
    assert_eq!(report.tip.confidence, 50.0);
    assert_eq!(report.synthesis.direction, Direction::Draw);
    assert_eq!(report.tip.selection, "N");
    assert_eq!(
        report.tip.reasoning_summary(),
        "No reasoning path available."
    );
}

#[test]
fn analyze_without_stored_fixture_still_tips() {
    let analyzer = MatchAnalyzer::default();
    let req = request("analyze_request.json");
    let report = analyzer.analyze("match:555", &req.input).unwrap();

    // No venue or roster steps without a fixture record.
    assert!(
        report
            .reasoning_steps
            .iter()
            .all(|s| s.source_node != "match:555")
    );
    assert_eq!(report.tip.match_id, "555");
    assert!(report.tip.odds_estimated.is_none());
}

#[test]
fn shared_store_accumulates_across_analyzers() {
    let graph = SharedGraph::new();
    let first = MatchAnalyzer::new(graph.clone(), AnalyzerConfig::default());
    let second = MatchAnalyzer::new(
        graph.clone(),
        AnalyzerConfig {
            similar_top_k: 1,
            h2h_link_weight: 0.5,
        },
    );

    first.run(&request("analyze_request.json")).unwrap();
    let report = second
        .quick_analyze(
            &json!({
                "id": "950", "home_team_id": "om", "away_team_id": "psg",
                "league": "Ligue 1", "match_date": "2026-04-12"
            }),
            &json!({"id": "om", "name": "Marseille", "form": ["W", "W", "W"]}),
            &json!({"id": "psg", "name": "Paris SG"}),
        )
        .unwrap();

    assert_eq!(report.similar_matches.len(), 1);
    assert_eq!(report.similar_matches[0].match_id, "match:801");
    assert_eq!(graph.stats().nodes_by_type.get(&NodeKind::Tip), Some(&2));
}

#[test]
fn invalid_payload_is_rejected() {
    let analyzer = MatchAnalyzer::default();
    let mut req = request("analyze_request.json");
    req.input.home_players[0]["position"] = json!(null);
    assert!(analyzer.run(&req).is_err());
    assert_eq!(analyzer.stats().total_nodes, 0);
}

#[test]
fn oversized_h2h_scores_still_produce_a_tip() {
    let analyzer = MatchAnalyzer::default();
    let mut req = request("analyze_request.json");
    req.input.h2h_history[0]["home_score"] = json!(u32::MAX);
    req.input.h2h_history[0]["away_score"] = json!(1);

    let report = analyzer.run(&req).unwrap();
    assert_eq!(report.graph_stats.total_nodes, 11);
    assert!(analyzer.graph().read().tip("tip:900_1X2").is_some());
    assert!(
        report
            .reasoning_steps
            .iter()
            .any(|s| s.insight.starts_with("Meetings tend to be high scoring"))
    );
}

#[test]
fn concurrent_writers_leave_every_link_in_place() {
    const WRITERS: usize = 8;
    let graph = SharedGraph::new();

    let mut handles = Vec::new();
    for i in 0..WRITERS {
        let analyzer = MatchAnalyzer::new(graph.clone(), AnalyzerConfig::default());
        handles.push(std::thread::spawn(move || {
            let req: AnalyzeRequest = serde_json::from_value(json!({
                "match": {
                    "id": format!("{}", 1000 + i), "home_team_id": "psg", "away_team_id": "om",
                    "league": "Ligue 1", "match_date": "2026-05-01"
                },
                "home_team": {"id": "psg", "name": "Paris SG", "form": ["W", "D"]},
                "away_team": {"id": "om", "name": "Marseille", "form": ["L"]},
                "home_players": [
                    {"id": format!("p{i}"), "name": format!("Home {i}"), "team_id": "psg", "position": "MID"}
                ]
            }))
            .unwrap();
            analyzer.run(&req).unwrap();
        }));

        let shared = graph.clone();
        handles.push(std::thread::spawn(move || {
            shared
                .write()
                .add_team(Team::new(format!("t{i}"), format!("Team {i}")));
            shared.write().add_player(Player::new(
                format!("q{i}"),
                format!("Squad {i}"),
                format!("t{i}"),
                "DEF",
            ));
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let g = graph.read();
    let stats = g.stats();
    assert_eq!(stats.nodes_by_type.get(&NodeKind::Team), Some(&(2 + WRITERS)));
    assert_eq!(stats.nodes_by_type.get(&NodeKind::Match), Some(&WRITERS));
    assert_eq!(stats.nodes_by_type.get(&NodeKind::Player), Some(&(2 * WRITERS)));
    assert_eq!(stats.nodes_by_type.get(&NodeKind::Tip), Some(&WRITERS));
    assert_eq!(stats.nodes_by_type.get(&NodeKind::Unknown), None);
    // Fixture links, two roster edges per player, one tip edge per fixture.
    assert_eq!(stats.total_edges, 2 * WRITERS + 4 * WRITERS + WRITERS);

    assert_eq!(g.neighbors_out("team:psg", Some(EdgeKind::PlaysHome)).len(), WRITERS);
    assert_eq!(g.neighbors_out("team:om", Some(EdgeKind::PlaysAway)).len(), WRITERS);
    assert_eq!(g.neighbors_out("team:psg", Some(EdgeKind::HasPlayer)).len(), WRITERS);
    for i in 0..WRITERS {
        let id = 1000 + i;
        assert_eq!(
            g.neighbors_in(&format!("tip:{id}_1X2"), Some(EdgeKind::GeneratesTip)),
            vec![format!("match:{id}")]
        );
        assert_eq!(
            g.neighbors_out(&format!("team:t{i}"), Some(EdgeKind::HasPlayer)),
            vec![format!("player:q{i}")]
        );
    }
}

#[test]
fn report_tip_carries_key_and_summary() {
    let analyzer = MatchAnalyzer::default();
    let report = analyzer.run(&request("analyze_request.json")).unwrap();
    let out = serde_json::to_value(&report).unwrap();

    assert_eq!(out["tip"]["node_id"], "tip:900_1X2");
    assert_eq!(out["tip"]["selection"], "1");
    assert_eq!(out["tip"]["reasoning_summary"], report.tip.reasoning_summary());
    assert!(
        out["tip"]["reasoning_summary"]
            .as_str()
            .unwrap()
            .starts_with("Reasoning (9 steps):")
    );
}
