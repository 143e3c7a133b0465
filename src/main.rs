use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use tipgraph::analyzer::{AnalysisReport, AnalyzeRequest, MatchAnalyzer};
use tipgraph::config::AppConfig;
use tipgraph::graph::{GraphStats, SharedGraph};

const USAGE: &str = "usage: tipgraph [--json] <request.json>...";

fn main() -> Result<()> {
    let mut json = false;
    let mut paths: Vec<PathBuf> = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
            _ => paths.push(PathBuf::from(&arg)),
        }
    }
    if paths.is_empty() {
        bail!("{USAGE}");
    }

    let config = AppConfig::load();
    config.logging.init();

    // One store across all requests so later fixtures see earlier history.
    let analyzer = MatchAnalyzer::new(SharedGraph::new(), config.analyzer);

    let mut reports = Vec::with_capacity(paths.len());
    for path in &paths {
        let request = read_request(path)?;
        let report = analyzer
            .run(&request)
            .with_context(|| format!("analyze {}", path.display()))?;
        if !json {
            print_report(&report);
        }
        reports.push(report);
    }

    let stats = analyzer.stats();
    if json {
        let out = serde_json::json!({ "reports": reports, "graph_stats": stats });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn read_request(path: &Path) -> Result<AnalyzeRequest> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

fn print_report(report: &AnalysisReport) {
    let tip = &report.tip;
    println!("match {}  {} -> {}", tip.match_id, tip.market, tip.selection);
    println!(
        "confidence {:.1}%  home {:.2}  away {:.2}",
        tip.confidence, report.synthesis.home_score, report.synthesis.away_score
    );
    if let (Some(odds), Some(ev)) = (tip.odds_estimated, tip.ev_score) {
        println!("odds {odds:.2}  ev {ev:+.3}");
    }
    if !report.synthesis.key_factors.is_empty() {
        println!("key factors:");
        for factor in &report.synthesis.key_factors {
            println!("  - {factor}");
        }
    }
    println!("{}", tip.reasoning_summary());
    if !report.similar_matches.is_empty() {
        println!("similar matches:");
        for similar in &report.similar_matches {
            let score = match (similar.home_score, similar.away_score) {
                (Some(h), Some(a)) => format!("{h}-{a}"),
                _ => "-".to_string(),
            };
            println!("  {:<24} {:>5.2}  {score}", similar.match_id, similar.score);
        }
    }
    println!();
}

fn print_stats(stats: &GraphStats) {
    println!("graph: {} nodes, {} edges", stats.total_nodes, stats.total_edges);
    for (kind, count) in &stats.nodes_by_type {
        println!("  {:<8} {count}", kind.prefix());
    }
}
