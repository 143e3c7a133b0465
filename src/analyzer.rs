use chrono::Utc;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::entities::{
    Match, MatchResult, NodeKind, Player, ReasoningStep, Team, Tip, TipOutcome, parse_key, round_dp,
};
use crate::error::{AnalyzeError, EntityError};
use crate::graph::{EdgeKind, GraphStats, KnowledgeGraph, SharedGraph};
use crate::reasoning::{self, ReasoningContext, Side, Synthesis};
use crate::similarity::find_similar_matches;

pub const MARKET_1X2: &str = "1X2";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    pub similar_top_k: usize,
    pub h2h_link_weight: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            similar_top_k: 5,
            h2h_link_weight: 0.8,
        }
    }
}

/// Raw entity payloads for one analysis. Empty lists mean "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub home_team: Value,
    pub away_team: Value,
    #[serde(default)]
    pub h2h_history: Vec<Value>,
    #[serde(default)]
    pub home_players: Vec<Value>,
    #[serde(default)]
    pub away_players: Vec<Value>,
}

/// An analysis request as the service layer receives it: the fixture plus
/// everything known about both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "match")]
    pub fixture: Value,
    #[serde(flatten)]
    pub input: AnalysisInput,
}

struct DecodedInput {
    home: Team,
    away: Team,
    h2h: Vec<Match>,
    home_players: Vec<Player>,
    away_players: Vec<Player>,
}

impl AnalysisInput {
    // Everything is validated before the store is touched.
    fn decode(&self) -> Result<DecodedInput, EntityError> {
        let home = Team::from_value(&self.home_team)?;
        let away = Team::from_value(&self.away_team)?;
        let h2h = decode_historical(&self.h2h_history)?;
        let home_players = decode_all(&self.home_players, Player::from_value)?;
        let away_players = decode_all(&self.away_players, Player::from_value)?;
        Ok(DecodedInput {
            home,
            away,
            h2h,
            home_players,
            away_players,
        })
    }
}

fn decode_all<T>(
    values: &[Value],
    decode: impl Fn(&Value) -> Result<T, EntityError>,
) -> Result<Vec<T>, EntityError> {
    values.iter().map(decode).collect()
}

fn decode_historical(values: &[Value]) -> Result<Vec<Match>, EntityError> {
    let mut matches = decode_all(values, Match::from_value)?;
    for m in &mut matches {
        m.is_historical = true;
    }
    Ok(matches)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMatch {
    pub match_id: String,
    pub score: f64,
    pub result: Option<MatchResult>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    #[serde(serialize_with = "serialize_tip")]
    pub tip: Tip,
    pub synthesis: Synthesis,
    pub reasoning_steps: Vec<ReasoningStep>,
    pub similar_matches: Vec<SimilarMatch>,
    pub graph_stats: GraphStats,
}

// The report's tip also exposes the derived key and rendered reasoning.
#[derive(Serialize)]
struct TipOutput<'a> {
    #[serde(flatten)]
    tip: &'a Tip,
    node_id: String,
    reasoning_summary: String,
}

fn serialize_tip<S: Serializer>(tip: &Tip, serializer: S) -> Result<S::Ok, S::Error> {
    TipOutput {
        tip,
        node_id: tip.key(),
        reasoning_summary: tip.reasoning_summary(),
    }
    .serialize(serializer)
}

#[derive(Debug, Clone, Default)]
pub struct MatchAnalyzer {
    graph: SharedGraph,
    config: AnalyzerConfig,
}

impl MatchAnalyzer {
    pub fn new(graph: SharedGraph, config: AnalyzerConfig) -> Self {
        Self { graph, config }
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn config(&self) -> AnalyzerConfig {
        self.config
    }

    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }

    pub fn ingest_team(&self, value: &Value) -> Result<String, EntityError> {
        let team = Team::from_value(value)?;
        Ok(self.graph.write().add_team(team))
    }

    pub fn ingest_player(&self, value: &Value) -> Result<String, EntityError> {
        let player = Player::from_value(value)?;
        Ok(self.graph.write().add_player(player))
    }

    pub fn ingest_match(&self, value: &Value) -> Result<String, EntityError> {
        let fixture = Match::from_value(value)?;
        Ok(self.graph.write().add_match(fixture))
    }

    pub fn ingest_tip(&self, value: &Value) -> Result<String, EntityError> {
        let tip = Tip::from_value(value)?;
        Ok(self.graph.write().add_tip(tip))
    }

    /// Store a batch of past meetings and cross-link every pair of them.
    pub fn ingest_historical_matches(&self, values: &[Value]) -> Result<Vec<String>, EntityError> {
        let matches = decode_historical(values)?;
        let mut graph = self.graph.write();
        Ok(link_h2h_batch(&mut graph, matches, self.config.h2h_link_weight))
    }

    /// Full pipeline for a fixture already in the store.
    pub fn analyze(&self, match_key: &str, input: &AnalysisInput) -> Result<AnalysisReport, AnalyzeError> {
        let match_id = match_id_from_key(match_key)?;
        let decoded = input.decode()?;
        let mut graph = self.graph.write();
        Ok(self.run_locked(&mut graph, match_key, match_id, decoded))
    }

    /// Ingest the request's fixture after its teams, then analyze it.
    pub fn run(&self, request: &AnalyzeRequest) -> Result<AnalysisReport, AnalyzeError> {
        let fixture = Match::from_value(&request.fixture)?;
        let decoded = request.input.decode()?;
        let match_key = fixture.key();
        let match_id = fixture.id.clone();

        let mut graph = self.graph.write();
        graph.add_team(decoded.home.clone());
        graph.add_team(decoded.away.clone());
        graph.add_match(fixture);
        Ok(self.run_locked(&mut graph, &match_key, &match_id, decoded))
    }

    pub fn quick_analyze(
        &self,
        fixture: &Value,
        home_team: &Value,
        away_team: &Value,
    ) -> Result<AnalysisReport, AnalyzeError> {
        self.run(&AnalyzeRequest {
            fixture: fixture.clone(),
            input: AnalysisInput {
                home_team: home_team.clone(),
                away_team: away_team.clone(),
                ..AnalysisInput::default()
            },
        })
    }

    fn run_locked(
        &self,
        graph: &mut KnowledgeGraph,
        match_key: &str,
        match_id: &str,
        input: DecodedInput,
    ) -> AnalysisReport {
        info!(fixture = match_key, "analyzing match");

        let DecodedInput {
            home,
            away,
            h2h,
            home_players,
            away_players,
        } = input;

        let home_key = graph.add_team(home.clone());
        let away_key = graph.add_team(away.clone());
        if !h2h.is_empty() {
            link_h2h_batch(graph, h2h, self.config.h2h_link_weight);
        }
        for player in home_players.into_iter().chain(away_players) {
            graph.add_player(player);
        }

        let context = graph.match_context(match_key);
        if context.is_none() {
            warn!(fixture = match_key, "no match record stored, analysing teams only");
        }

        let mut ctx = ReasoningContext::new();
        reasoning::analyze_team_form(&mut ctx, &home, Side::Home);
        reasoning::analyze_team_form(&mut ctx, &away, Side::Away);

        let meetings: Vec<Match> = graph
            .h2h_matches(&home_key, &away_key)
            .iter()
            .filter_map(|k| graph.fixture(k).cloned())
            .collect();
        reasoning::analyze_h2h(&mut ctx, &meetings, &home.id);

        if let Some(context) = &context {
            reasoning::analyze_players(&mut ctx, &context.home_players, &home.name, Side::Home);
            reasoning::analyze_players(&mut ctx, &context.away_players, &away.name, Side::Away);
            reasoning::analyze_venue_weather(&mut ctx, &context.fixture);
        }

        let synthesis = reasoning::synthesize(&ctx);
        let selection = synthesis.direction.selection();

        let similar_matches = find_similar_matches(graph, match_key, self.config.similar_top_k)
            .into_iter()
            .filter_map(|(key, score)| {
                let m = graph.fixture(&key)?;
                Some(SimilarMatch {
                    match_id: key,
                    score: round_dp(score, 2),
                    result: m.result(),
                    home_score: m.home_score,
                    away_score: m.away_score,
                })
            })
            .collect();

        let odds_estimated = context
            .as_ref()
            .and_then(|c| c.fixture.odds.as_ref())
            .and_then(|o| o.for_selection(selection))
            .filter(|o| *o > 0.0);
        let ev_score = odds_estimated.map(|o| round_dp(synthesis.confidence / 100.0 * o - 1.0, 3));

        let tip = Tip {
            match_id: match_id.to_string(),
            market: MARKET_1X2.to_string(),
            selection: selection.to_string(),
            confidence: synthesis.confidence,
            odds_estimated,
            ev_score,
            reasoning_path: ctx.into_steps(),
            outcome: TipOutcome::Pending,
            created_at: Utc::now(),
        };
        graph.add_tip(tip.clone());

        info!(
            fixture = match_key,
            selection,
            confidence = synthesis.confidence,
            steps = tip.reasoning_path.len(),
            "analysis complete"
        );

        AnalysisReport {
            reasoning_steps: tip.reasoning_path.clone(),
            tip,
            synthesis,
            similar_matches,
            graph_stats: graph.stats(),
        }
    }
}

fn match_id_from_key(key: &str) -> Result<&str, AnalyzeError> {
    match parse_key(key) {
        Some((NodeKind::Match, id)) => Ok(id),
        _ => Err(AnalyzeError::InvalidMatchKey {
            key: key.to_string(),
        }),
    }
}

fn link_h2h_batch(graph: &mut KnowledgeGraph, matches: Vec<Match>, weight: f64) -> Vec<String> {
    let keys: Vec<String> = matches.into_iter().map(|m| graph.add_match(m)).collect();
    for (i, a) in keys.iter().enumerate() {
        for b in &keys[i + 1..] {
            graph.upsert_edge(a, b, EdgeKind::HistoricalH2h, weight, Map::new());
            graph.upsert_edge(b, a, EdgeKind::HistoricalH2h, weight, Map::new());
        }
    }
    keys
}
