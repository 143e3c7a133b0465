use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::entities::{Match, NodeKind, Player, Team, Tip};

/// Relationship types. `SimilarContext`, `LeagueRival` and `RecentOpponent`
/// are part of the schema but nothing populates them yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    HasPlayer,
    PlaysFor,
    PlaysHome,
    PlaysAway,
    HistoricalH2h,
    SimilarContext,
    GeneratesTip,
    LeagueRival,
    RecentOpponent,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::HasPlayer => "HAS_PLAYER",
            EdgeKind::PlaysFor => "PLAYS_FOR",
            EdgeKind::PlaysHome => "PLAYS_HOME",
            EdgeKind::PlaysAway => "PLAYS_AWAY",
            EdgeKind::HistoricalH2h => "HISTORICAL_H2H",
            EdgeKind::SimilarContext => "SIMILAR_CONTEXT",
            EdgeKind::GeneratesTip => "GENERATES_TIP",
            EdgeKind::LeagueRival => "LEAGUE_RIVAL",
            EdgeKind::RecentOpponent => "RECENT_OPPONENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node_type", content = "data", rename_all = "snake_case")]
pub enum NodeData {
    Team(Team),
    Player(Player),
    Match(Match),
    Tip(Tip),
    /// Placeholder for an edge endpoint nobody has ingested yet.
    Unknown,
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Team(_) => NodeKind::Team,
            NodeData::Player(_) => NodeKind::Player,
            NodeData::Match(_) => NodeKind::Match,
            NodeData::Tip(_) => NodeKind::Tip,
            NodeData::Unknown => NodeKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub key: String,
    pub data: NodeData,
}

impl NodeRecord {
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub weight: f64,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_type: BTreeMap<NodeKind, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchContext {
    #[serde(rename = "match")]
    pub fixture: Match,
    pub home_team: Option<Team>,
    pub away_team: Option<Team>,
    pub home_players: Vec<Player>,
    pub away_players: Vec<Player>,
    pub tips: Vec<Tip>,
}

type EdgeId = (String, String, EdgeKind);

/// Directed, typed, weighted multigraph keyed by entity key.
///
/// Nodes and edges keep insertion order, so every traversal is deterministic.
/// At most one edge exists per (source, target, kind); re-adding it overwrites
/// weight and metadata in place.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    nodes: Vec<NodeRecord>,
    node_index: HashMap<String, usize>,
    edges: Vec<Edge>,
    edge_index: HashMap<EdgeId, usize>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.node_index.contains_key(key)
    }

    pub fn contains_entity(&self, key: &str) -> bool {
        self.get_node_data(key).is_some()
    }

    /// Insert or replace the record at `key`. Edges touching `key` survive.
    pub fn upsert_node(&mut self, key: &str, data: NodeData) {
        match self.node_index.get(key) {
            Some(&idx) => self.nodes[idx].data = data,
            None => {
                self.node_index.insert(key.to_string(), self.nodes.len());
                self.nodes.push(NodeRecord {
                    key: key.to_string(),
                    data,
                });
            }
        }
        debug!(key, "node upserted");
    }

    pub fn add_team(&mut self, team: Team) -> String {
        let key = team.key();
        self.upsert_node(&key, NodeData::Team(team));
        key
    }

    pub fn add_player(&mut self, player: Player) -> String {
        let key = player.key();
        let team_key = player.team_key();
        self.upsert_node(&key, NodeData::Player(player));
        if self.contains_entity(&team_key) {
            self.link(&team_key, &key, EdgeKind::HasPlayer);
            self.link(&key, &team_key, EdgeKind::PlaysFor);
        } else {
            debug!(player = %key, team = %team_key, "team not ingested, roster link skipped");
        }
        key
    }

    pub fn add_match(&mut self, fixture: Match) -> String {
        let key = fixture.key();
        let home_key = fixture.home_team_key();
        let away_key = fixture.away_team_key();
        self.upsert_node(&key, NodeData::Match(fixture));
        for (team_key, kind) in [(home_key, EdgeKind::PlaysHome), (away_key, EdgeKind::PlaysAway)] {
            if self.contains_entity(&team_key) {
                self.link(&team_key, &key, kind);
            } else {
                debug!(fixture = %key, team = %team_key, "team not ingested, fixture link skipped");
            }
        }
        key
    }

    pub fn add_tip(&mut self, tip: Tip) -> String {
        let key = tip.key();
        let match_key = tip.match_key();
        self.upsert_node(&key, NodeData::Tip(tip));
        if self.contains_entity(&match_key) {
            self.link(&match_key, &key, EdgeKind::GeneratesTip);
        } else {
            debug!(tip = %key, fixture = %match_key, "match not ingested, tip link skipped");
        }
        key
    }

    pub fn link(&mut self, source: &str, target: &str, kind: EdgeKind) {
        self.upsert_edge(source, target, kind, 1.0, Map::new());
    }

    /// Create or overwrite the (source, target, kind) edge. Unknown endpoints
    /// become placeholder nodes until their entity is ingested.
    pub fn upsert_edge(
        &mut self,
        source: &str,
        target: &str,
        kind: EdgeKind,
        weight: f64,
        metadata: Map<String, Value>,
    ) {
        self.ensure_node(source);
        self.ensure_node(target);

        let id = (source.to_string(), target.to_string(), kind);
        if let Some(&idx) = self.edge_index.get(&id) {
            let edge = &mut self.edges[idx];
            edge.weight = weight;
            edge.metadata = metadata;
            return;
        }

        let idx = self.edges.len();
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
            kind,
            weight,
            metadata,
        });
        self.edge_index.insert(id, idx);
        self.outgoing.entry(source.to_string()).or_default().push(idx);
        self.incoming.entry(target.to_string()).or_default().push(idx);
        debug!(source, target, kind = kind.as_str(), "edge added");
    }

    fn ensure_node(&mut self, key: &str) {
        if !self.contains(key) {
            debug!(key, "placeholder node created for edge endpoint");
            self.upsert_node(key, NodeData::Unknown);
        }
    }

    pub fn get_node(&self, key: &str) -> Option<&NodeRecord> {
        self.node_index.get(key).map(|&idx| &self.nodes[idx])
    }

    /// Entity payload at `key`; placeholders have none.
    pub fn get_node_data(&self, key: &str) -> Option<&NodeData> {
        self.get_node(key)
            .map(|n| &n.data)
            .filter(|d| !matches!(d, NodeData::Unknown))
    }

    pub fn team(&self, key: &str) -> Option<&Team> {
        match self.get_node_data(key)? {
            NodeData::Team(team) => Some(team),
            _ => None,
        }
    }

    pub fn player(&self, key: &str) -> Option<&Player> {
        match self.get_node_data(key)? {
            NodeData::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn fixture(&self, key: &str) -> Option<&Match> {
        match self.get_node_data(key)? {
            NodeData::Match(fixture) => Some(fixture),
            _ => None,
        }
    }

    pub fn tip(&self, key: &str) -> Option<&Tip> {
        match self.get_node_data(key)? {
            NodeData::Tip(tip) => Some(tip),
            _ => None,
        }
    }

    pub fn edge(&self, source: &str, target: &str, kind: EdgeKind) -> Option<&Edge> {
        let id = (source.to_string(), target.to_string(), kind);
        self.edge_index.get(&id).map(|&idx| &self.edges[idx])
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn neighbors_out(&self, key: &str, kind: Option<EdgeKind>) -> Vec<String> {
        self.adjacent(&self.outgoing, key, kind, |e| &e.target)
    }

    pub fn neighbors_in(&self, key: &str, kind: Option<EdgeKind>) -> Vec<String> {
        self.adjacent(&self.incoming, key, kind, |e| &e.source)
    }

    fn adjacent(
        &self,
        adjacency: &HashMap<String, Vec<usize>>,
        key: &str,
        kind: Option<EdgeKind>,
        endpoint: impl Fn(&Edge) -> &String,
    ) -> Vec<String> {
        let Some(ids) = adjacency.get(key) else {
            return Vec::new();
        };
        ids.iter()
            .map(|&idx| &self.edges[idx])
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .map(|e| endpoint(e).clone())
            .collect()
    }

    pub fn nodes_of_type(&self, kind: NodeKind) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.kind() == kind)
            .map(|n| n.key.clone())
            .collect()
    }

    /// Home fixtures followed by away fixtures.
    pub fn team_matches(&self, team_key: &str) -> Vec<String> {
        let mut out = self.neighbors_out(team_key, Some(EdgeKind::PlaysHome));
        out.extend(self.neighbors_out(team_key, Some(EdgeKind::PlaysAway)));
        out
    }

    pub fn h2h_matches(&self, team_a: &str, team_b: &str) -> BTreeSet<String> {
        let a: BTreeSet<String> = self.team_matches(team_a).into_iter().collect();
        let b: BTreeSet<String> = self.team_matches(team_b).into_iter().collect();
        a.intersection(&b).cloned().collect()
    }

    pub fn match_context(&self, match_key: &str) -> Option<MatchContext> {
        let fixture = self.fixture(match_key)?.clone();

        // With several home/away edges the first inserted one wins.
        let home_key = self
            .neighbors_in(match_key, Some(EdgeKind::PlaysHome))
            .into_iter()
            .next();
        let away_key = self
            .neighbors_in(match_key, Some(EdgeKind::PlaysAway))
            .into_iter()
            .next();

        let roster = |team_key: Option<&String>| -> Vec<Player> {
            let Some(team_key) = team_key else {
                return Vec::new();
            };
            self.neighbors_out(team_key, Some(EdgeKind::HasPlayer))
                .iter()
                .filter_map(|k| self.player(k).cloned())
                .collect()
        };

        let tips = self
            .neighbors_out(match_key, Some(EdgeKind::GeneratesTip))
            .iter()
            .filter_map(|k| self.tip(k).cloned())
            .collect();

        Some(MatchContext {
            fixture,
            home_team: home_key.as_deref().and_then(|k| self.team(k)).cloned(),
            away_team: away_key.as_deref().and_then(|k| self.team(k)).cloned(),
            home_players: roster(home_key.as_ref()),
            away_players: roster(away_key.as_ref()),
            tips,
        })
    }

    /// Copy of the subgraph induced by everything within `depth` hops of
    /// `center`, following edges in either direction.
    pub fn extract_subgraph(&self, center: &str, depth: usize) -> KnowledgeGraph {
        if !self.contains(center) {
            return KnowledgeGraph::new();
        }

        let mut keep: HashSet<String> = HashSet::from([center.to_string()]);
        let mut frontier = vec![center.to_string()];
        for _ in 0..depth {
            let mut next = Vec::new();
            for key in &frontier {
                let around = self
                    .neighbors_out(key, None)
                    .into_iter()
                    .chain(self.neighbors_in(key, None));
                for neighbor in around {
                    if keep.insert(neighbor.clone()) {
                        next.push(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut sub = KnowledgeGraph::new();
        for node in self.nodes.iter().filter(|n| keep.contains(&n.key)) {
            sub.upsert_node(&node.key, node.data.clone());
        }
        for edge in self
            .edges
            .iter()
            .filter(|e| keep.contains(&e.source) && keep.contains(&e.target))
        {
            sub.upsert_edge(
                &edge.source,
                &edge.target,
                edge.kind,
                edge.weight,
                edge.metadata.clone(),
            );
        }
        sub
    }

    pub fn stats(&self) -> GraphStats {
        let mut nodes_by_type = BTreeMap::new();
        for node in &self.nodes {
            *nodes_by_type.entry(node.kind()).or_insert(0) += 1;
        }
        GraphStats {
            total_nodes: self.node_count(),
            total_edges: self.edge_count(),
            nodes_by_type,
        }
    }
}

/// Process-wide store handle. Clones share the same graph; writers are
/// serialized, readers run side by side.
#[derive(Debug, Clone, Default)]
pub struct SharedGraph {
    inner: Arc<RwLock<KnowledgeGraph>>,
}

impl SharedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_graph(graph: KnowledgeGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(graph)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, KnowledgeGraph> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, KnowledgeGraph> {
        self.inner.write()
    }

    pub fn stats(&self) -> GraphStats {
        self.read().stats()
    }
}
