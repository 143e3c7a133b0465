use std::cmp::Ordering;

use rayon::prelude::*;

use crate::entities::{Match, NodeKind};
use crate::graph::KnowledgeGraph;

const EXACT_H2H_BONUS: f64 = 3.0;
const SHARED_TEAM_BONUS: f64 = 1.0;
const SAME_LEAGUE_BONUS: f64 = 1.5;
const RESULT_DATA_BONUS: f64 = 0.3;

/// Historical fixtures most comparable to `target_key`, best first.
/// Equal scores keep store insertion order.
pub fn find_similar_matches(
    graph: &KnowledgeGraph,
    target_key: &str,
    top_k: usize,
) -> Vec<(String, f64)> {
    let Some(target) = graph.fixture(target_key) else {
        return Vec::new();
    };

    let candidates: Vec<(String, &Match)> = graph
        .nodes_of_type(NodeKind::Match)
        .into_iter()
        .filter(|key| key != target_key)
        .filter_map(|key| {
            let fixture = graph.fixture(&key)?;
            fixture.is_historical.then_some((key, fixture))
        })
        .collect();

    let mut scored: Vec<(String, f64)> = candidates
        .into_par_iter()
        .map(|(key, other)| (key, similarity_score(target, other)))
        .filter(|(_, score)| *score > 0.0)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}

pub fn similarity_score(target: &Match, other: &Match) -> f64 {
    let mut score = 0.0;

    match shared_teams(target, other) {
        2 => score += EXACT_H2H_BONUS,
        1 => score += SHARED_TEAM_BONUS,
        _ => {}
    }

    if target.league == other.league {
        score += SAME_LEAGUE_BONUS;
    }

    if other.home_score.is_some() {
        score += RESULT_DATA_BONUS;
    }

    score
}

fn shared_teams(target: &Match, other: &Match) -> usize {
    let mut teams = vec![target.home_team_id.as_str(), target.away_team_id.as_str()];
    teams.dedup();
    teams
        .into_iter()
        .filter(|t| *t == other.home_team_id || *t == other.away_team_id)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Team;
    use chrono::NaiveDate;

    fn fixture(id: &str, home: &str, away: &str, league: &str) -> Match {
        let mut m = Match::new(id, home, away, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        m.league = league.to_string();
        m
    }

    fn historical(id: &str, home: &str, away: &str, league: &str, score: Option<(u32, u32)>) -> Match {
        let mut m = fixture(id, home, away, league);
        m.is_historical = true;
        if let Some((h, a)) = score {
            m.home_score = Some(h);
            m.away_score = Some(a);
        }
        m
    }

    #[test]
    fn reversed_pairing_same_league_with_result_scores_4_8() {
        let target = fixture("t", "a", "b", "Ligue 1");
        let other = historical("h", "b", "a", "Ligue 1", Some((2, 1)));
        let score = similarity_score(&target, &other);
        assert!((score - 4.8).abs() < 1e-9);
    }

    #[test]
    fn empty_leagues_match_each_other() {
        let target = fixture("t", "a", "b", "");
        let other = historical("h", "x", "y", "", None);
        assert_eq!(similarity_score(&target, &other), 1.5);
    }

    #[test]
    fn ranks_historical_candidates_only() {
        let mut g = KnowledgeGraph::new();
        g.add_team(Team::new("a", "A"));
        g.add_team(Team::new("b", "B"));
        g.add_match(fixture("t", "a", "b", "L1"));
        g.add_match(historical("h1", "a", "c", "L2", None)); // 1.0
        g.add_match(historical("h2", "b", "a", "L1", Some((0, 0)))); // 4.8
        g.add_match(historical("h3", "x", "y", "L2", None)); // 0, dropped
        g.add_match(fixture("f", "a", "b", "L1")); // not historical
        g.add_match(historical("h4", "c", "a", "L2", None)); // 1.0, after h1

        let out = find_similar_matches(&g, "match:t", 5);
        let keys: Vec<_> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["match:h2", "match:h1", "match:h4"]);

        let top = find_similar_matches(&g, "match:t", 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, "match:h2");

        assert!(find_similar_matches(&g, "match:missing", 5).is_empty());
    }

    #[test]
    fn target_excluded_even_when_historical() {
        let mut g = KnowledgeGraph::new();
        g.add_match(historical("t", "a", "b", "L1", Some((1, 0))));
        assert!(find_similar_matches(&g, "match:t", 5).is_empty());
    }
}
