use serde::Serialize;

use crate::entities::{
    FormResult, Importance, InjuryStatus, Match, NodeKind, Player, ReasoningStep, Team, round_dp,
};

const HOME_ADVANTAGE: f64 = 0.4;
const RANKING_EDGE: f64 = 0.5;
const H2H_EDGE: f64 = 1.0;
const ABSENCE_PENALTY: f64 = 0.8;
const DECISIVE_DIFF: f64 = 1.5;
const DRAW_BAND: f64 = 0.5;
const KEY_FACTOR_WEIGHT: f64 = 0.6;
const MAX_KEY_FACTORS: usize = 5;
const H2H_SOURCE: &str = "graph:h2h";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormTier {
    Excellent,
    Good,
    Mixed,
    Terrible,
}

impl FormTier {
    pub fn score(self) -> f64 {
        match self {
            FormTier::Excellent => 2.0,
            FormTier::Good => 1.0,
            FormTier::Mixed => 0.0,
            FormTier::Terrible => -2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct H2hSummary {
    pub home_wins: u32,
    pub draws: u32,
    pub away_wins: u32,
    pub avg_goals: f64,
}

/// Facts derived while walking the graph. Synthesis reads nothing else.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Signals {
    pub home_form: Option<FormTier>,
    pub away_form: Option<FormTier>,
    pub home_ranking: Option<u32>,
    pub away_ranking: Option<u32>,
    pub h2h: Option<H2hSummary>,
    pub h2h_high_scoring: bool,
    pub home_key_absences: usize,
    pub away_key_absences: usize,
    pub cold_weather: bool,
    pub hot_weather: bool,
    pub rainy: bool,
    pub windy: bool,
}

impl Signals {
    fn set_form(&mut self, side: Side, tier: FormTier) {
        match side {
            Side::Home => self.home_form = Some(tier),
            Side::Away => self.away_form = Some(tier),
        }
    }

    fn set_ranking(&mut self, side: Side, ranking: u32) {
        match side {
            Side::Home => self.home_ranking = Some(ranking),
            Side::Away => self.away_ranking = Some(ranking),
        }
    }

    fn set_key_absences(&mut self, side: Side, count: usize) {
        match side {
            Side::Home => self.home_key_absences = count,
            Side::Away => self.away_key_absences = count,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReasoningContext {
    steps: Vec<ReasoningStep>,
    pub signals: Signals,
}

impl ReasoningContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, source_node: impl Into<String>, insight: impl Into<String>, weight: f64) {
        self.steps
            .push(ReasoningStep::new(source_node, insight, weight));
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<ReasoningStep> {
        self.steps
    }

    /// Mean step weight as a percentage; 50.0 when nothing was learned.
    pub fn overall_confidence(&self) -> f64 {
        if self.steps.is_empty() {
            return 50.0;
        }
        let mean = self.steps.iter().map(|s| s.weight).sum::<f64>() / self.steps.len() as f64;
        round_dp(mean * 100.0, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Home,
    Draw,
    Away,
}

impl Direction {
    pub fn selection(self) -> &'static str {
        match self {
            Direction::Home => "1",
            Direction::Draw => "N",
            Direction::Away => "2",
        }
    }

    pub fn from_diff(diff: f64) -> Self {
        if diff > DECISIVE_DIFF {
            Direction::Home
        } else if diff < -DECISIVE_DIFF {
            Direction::Away
        } else if diff.abs() < DRAW_BAND {
            Direction::Draw
        } else if diff > 0.0 {
            Direction::Home
        } else {
            Direction::Away
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Synthesis {
    pub direction: Direction,
    pub confidence: f64,
    pub home_score: f64,
    pub away_score: f64,
    pub key_factors: Vec<String>,
}

pub fn analyze_team_form(ctx: &mut ReasoningContext, team: &Team, side: Side) {
    let key = team.key();
    let name = &team.name;
    let role = side.label();

    if !team.form.is_empty() {
        let recent = &team.form[..team.form.len().min(5)];
        let wins = recent.iter().filter(|r| **r == FormResult::Win).count();
        let losses = recent.iter().filter(|r| **r == FormResult::Loss).count();
        let form = team.form_string(5);
        let played = recent.len();

        let (tier, insight, weight) = if wins >= 4 {
            (
                FormTier::Excellent,
                format!("{name} ({role}) in excellent form: {form} ({wins}/{played} wins)"),
                0.85,
            )
        } else if wins >= 3 {
            (
                FormTier::Good,
                format!("{name} ({role}) in good form: {form} ({wins}/{played} wins)"),
                0.7,
            )
        } else if losses >= 4 {
            (
                FormTier::Terrible,
                format!("{name} ({role}) in very poor form: {form} ({losses}/{played} losses)"),
                0.8,
            )
        } else {
            (
                FormTier::Mixed,
                format!("{name} ({role}) in mixed form: {form}"),
                0.4,
            )
        };
        ctx.add_step(&key, insight, weight);
        ctx.signals.set_form(side, tier);
    }

    if let Some(ranking) = team.ranking.filter(|r| *r > 0) {
        ctx.add_step(&key, format!("{name} ranked {ranking} in the league"), 0.3);
        ctx.signals.set_ranking(side, ranking);
    }

    if let Some(stats) = &team.stats {
        if stats.attack_rating > 75.0 {
            ctx.add_step(
                &key,
                format!("{name} strong attack (rating {}/100)", stats.attack_rating),
                0.6,
            );
        }
        if stats.defense_rating > 75.0 {
            ctx.add_step(
                &key,
                format!("{name} solid defence (rating {}/100)", stats.defense_rating),
                0.6,
            );
        }
    }
}

/// Tally past meetings from the point of view of today's home side.
pub fn analyze_h2h(ctx: &mut ReasoningContext, matches: &[Match], home_team_id: &str) {
    if matches.is_empty() {
        ctx.add_step(H2H_SOURCE, "No head-to-head history found", 0.2);
        return;
    }

    let mut summary = H2hSummary::default();
    let mut total_goals = 0u64;
    for m in matches {
        let Some((hs, aws)) = m.score() else {
            continue;
        };
        total_goals += u64::from(hs) + u64::from(aws);
        let (ours, theirs) = if m.home_team_id == home_team_id {
            (hs, aws)
        } else {
            (aws, hs)
        };
        if ours > theirs {
            summary.home_wins += 1;
        } else if ours < theirs {
            summary.away_wins += 1;
        } else {
            summary.draws += 1;
        }
    }

    let total = summary.home_wins + summary.draws + summary.away_wins;
    if total == 0 {
        return;
    }
    summary.avg_goals = round_dp(total_goals as f64 / total as f64, 1);

    ctx.add_step(
        H2H_SOURCE,
        format!(
            "H2H ({total} matches): {}W-{}D-{}L, avg {} goals/match",
            summary.home_wins, summary.draws, summary.away_wins, summary.avg_goals
        ),
        0.7,
    );
    if summary.avg_goals > 2.5 {
        ctx.add_step(
            H2H_SOURCE,
            format!("Meetings tend to be high scoring ({}/match)", summary.avg_goals),
            0.6,
        );
        ctx.signals.h2h_high_scoring = true;
    }
    ctx.signals.h2h = Some(summary);
}

pub fn analyze_players(ctx: &mut ReasoningContext, players: &[Player], team_name: &str, side: Side) {
    let Some(first) = players.first() else {
        return;
    };
    let source = first.team_key();

    let key_absent: Vec<&Player> = players
        .iter()
        .filter(|p| p.importance == Importance::High)
        .filter(|p| matches!(p.injury_status, InjuryStatus::Out | InjuryStatus::Suspended))
        .collect();
    let doubtful: Vec<&Player> = players
        .iter()
        .filter(|p| p.importance == Importance::High)
        .filter(|p| p.injury_status == InjuryStatus::Doubtful)
        .collect();

    if !key_absent.is_empty() {
        ctx.add_step(
            &source,
            format!("{team_name}: key absences: {}", join_names(&key_absent)),
            0.75,
        );
        ctx.signals.set_key_absences(side, key_absent.len());
    }
    if !doubtful.is_empty() {
        ctx.add_step(
            &source,
            format!("{team_name}: doubtful starters: {}", join_names(&doubtful)),
            0.4,
        );
    }
}

fn join_names(players: &[&Player]) -> String {
    players
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn analyze_venue_weather(ctx: &mut ReasoningContext, fixture: &Match) {
    let Some(venue) = &fixture.venue else {
        return;
    };
    let source = NodeKind::Match.key(&fixture.id);

    if let (Some(stadium), Some(city)) = (&venue.stadium, &venue.city) {
        ctx.add_step(&source, format!("Venue: {stadium}, {city}"), 0.2);
    }

    if let Some(temp) = venue.temperature_c {
        if temp < 5.0 {
            ctx.add_step(&source, format!("Cold conditions ({temp}°C) may affect play"), 0.4);
            ctx.signals.cold_weather = true;
        } else if temp > 32.0 {
            ctx.add_step(&source, format!("Extreme heat ({temp}°C), fatigue risk"), 0.4);
            ctx.signals.hot_weather = true;
        }
    }

    if let Some(rain) = venue.rain_chance_pct.filter(|r| *r > 60.0) {
        ctx.add_step(&source, format!("High chance of rain ({rain}%), slippery pitch"), 0.5);
        ctx.signals.rainy = true;
    }

    if let Some(wind) = venue.wind_kph.filter(|w| *w > 40.0) {
        ctx.add_step(&source, format!("Strong wind ({wind} km/h) disrupts long balls"), 0.4);
        ctx.signals.windy = true;
    }
}

pub fn score_signals(signals: &Signals) -> (f64, f64) {
    let mut home = signals.home_form.map_or(0.0, FormTier::score);
    let mut away = signals.away_form.map_or(0.0, FormTier::score);

    if let (Some(hr), Some(ar)) = (signals.home_ranking, signals.away_ranking) {
        if hr < ar {
            home += RANKING_EDGE;
        } else if ar < hr {
            away += RANKING_EDGE;
        }
    }

    if let Some(h2h) = &signals.h2h {
        if h2h.home_wins > h2h.away_wins {
            home += H2H_EDGE;
        } else if h2h.away_wins > h2h.home_wins {
            away += H2H_EDGE;
        }
    }

    home -= signals.home_key_absences as f64 * ABSENCE_PENALTY;
    away -= signals.away_key_absences as f64 * ABSENCE_PENALTY;

    home += HOME_ADVANTAGE;
    (home, away)
}

pub fn synthesize(ctx: &ReasoningContext) -> Synthesis {
    let (home, away) = score_signals(&ctx.signals);
    let key_factors = ctx
        .steps()
        .iter()
        .filter(|s| s.weight >= KEY_FACTOR_WEIGHT)
        .take(MAX_KEY_FACTORS)
        .map(|s| s.insight.clone())
        .collect();

    Synthesis {
        direction: Direction::from_diff(home - away),
        confidence: ctx.overall_confidence(),
        home_score: round_dp(home, 2),
        away_score: round_dp(away, 2),
        key_factors,
    }
}
