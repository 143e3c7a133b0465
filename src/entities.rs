use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EntityError;

pub const MAX_FORM_LEN: usize = 10;

/// Node type tag. Doubles as the prefix of every entity key (`team:133604`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Team,
    Player,
    Match,
    Tip,
    // Endpoint of an edge whose entity has not been ingested yet.
    Unknown,
}

impl NodeKind {
    pub fn prefix(self) -> &'static str {
        match self {
            NodeKind::Team => "team",
            NodeKind::Player => "player",
            NodeKind::Match => "match",
            NodeKind::Tip => "tip",
            NodeKind::Unknown => "unknown",
        }
    }

    pub fn key(self, id: &str) -> String {
        format!("{}:{id}", self.prefix())
    }
}

/// Split an entity key into its kind and external id.
pub fn parse_key(key: &str) -> Option<(NodeKind, &str)> {
    let (prefix, id) = key.split_once(':')?;
    let kind = match prefix {
        "team" => NodeKind::Team,
        "player" => NodeKind::Player,
        "match" => NodeKind::Match,
        "tip" => NodeKind::Tip,
        _ => return None,
    };
    if id.is_empty() {
        return None;
    }
    Some((kind, id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormResult {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "L")]
    Loss,
}

impl FormResult {
    pub fn points(self) -> f64 {
        match self {
            FormResult::Win => 3.0,
            FormResult::Draw => 1.0,
            FormResult::Loss => 0.0,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            FormResult::Win => 'W',
            FormResult::Draw => 'D',
            FormResult::Loss => 'L',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjuryStatus {
    #[default]
    Fit,
    Doubtful,
    Out,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Importance {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipOutcome {
    #[default]
    Pending,
    Won,
    Lost,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Rainy,
    Snowy,
    Windy,
    Stormy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    HomeWin,
    AwayWin,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub attack_rating: f64,
    pub defense_rating: f64,
    pub goals_scored_avg: f64,
    pub goals_conceded_avg: f64,
    pub possession_avg: f64,
    #[serde(default)]
    pub xg_for: f64,
    #[serde(default)]
    pub xg_against: f64,
}

impl TeamStats {
    fn validate(&self) -> Result<(), EntityError> {
        check_range("attack_rating", self.attack_rating, 0.0, 100.0)?;
        check_range("defense_rating", self.defense_rating, 0.0, 100.0)?;
        check_range("possession_avg", self.possession_avg, 0.0, 100.0)?;
        check_min("goals_scored_avg", self.goals_scored_avg, 0.0)?;
        check_min("goals_conceded_avg", self.goals_conceded_avg, 0.0)?;
        check_min("xg_for", self.xg_for, 0.0)?;
        check_min("xg_against", self.xg_against, 0.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub league: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub stadium: Option<String>,
    #[serde(default)]
    pub stadium_capacity: Option<u32>,
    #[serde(default)]
    pub badge_url: Option<String>,
    /// Most recent result first.
    #[serde(default)]
    pub form: Vec<FormResult>,
    #[serde(default)]
    pub ranking: Option<u32>,
    #[serde(default)]
    pub points: Option<i32>,
    #[serde(default)]
    pub stats: Option<TeamStats>,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            short_name: None,
            league: String::new(),
            country: String::new(),
            stadium: None,
            stadium_capacity: None,
            badge_url: None,
            form: Vec::new(),
            ranking: None,
            points: None,
            stats: None,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, EntityError> {
        let team: Team = decode("team", value)?;
        team.validate()?;
        Ok(team)
    }

    pub fn validate(&self) -> Result<(), EntityError> {
        check_not_empty("id", &self.id)?;
        check_not_empty("name", &self.name)?;
        if self.form.len() > MAX_FORM_LEN {
            return Err(EntityError::FormTooLong {
                len: self.form.len(),
            });
        }
        if let Some(stats) = &self.stats {
            stats.validate()?;
        }
        Ok(())
    }

    pub fn key(&self) -> String {
        NodeKind::Team.key(&self.id)
    }

    /// Recency-weighted form on a 0-100 scale; 50.0 with no history.
    pub fn form_score(&self) -> f64 {
        if self.form.is_empty() {
            return 50.0;
        }
        let n = self.form.len();
        let mut total = 0.0;
        let mut max_total = 0.0;
        for (i, result) in self.form.iter().enumerate() {
            let weight = 1.0 + 0.3 * (n - 1 - i) as f64;
            total += result.points() * weight;
            max_total += FormResult::Win.points() * weight;
        }
        if max_total <= 0.0 {
            return 50.0;
        }
        round_dp(total / max_total * 100.0, 1)
    }

    pub fn form_string(&self, n: usize) -> String {
        self.form.iter().take(n).map(|r| r.as_char()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerPerformance {
    #[serde(default)]
    pub goals: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default)]
    pub minutes_played: u32,
    #[serde(default)]
    pub matches_played: u32,
    #[serde(default)]
    pub yellow_cards: u32,
    #[serde(default)]
    pub red_cards: u32,
    #[serde(default)]
    pub rating_avg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub team_id: String,
    /// GK, DEF, MID or FWD.
    pub position: String,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub injury_status: InjuryStatus,
    #[serde(default)]
    pub injury_detail: Option<String>,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub performance: Option<PlayerPerformance>,
}

impl Player {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        team_id: impl Into<String>,
        position: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            team_id: team_id.into(),
            position: position.into(),
            nationality: None,
            age: None,
            injury_status: InjuryStatus::Fit,
            injury_detail: None,
            importance: Importance::Medium,
            performance: None,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, EntityError> {
        let player: Player = decode("player", value)?;
        player.validate()?;
        Ok(player)
    }

    pub fn validate(&self) -> Result<(), EntityError> {
        check_not_empty("id", &self.id)?;
        check_not_empty("name", &self.name)?;
        check_not_empty("team_id", &self.team_id)?;
        if let Some(rating) = self.performance.as_ref().and_then(|p| p.rating_avg) {
            check_range("rating_avg", rating, 0.0, 10.0)?;
        }
        Ok(())
    }

    pub fn key(&self) -> String {
        NodeKind::Player.key(&self.id)
    }

    pub fn team_key(&self) -> String {
        NodeKind::Team.key(&self.team_id)
    }

    pub fn is_available(&self) -> bool {
        self.injury_status == InjuryStatus::Fit
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchVenue {
    #[serde(default)]
    pub stadium: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub weather: Option<WeatherCondition>,
    #[serde(default)]
    pub wind_kph: Option<f64>,
    #[serde(default)]
    pub humidity_pct: Option<f64>,
    #[serde(default)]
    pub rain_chance_pct: Option<f64>,
}

impl MatchVenue {
    fn validate(&self) -> Result<(), EntityError> {
        if let Some(lat) = self.latitude {
            check_range("latitude", lat, -90.0, 90.0)?;
        }
        if let Some(lon) = self.longitude {
            check_range("longitude", lon, -180.0, 180.0)?;
        }
        if let Some(wind) = self.wind_kph {
            check_min("wind_kph", wind, 0.0)?;
        }
        if let Some(humidity) = self.humidity_pct {
            check_range("humidity_pct", humidity, 0.0, 100.0)?;
        }
        if let Some(rain) = self.rain_chance_pct {
            check_range("rain_chance_pct", rain, 0.0, 100.0)?;
        }
        Ok(())
    }
}

/// Bookmaker decimal odds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOdds {
    #[serde(default)]
    pub home_win: Option<f64>,
    #[serde(default)]
    pub draw: Option<f64>,
    #[serde(default)]
    pub away_win: Option<f64>,
    #[serde(default)]
    pub over_2_5: Option<f64>,
    #[serde(default)]
    pub btts_yes: Option<f64>,
}

impl MatchOdds {
    /// Price for a 1X2 selection code.
    pub fn for_selection(&self, selection: &str) -> Option<f64> {
        match selection {
            "1" => self.home_win,
            "N" | "X" => self.draw,
            "2" => self.away_win,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub home_team_id: String,
    pub away_team_id: String,
    #[serde(default)]
    pub league: String,
    pub match_date: NaiveDate,
    /// HH:MM
    #[serde(default)]
    pub kick_off: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub venue: Option<MatchVenue>,
    #[serde(default)]
    pub odds: Option<MatchOdds>,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    #[serde(default)]
    pub is_historical: bool,
}

fn default_status() -> String {
    "NS".to_string()
}

impl Match {
    pub fn new(
        id: impl Into<String>,
        home_team_id: impl Into<String>,
        away_team_id: impl Into<String>,
        match_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            home_team_id: home_team_id.into(),
            away_team_id: away_team_id.into(),
            league: String::new(),
            match_date,
            kick_off: None,
            status: default_status(),
            venue: None,
            odds: None,
            home_score: None,
            away_score: None,
            is_historical: false,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, EntityError> {
        let m: Match = decode("match", value)?;
        m.validate()?;
        Ok(m)
    }

    pub fn validate(&self) -> Result<(), EntityError> {
        check_not_empty("id", &self.id)?;
        check_not_empty("home_team_id", &self.home_team_id)?;
        check_not_empty("away_team_id", &self.away_team_id)?;
        if let Some(venue) = &self.venue {
            venue.validate()?;
        }
        Ok(())
    }

    pub fn key(&self) -> String {
        NodeKind::Match.key(&self.id)
    }

    pub fn home_team_key(&self) -> String {
        NodeKind::Team.key(&self.home_team_id)
    }

    pub fn away_team_key(&self) -> String {
        NodeKind::Team.key(&self.away_team_id)
    }

    pub fn score(&self) -> Option<(u32, u32)> {
        Some((self.home_score?, self.away_score?))
    }

    pub fn is_finished(&self) -> bool {
        self.score().is_some()
    }

    pub fn result(&self) -> Option<MatchResult> {
        let (home, away) = self.score()?;
        Some(if home > away {
            MatchResult::HomeWin
        } else if home < away {
            MatchResult::AwayWin
        } else {
            MatchResult::Draw
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub source_node: String,
    pub insight: String,
    pub weight: f64,
}

impl ReasoningStep {
    /// Weight is clamped to [0, 1].
    pub fn new(source_node: impl Into<String>, insight: impl Into<String>, weight: f64) -> Self {
        Self {
            source_node: source_node.into(),
            insight: insight.into(),
            weight: weight.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub match_id: String,
    /// 1X2, BTTS, Over/Under 2.5...
    pub market: String,
    pub selection: String,
    pub confidence: f64,
    #[serde(default)]
    pub odds_estimated: Option<f64>,
    /// probability * odds - 1
    #[serde(default)]
    pub ev_score: Option<f64>,
    #[serde(default)]
    pub reasoning_path: Vec<ReasoningStep>,
    #[serde(default)]
    pub outcome: TipOutcome,
    #[serde(default = "now_utc")]
    pub created_at: DateTime<Utc>,
}

fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

impl Tip {
    pub fn from_value(value: &Value) -> Result<Self, EntityError> {
        let tip: Tip = decode("tip", value)?;
        tip.validate()?;
        Ok(tip)
    }

    pub fn validate(&self) -> Result<(), EntityError> {
        check_not_empty("match_id", &self.match_id)?;
        check_not_empty("market", &self.market)?;
        check_not_empty("selection", &self.selection)?;
        check_range("confidence", self.confidence, 0.0, 100.0)?;
        for step in &self.reasoning_path {
            check_range("weight", step.weight, 0.0, 1.0)?;
        }
        Ok(())
    }

    pub fn key(&self) -> String {
        NodeKind::Tip.key(&format!("{}_{}", self.match_id, self.market))
    }

    pub fn match_key(&self) -> String {
        NodeKind::Match.key(&self.match_id)
    }

    pub fn reasoning_summary(&self) -> String {
        if self.reasoning_path.is_empty() {
            return "No reasoning path available.".to_string();
        }
        let lines = self
            .reasoning_path
            .iter()
            .map(|s| format!("  [{:.0}%] {}", s.weight * 100.0, s.insight))
            .collect::<Vec<_>>();
        format!("Reasoning ({} steps):\n{}", lines.len(), lines.join("\n"))
    }
}

/// W/D/L sequence for `team_id` from a most-recent-first match list.
/// Looks at the first five entries and skips matches without a score.
pub fn extract_form(history: &[Match], team_id: &str) -> Vec<FormResult> {
    let mut form = Vec::new();
    for m in history.iter().take(5) {
        let Some((home, away)) = m.score() else {
            continue;
        };
        let (ours, theirs) = if m.home_team_id == team_id {
            (home, away)
        } else {
            (away, home)
        };
        form.push(if ours > theirs {
            FormResult::Win
        } else if ours < theirs {
            FormResult::Loss
        } else {
            FormResult::Draw
        });
    }
    form
}

pub(crate) fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

fn decode<T: DeserializeOwned>(entity: &'static str, value: &Value) -> Result<T, EntityError> {
    T::deserialize(value).map_err(|err| EntityError::Malformed {
        entity,
        reason: err.to_string(),
    })
}

fn check_not_empty(field: &'static str, value: &str) -> Result<(), EntityError> {
    if value.trim().is_empty() {
        return Err(EntityError::EmptyField { field });
    }
    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), EntityError> {
    if !(min..=max).contains(&value) {
        return Err(EntityError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_min(field: &'static str, value: f64, min: f64) -> Result<(), EntityError> {
    check_range(field, value, min, f64::MAX)
}
