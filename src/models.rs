use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

/// News classification assigned either by the injury feed directly or by AI analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Injury,
    Trade,
    Suspension,
    Performance,
    Roster,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Injury => "injury",
            Category::Trade => "trade",
            Category::Suspension => "suspension",
            Category::Performance => "performance",
            Category::Roster => "roster",
            Category::Other => "other",
        }
    }

    /// Unknown strings fall back to `Other`, matching the column default.
    pub fn parse(s: &str) -> Self {
        match s {
            "injury" => Category::Injury,
            "trade" => Category::Trade,
            "suspension" => Category::Suspension,
            "performance" => Category::Performance,
            "roster" => Category::Roster,
            _ => Category::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
    SeasonEnding,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::SeasonEnding => "season_ending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minor" => Some(Severity::Minor),
            "moderate" => Some(Severity::Moderate),
            "severe" => Some(Severity::Severe),
            "season_ending" => Some(Severity::SeasonEnding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
            ImpactLevel::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "medium" => ImpactLevel::Medium,
            "high" => ImpactLevel::High,
            "critical" => ImpactLevel::Critical,
            _ => ImpactLevel::Low,
        }
    }
}

/// One ingested news or injury record. (title, published_at) is its identity.
#[derive(Debug, Clone)]
pub struct NewsItem {
    pub player_name: Option<String>,
    pub player_id: Option<String>,
    pub team: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub category: Category,
    pub severity: Option<Severity>,
    pub impact_level: ImpactLevel,
    pub status: Option<String>,
    pub expected_return_date: Option<String>,
    pub games_missed: Option<i64>,
    pub source: String,
    pub source_url: Option<Url>,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub affected_stats: Vec<String>,
    pub fantasy_impact_note: Option<String>,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        NewsItem {
            player_name: None,
            player_id: None,
            team: None,
            title: title.into(),
            content: None,
            summary: None,
            category: Category::Other,
            severity: None,
            impact_level: ImpactLevel::Low,
            status: None,
            expected_return_date: None,
            games_missed: None,
            source: source.into(),
            source_url: None,
            author: None,
            published_at,
            tags: Vec::new(),
            affected_stats: Vec::new(),
            fantasy_impact_note: None,
        }
    }
}
