use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::models::{Category, ImpactLevel, NewsItem, Severity};
use crate::retry::with_retry;

const NEWS_URL: &str = "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/news";
const INJURIES_URL: &str = "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/injuries";
const NEWS_LIMIT: u32 = 20;
const SUMMARY_CHARS: usize = 200;

pub const NEWS_SOURCE: &str = "espn";
pub const INJURY_SOURCE: &str = "espn_injuries";

/// Fantasy categories an injury plausibly affects, attached to every injury item.
const AFFECTED_STATS: [&str; 6] = ["minutes", "points", "rebounds", "assists", "steals", "blocks"];

// ESPN news feed payload, fields we care about only.

#[derive(Debug, Deserialize)]
struct NewsFeed {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Default, Deserialize)]
struct Article {
    #[serde(default)]
    headline: String,
    description: Option<String>,
    byline: Option<String>,
    published: Option<String>,
    links: Option<ArticleLinks>,
}

#[derive(Debug, Deserialize)]
struct ArticleLinks {
    web: Option<WebLink>,
}

#[derive(Debug, Deserialize)]
struct WebLink {
    href: Option<String>,
}

// ESPN injuries feed payload: one entry per team, each with its injury list.

#[derive(Debug, Deserialize)]
struct InjuryFeed {
    #[serde(default)]
    injuries: Vec<TeamInjuries>,
}

#[derive(Debug, Default, Deserialize)]
struct TeamInjuries {
    #[serde(default)]
    abbreviation: String,
    #[serde(default)]
    injuries: Vec<InjuryRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct InjuryRecord {
    #[serde(default)]
    status: String,
    #[serde(rename = "shortComment")]
    short_comment: Option<String>,
    #[serde(rename = "longComment")]
    long_comment: Option<String>,
    date: Option<String>,
    athlete: Option<Athlete>,
    details: Option<InjuryDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct Athlete {
    // ESPN serves athlete ids as numbers in some responses and strings in others
    id: Option<serde_json::Value>,
    #[serde(rename = "displayName", default)]
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct InjuryDetails {
    #[serde(rename = "type")]
    kind: Option<String>,
    detail: Option<String>,
    location: Option<String>,
    #[serde(rename = "returnDate")]
    return_date: Option<String>,
    #[serde(rename = "fantasyStatus")]
    fantasy_status: Option<FantasyStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct FantasyStatus {
    description: Option<String>,
}

pub struct EspnClient {
    http: Client,
    news_url: String,
    injuries_url: String,
}

impl EspnClient {
    pub fn new(http: Client) -> Self {
        EspnClient {
            http,
            news_url: NEWS_URL.to_string(),
            injuries_url: INJURIES_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_urls(http: Client, news_url: &str, injuries_url: &str) -> Self {
        EspnClient {
            http,
            news_url: news_url.to_string(),
            injuries_url: injuries_url.to_string(),
        }
    }

    /// Fetch general NBA news. Retries on failure; returns an empty list once
    /// retries are exhausted so one dead source never sinks the whole run.
    pub async fn fetch_news(&self) -> Vec<NewsItem> {
        match with_retry("ESPN news fetch", || self.fetch_news_once()).await {
            Ok(items) => items,
            Err(e) => {
                error!("Error fetching ESPN news: {e:#}");
                Vec::new()
            }
        }
    }

    async fn fetch_news_once(&self) -> Result<Vec<NewsItem>> {
        info!("Fetching news from ESPN...");
        let feed: NewsFeed = self
            .http
            .get(&self.news_url)
            .query(&[("limit", NEWS_LIMIT)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Malformed ESPN news payload")?;

        let items = news_items_from_feed(feed);
        info!("Fetched {} items from ESPN", items.len());
        Ok(items)
    }

    /// Fetch the league-wide injury report. Same retry/swallow contract as `fetch_news`.
    pub async fn fetch_injuries(&self) -> Vec<NewsItem> {
        match with_retry("ESPN injuries fetch", || self.fetch_injuries_once()).await {
            Ok(items) => items,
            Err(e) => {
                error!("Error fetching ESPN injury data: {e:#}");
                Vec::new()
            }
        }
    }

    async fn fetch_injuries_once(&self) -> Result<Vec<NewsItem>> {
        info!("Fetching injury data from ESPN...");
        let feed: InjuryFeed = self
            .http
            .get(&self.injuries_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Malformed ESPN injuries payload")?;

        let items = injury_items_from_feed(feed);
        info!("Fetched {} injury items from ESPN", items.len());
        Ok(items)
    }
}

fn news_items_from_feed(feed: NewsFeed) -> Vec<NewsItem> {
    let mut items = Vec::new();

    for article in feed.articles {
        let Some(published_at) = parse_timestamp(article.published.as_deref()) else {
            warn!(
                "Skipping ESPN article with unparseable publish time: {}",
                article.headline
            );
            continue;
        };

        let mut item = NewsItem::new(article.headline, NEWS_SOURCE, published_at);
        item.summary = article.description.as_deref().map(summarize);
        item.content = article.description;
        item.author = article.byline;
        item.source_url = article
            .links
            .and_then(|l| l.web)
            .and_then(|w| w.href)
            .and_then(|href| Url::parse(&href).ok());

        items.push(item);
    }

    items
}

fn injury_items_from_feed(feed: InjuryFeed) -> Vec<NewsItem> {
    let mut items = Vec::new();

    for team in feed.injuries {
        for injury in team.injuries {
            let Some(published_at) = parse_timestamp(injury.date.as_deref()) else {
                warn!(
                    "Skipping {} injury record with unparseable date",
                    team.abbreviation
                );
                continue;
            };

            let athlete = injury.athlete.unwrap_or_default();
            let player_name = athlete.display_name;
            let player_id = athlete.id.as_ref().and_then(id_string);

            let details = injury.details.unwrap_or_default();
            let fantasy_status = details
                .fantasy_status
                .and_then(|f| f.description)
                .unwrap_or_default();

            let mut item = NewsItem::new(
                format!("{player_name} Injury Update: {}", injury.status),
                INJURY_SOURCE,
                published_at,
            );
            item.category = Category::Injury;
            item.team = Some(team.abbreviation.clone()).filter(|t| !t.is_empty());
            item.summary = injury.short_comment.clone();
            item.content = injury.long_comment.or(injury.short_comment);
            item.status = Some(injury.status.to_lowercase()).filter(|s| !s.is_empty());
            item.source_url = player_id.as_deref().and_then(|id| player_page_url(id, &player_name));
            item.tags = [details.kind.as_deref(), details.location.as_deref(), details.detail.as_deref()]
                .into_iter()
                .flatten()
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            item.affected_stats = AFFECTED_STATS.iter().map(|s| s.to_string()).collect();

            let (severity, impact) = classify_status(&injury.status, &fantasy_status);
            item.severity = Some(severity);
            item.impact_level = impact;

            if let Some(return_date) = details.return_date.as_deref() {
                if NaiveDate::parse_from_str(return_date, "%Y-%m-%d").is_ok() {
                    item.expected_return_date = Some(return_date.to_string());
                } else {
                    debug!("Could not parse return date: {return_date}");
                }
            }

            if !player_name.is_empty() {
                // the note quotes the feed's return date as-is, parseable or not
                item.fantasy_impact_note = Some(injury_note(
                    &player_name,
                    &injury.status,
                    details.kind.as_deref(),
                    details.detail.as_deref(),
                    details.return_date.as_deref().filter(|d| !d.is_empty()),
                ));
            }

            item.player_name = Some(player_name).filter(|p| !p.is_empty());
            item.player_id = player_id;

            items.push(item);
        }
    }

    items
}

/// Map a status string (plus ESPN's fantasy status blurb) to severity and
/// fantasy impact. "season" always wins, no matter what else the string
/// contains, so "Out For Season" classifies as season-ending.
pub fn classify_status(status: &str, fantasy_status: &str) -> (Severity, ImpactLevel) {
    let status = status.to_lowercase();
    let fantasy = fantasy_status.to_lowercase();

    if status.contains("season") || fantasy.contains("season") {
        (Severity::SeasonEnding, ImpactLevel::Critical)
    } else if status.contains("day-to-day") || status.contains("dtd") || fantasy.contains("questionable") {
        (Severity::Minor, ImpactLevel::Low)
    } else if status.contains("out") || fantasy.contains("out") {
        (Severity::Moderate, ImpactLevel::High)
    } else if fantasy.contains("doubtful") {
        (Severity::Moderate, ImpactLevel::High)
    } else {
        (Severity::Minor, ImpactLevel::Medium)
    }
}

/// Build the human-readable fantasy note for an injury record.
pub fn injury_note(
    player: &str,
    status: &str,
    injury_type: Option<&str>,
    injury_detail: Option<&str>,
    return_date: Option<&str>,
) -> String {
    let status_lower = status.to_lowercase();
    let mut note = format!("{player} is currently {status_lower}");

    if let Some(kind) = injury_type.filter(|k| !k.is_empty()) {
        note.push_str(&format!(" with a {kind}"));
    }
    if let Some(detail) = injury_detail.filter(|d| !d.is_empty()) {
        note.push_str(&format!(" ({detail})"));
    }

    if status_lower.contains("day-to-day") {
        note.push_str(". Monitor their status closely as they could return any day.");
    } else if status_lower.contains("out") {
        note.push_str(". Consider benching them in fantasy lineups until further notice.");
    } else if status_lower.contains("season") {
        note.push_str(". Season-ending injury - safe to drop in most fantasy leagues.");
    }

    if let Some(date) = return_date {
        note.push_str(&format!(" Expected return: {date}."));
    }

    note
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw?.parse::<DateTime<Utc>>().ok()
}

fn summarize(content: &str) -> String {
    if content.chars().count() > SUMMARY_CHARS {
        let cut: String = content.chars().take(SUMMARY_CHARS).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}

fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn player_page_url(player_id: &str, player_name: &str) -> Option<Url> {
    let slug = player_name.to_lowercase().replace(' ', "-");
    Url::parse(&format!(
        "https://www.espn.com/nba/player/_/id/{player_id}/{slug}"
    ))
    .ok()
}
