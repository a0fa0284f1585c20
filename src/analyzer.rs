use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use log::{debug, error};
use serde::Deserialize;
use tokio::time::Duration;

use crate::config::Config;
use crate::models::{Category, ImpactLevel, NewsItem, Severity};

const API_TIMEOUT: Duration = Duration::from_secs(60);

const EXTRACT_SYSTEM_PROMPT: &str =
    "You are an expert NBA analyst. Extract player information from news text and return valid JSON.";

const ANALYZE_SYSTEM_PROMPT: &str =
    "You are an expert NBA fantasy analyst. Analyze news and return valid JSON.";

/// Player identity pulled out of free text. `found == false` means no
/// specific player could be determined.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerInfo {
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub found: bool,
}

/// Structured classification returned by the second prompt.
#[derive(Debug, Deserialize)]
struct Analysis {
    #[serde(default)]
    category: Category,
    #[serde(default)]
    severity: Option<Severity>,
    #[serde(default)]
    impact_level: ImpactLevel,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    expected_return_date: Option<String>,
    #[serde(default)]
    games_missed: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    affected_stats: Vec<String>,
    #[serde(default)]
    fantasy_impact_note: Option<String>,
}

/// Free-text enrichment seam. Implementations must be side-effect-free beyond
/// mutating the passed item, must not retry, and must never fail loudly: any
/// API or parse problem degrades to "no player found" / item left as-is.
#[async_trait]
pub trait NewsAnalyst: Send + Sync {
    async fn extract_player_info(&self, title: &str, content: Option<&str>) -> PlayerInfo;

    async fn analyze(&self, item: &mut NewsItem);
}

pub struct OpenAiAnalyst {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAnalyst {
    pub fn new(cfg: &Config) -> Self {
        let openai_config = OpenAIConfig::default().with_api_key(&cfg.openai_api_key);
        OpenAiAnalyst {
            client: Client::with_config(openai_config),
            model: cfg.model.clone(),
        }
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(system_prompt).into(),
                ChatCompletionRequestUserMessage::from(user_prompt).into(),
            ])
            .temperature(temperature)
            .max_tokens(max_tokens)
            .build()
            .context("Failed to build OpenAI request")?;

        let response = tokio::time::timeout(API_TIMEOUT, self.client.chat().create(request))
            .await
            .map_err(|_| anyhow::anyhow!("OpenAI call timed out after {API_TIMEOUT:?}"))?
            .context("OpenAI API error")?;

        for choice in response.choices {
            if let Some(content) = choice.message.content {
                if !content.trim().is_empty() {
                    return Ok(content);
                }
            }
        }

        anyhow::bail!("Empty response from OpenAI")
    }
}

#[async_trait]
impl NewsAnalyst for OpenAiAnalyst {
    async fn extract_player_info(&self, title: &str, content: Option<&str>) -> PlayerInfo {
        let user_prompt = format!(
            r#"Extract NBA player information from this news headline and content. Return null if no specific player is mentioned.

Headline: {title}
Content: {content}

Look for player names and try to match them to NBA players. Also try to extract team information if mentioned.

Return ONLY valid JSON with:
- player_name: The NBA player name if found (null if none)
- player_id: Player ID if determinable (null if none)
- team: Team abbreviation if mentioned (null if none)
- found: Boolean indicating if a specific player was found

Do not include any text before or after the JSON. Only return the JSON object."#,
            content = content.unwrap_or("")
        );

        match self.complete(EXTRACT_SYSTEM_PROMPT, user_prompt, 0.1, 200).await {
            Ok(raw) => {
                debug!("OpenAI response for '{}': {raw}", excerpt(title));
                match parse_player_info(&raw) {
                    Ok(info) => info,
                    Err(e) => {
                        error!(
                            "Failed to parse player info for '{}': {e:#}; response was: {raw}",
                            excerpt(title)
                        );
                        PlayerInfo::default()
                    }
                }
            }
            Err(e) => {
                error!("Error extracting player info for '{}': {e:#}", excerpt(title));
                PlayerInfo::default()
            }
        }
    }

    async fn analyze(&self, item: &mut NewsItem) {
        let user_prompt = format!(
            r#"Analyze this NBA news item and categorize it for fantasy basketball impact.

Title: {title}
Content: {content}
Player: {player}

Categorize this news as one of: injury, trade, suspension, performance, roster, other
If it's an injury, determine severity: minor, moderate, severe, season_ending
Assess fantasy impact: low, medium, high, critical
If it's an injury, estimate games missed and expected return timeline.
Generate a fantasy impact note explaining how this affects the player's fantasy value.

Return ONLY valid JSON with:
- category: one of injury, trade, suspension, performance, roster, other
- severity: one of minor, moderate, severe, season_ending (for injuries)
- impact_level: one of low, medium, high, critical
- status: one of active, resolved, monitoring (for injuries)
- expected_return_date: YYYY-MM-DD format or null
- games_missed: number or null
- tags: array of relevant tags
- affected_stats: array of fantasy stats that might be affected
- fantasy_impact_note: detailed analysis of fantasy impact

Do not include any text before or after the JSON. Only return the JSON object."#,
            title = item.title,
            content = item.content.as_deref().unwrap_or(""),
            player = item.player_name.as_deref().unwrap_or("Unknown"),
        );

        match self.complete(ANALYZE_SYSTEM_PROMPT, user_prompt, 0.2, 500).await {
            Ok(raw) => {
                debug!("OpenAI response for '{}': {raw}", excerpt(&item.title));
                match parse_analysis(&raw) {
                    Ok(analysis) => apply_analysis(item, analysis),
                    Err(e) => {
                        error!(
                            "Failed to parse analysis for '{}': {e:#}; response was: {raw}",
                            excerpt(&item.title)
                        );
                    }
                }
            }
            Err(e) => {
                error!("Error categorizing news '{}': {e:#}", excerpt(&item.title));
            }
        }
    }
}

/// Models are told to return bare JSON but still like to wrap it in a fenced
/// code block. Strip the fence before handing the payload to serde.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("```json").unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix("```").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

fn parse_player_info(raw: &str) -> Result<PlayerInfo> {
    serde_json::from_str(strip_code_fence(raw)).context("Invalid player info JSON")
}

fn parse_analysis(raw: &str) -> Result<Analysis> {
    serde_json::from_str(strip_code_fence(raw)).context("Invalid analysis JSON")
}

fn apply_analysis(item: &mut NewsItem, analysis: Analysis) {
    item.category = analysis.category;
    item.severity = analysis.severity;
    item.impact_level = analysis.impact_level;
    item.status = analysis.status;
    item.expected_return_date = analysis.expected_return_date;
    item.games_missed = analysis.games_missed;
    item.tags = analysis.tags;
    item.affected_stats = analysis.affected_stats;
    item.fantasy_impact_note = analysis.fantasy_impact_note;
}

fn excerpt(s: &str) -> String {
    s.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn strips_fenced_json() {
        let fenced = "```json\n{\"found\": true}\n```";
        assert_eq!(strip_code_fence(fenced), "{\"found\": true}");

        let plain_fence = "```\n{}\n```";
        assert_eq!(strip_code_fence(plain_fence), "{}");

        let bare = "  {\"found\": false} ";
        assert_eq!(strip_code_fence(bare), "{\"found\": false}");
    }

    #[test]
    fn parses_player_info_with_missing_fields() {
        let info = parse_player_info(r#"{"found": true, "player_name": "Luka Doncic"}"#).unwrap();
        assert!(info.found);
        assert_eq!(info.player_name.as_deref(), Some("Luka Doncic"));
        assert!(info.player_id.is_none());
        assert!(info.team.is_none());
    }

    #[test]
    fn malformed_player_info_is_an_error() {
        assert!(parse_player_info("I could not find a player, sorry!").is_err());
        assert!(parse_player_info("```json\n{\"found\": tru\n```").is_err());
    }

    #[test]
    fn analysis_overwrites_classification_fields() {
        let mut item = NewsItem::new("Player X Update", "espn", Utc::now());
        let analysis = parse_analysis(
            r#"```json
{
  "category": "injury",
  "severity": "moderate",
  "impact_level": "high",
  "status": "monitoring",
  "expected_return_date": "2026-09-10",
  "games_missed": 4,
  "tags": ["ankle"],
  "affected_stats": ["minutes", "points"],
  "fantasy_impact_note": "Expect reduced minutes on return."
}
```"#,
        )
        .unwrap();

        apply_analysis(&mut item, analysis);

        assert_eq!(item.category, Category::Injury);
        assert_eq!(item.severity, Some(Severity::Moderate));
        assert_eq!(item.impact_level, ImpactLevel::High);
        assert_eq!(item.status.as_deref(), Some("monitoring"));
        assert_eq!(item.games_missed, Some(4));
        assert_eq!(item.tags, vec!["ankle"]);
    }

    #[test]
    fn analysis_defaults_for_missing_fields() {
        let analysis = parse_analysis("{}").unwrap();
        assert_eq!(analysis.category, Category::Other);
        assert_eq!(analysis.impact_level, ImpactLevel::Low);
        assert!(analysis.severity.is_none());
        assert!(analysis.tags.is_empty());
    }
}
