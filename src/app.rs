use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info};

use crate::analyzer::{NewsAnalyst, OpenAiAnalyst};
use crate::config::Config;
use crate::db::{Db, SaveOutcome};
use crate::espn::{EspnClient, INJURY_SOURCE};
use crate::logger::init_logger;
use crate::models::NewsItem;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "NBA-Fantasy-Bot/1.0 (fantasy basketball assistant)";

pub async fn run(no_ai: bool, retention_days: i64) -> Result<()> {
    init_logger()?;
    debug!("Logger initialized");

    let cfg = Config::from_env()?;
    debug!("Configuration loaded");

    let db = Db::open(&cfg.database_url)?;
    debug!("Database opened");

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?;
    let espn = EspnClient::new(http);

    info!("Starting NBA news fetch process...");

    let mut items = espn.fetch_news().await;
    items.extend(espn.fetch_injuries().await);
    info!("Fetched {} items in total", items.len());

    let items = if no_ai {
        info!("--no-ai flag set, skipping AI enrichment");
        items
    } else {
        let analyst = OpenAiAnalyst::new(&cfg);
        enrich_items(items, &analyst).await
    };

    let (saved, duplicates) = save_all(&db, &items);
    info!("Successfully saved {saved} new news items ({duplicates} duplicates skipped)");

    sweep(&db, retention_days);

    info!("NBA news fetch process completed successfully");
    Ok(())
}

/// Retention sweep. A failed sweep must not fail a run whose saves already
/// landed, so the error is logged and swallowed.
pub fn sweep(db: &Db, retention_days: i64) {
    if let Err(e) = db.cleanup(retention_days) {
        error!("Error cleaning up old news: {e:#}");
    }
}

/// Route every item through the analyst, except injury-feed records, which
/// arrive already structured. Analyst calls cannot fail, so one bad AI
/// response only leaves that item unenriched rather than aborting the batch.
pub async fn enrich_items(items: Vec<NewsItem>, analyst: &dyn NewsAnalyst) -> Vec<NewsItem> {
    let mut processed = Vec::with_capacity(items.len());

    for mut item in items {
        if item.source == INJURY_SOURCE {
            processed.push(item);
            continue;
        }

        let player = analyst
            .extract_player_info(&item.title, item.content.as_deref())
            .await;
        if player.found {
            item.player_name = player.player_name;
            item.player_id = player.player_id;
            item.team = player.team;
        }

        analyst.analyze(&mut item).await;
        processed.push(item);
    }

    info!("Processed {} news items", processed.len());
    processed
}

/// Persist every item, counting inserts and skipped duplicates. A failed
/// insert is logged and the rest of the batch continues.
pub fn save_all(db: &Db, items: &[NewsItem]) -> (usize, usize) {
    let mut saved = 0;
    let mut duplicates = 0;

    for item in items {
        match db.save(item) {
            Ok(SaveOutcome::Saved) => saved += 1,
            Ok(SaveOutcome::Duplicate) => {
                debug!("Article already exists: {}", item.title);
                duplicates += 1;
            }
            Err(e) => error!("Error saving news item '{}': {e:#}", item.title),
        }
    }

    (saved, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::PlayerInfo;
    use crate::espn::NEWS_SOURCE;
    use crate::models::{Category, ImpactLevel};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Enriches everything as a high-impact trade and records which titles it saw.
    struct StubAnalyst {
        analyzed_titles: Mutex<Vec<String>>,
    }

    impl StubAnalyst {
        fn new() -> Self {
            StubAnalyst {
                analyzed_titles: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NewsAnalyst for StubAnalyst {
        async fn extract_player_info(&self, _title: &str, _content: Option<&str>) -> PlayerInfo {
            PlayerInfo {
                player_name: Some("Player X".to_string()),
                player_id: Some("42".to_string()),
                team: Some("BOS".to_string()),
                found: true,
            }
        }

        async fn analyze(&self, item: &mut NewsItem) {
            self.analyzed_titles.lock().unwrap().push(item.title.clone());
            item.category = Category::Trade;
            item.impact_level = ImpactLevel::High;
        }
    }

    /// Mimics a run where every AI call fails: nothing found, nothing touched.
    struct FailingAnalyst;

    #[async_trait]
    impl NewsAnalyst for FailingAnalyst {
        async fn extract_player_info(&self, _title: &str, _content: Option<&str>) -> PlayerInfo {
            PlayerInfo::default()
        }

        async fn analyze(&self, _item: &mut NewsItem) {}
    }

    fn news_item(title: &str) -> NewsItem {
        let published = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap();
        NewsItem::new(title, NEWS_SOURCE, published)
    }

    #[tokio::test]
    async fn pipeline_is_idempotent_across_runs() {
        let db = Db::open_in_memory().unwrap();
        let analyst = StubAnalyst::new();

        let fetched = vec![news_item("Player X Update")];

        // first run: enrich then persist
        let enriched = enrich_items(fetched.clone(), &analyst).await;
        let (saved, duplicates) = save_all(&db, &enriched);
        assert_eq!((saved, duplicates), (1, 0));

        let row = db
            .get(&enriched[0].title, &enriched[0].published_at)
            .unwrap()
            .unwrap();
        assert_eq!(row.category, Category::Trade);
        assert_eq!(row.player_name.as_deref(), Some("Player X"));

        // second run over the same fetch result adds nothing
        let enriched = enrich_items(fetched, &analyst).await;
        let (saved, duplicates) = save_all(&db, &enriched);
        assert_eq!((saved, duplicates), (0, 1));
        assert_eq!(db.count_items().unwrap(), 1);
    }

    #[tokio::test]
    async fn injury_items_bypass_enrichment() {
        let analyst = StubAnalyst::new();
        let published = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap();

        let mut injury = NewsItem::new("Player Y Injury Update: Out", INJURY_SOURCE, published);
        injury.category = Category::Injury;

        let items = vec![injury, news_item("Player X Update")];
        let processed = enrich_items(items, &analyst).await;

        assert_eq!(processed.len(), 2);
        assert_eq!(processed[0].category, Category::Injury);
        assert_eq!(
            *analyst.analyzed_titles.lock().unwrap(),
            vec!["Player X Update".to_string()]
        );
    }

    #[test]
    fn sweep_failure_is_logged_not_fatal() {
        let db = Db::open_in_memory().unwrap();
        db.execute_batch("DROP TABLE nba_news;").unwrap();

        // cleanup now errors underneath; the sweep must swallow it
        sweep(&db, 30);
    }

    #[tokio::test]
    async fn failed_enrichment_persists_the_raw_item() {
        let db = Db::open_in_memory().unwrap();

        let fetched = vec![news_item("Mystery headline")];
        let processed = enrich_items(fetched, &FailingAnalyst).await;

        assert_eq!(processed[0].category, Category::Other);
        assert!(processed[0].player_name.is_none());

        let (saved, _) = save_all(&db, &processed);
        assert_eq!(saved, 1);
    }
}
