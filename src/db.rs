use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::info;
use rusqlite::{Connection, params};

use crate::models::{Category, ImpactLevel, NewsItem, Severity};

const SCHEMA_SQL: &str = include_str!("../schema.sql");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Duplicate,
}

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: &str) -> Result<Self> {
        let conn =
            Connection::open(path).with_context(|| format!("Failed to open DB at {path}"))?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize schema")?;
        Ok(Db { conn })
    }

    /// Insert a news item. The unique index on (title, published_at) is the
    /// duplicate signal: a conflicting insert changes zero rows and reports
    /// `Duplicate`, so overlapping runs cannot race each other into an error.
    pub fn save(&self, item: &NewsItem) -> Result<SaveOutcome> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO nba_news (
                player_name, player_id, team, title, content, summary,
                category, severity, impact_level, status, expected_return_date,
                games_missed, source, source_url, author, published_at,
                tags, affected_stats, fantasy_impact_note
            ) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            )",
            params![
                &item.player_name,
                &item.player_id,
                &item.team,
                &item.title,
                &item.content,
                &item.summary,
                item.category.as_str(),
                item.severity.map(|s| s.as_str()),
                item.impact_level.as_str(),
                &item.status,
                &item.expected_return_date,
                &item.games_missed,
                &item.source,
                item.source_url.as_ref().map(|u| u.to_string()),
                &item.author,
                format_timestamp(&item.published_at),
                serde_json::to_string(&item.tags)?,
                serde_json::to_string(&item.affected_stats)?,
                &item.fantasy_impact_note,
            ],
        )?;

        Ok(if changed == 0 {
            SaveOutcome::Duplicate
        } else {
            SaveOutcome::Saved
        })
    }

    /// Delete rows whose publish time is older than the retention window.
    pub fn cleanup(&self, retention_days: i64) -> Result<usize> {
        let cutoff = format_timestamp(&(Utc::now() - Duration::days(retention_days)));
        let deleted = self.conn.execute(
            "DELETE FROM nba_news WHERE published_at < ?",
            params![cutoff],
        )?;
        info!("Cleaned up {deleted} old news items");
        Ok(deleted)
    }

    #[cfg(test)]
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    #[cfg(test)]
    pub fn count_items(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM nba_news", [], |row| row.get(0))?)
    }

    #[cfg(test)]
    pub fn get(&self, title: &str, published_at: &DateTime<Utc>) -> Result<Option<NewsItem>> {
        use rusqlite::OptionalExtension;

        let mut stmt = self.conn.prepare(
            "SELECT player_name, player_id, team, title, content, summary,
                    category, severity, impact_level, status, expected_return_date,
                    games_missed, source, source_url, author, published_at,
                    tags, affected_stats, fantasy_impact_note
             FROM nba_news WHERE title = ? AND published_at = ?",
        )?;

        let row = stmt
            .query_row(params![title, format_timestamp(published_at)], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, Option<String>>(9)?,
                    row.get::<_, Option<String>>(10)?,
                    row.get::<_, Option<i64>>(11)?,
                    row.get::<_, String>(12)?,
                    row.get::<_, Option<String>>(13)?,
                    row.get::<_, Option<String>>(14)?,
                    row.get::<_, String>(15)?,
                    row.get::<_, String>(16)?,
                    row.get::<_, String>(17)?,
                    row.get::<_, Option<String>>(18)?,
                ))
            })
            .optional()?;

        let Some(row) = row else { return Ok(None) };

        let mut item = NewsItem::new(row.3, row.12, row.15.parse()?);
        item.player_name = row.0;
        item.player_id = row.1;
        item.team = row.2;
        item.content = row.4;
        item.summary = row.5;
        item.category = Category::parse(&row.6);
        item.severity = row.7.as_deref().and_then(Severity::parse);
        item.impact_level = ImpactLevel::parse(&row.8);
        item.status = row.9;
        item.expected_return_date = row.10;
        item.games_missed = row.11;
        item.source_url = row.13.as_deref().and_then(|u| u.parse().ok());
        item.author = row.14;
        item.tags = serde_json::from_str(&row.16)?;
        item.affected_stats = serde_json::from_str(&row.17)?;
        item.fantasy_impact_note = row.18;

        Ok(Some(item))
    }
}

/// All stored timestamps use this one format so lexicographic comparison in
/// SQL matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ImpactLevel, Severity};
    use chrono::TimeZone;

    fn sample_item() -> NewsItem {
        let published = Utc.with_ymd_and_hms(2026, 8, 20, 15, 0, 0).unwrap();
        let mut item = NewsItem::new("Jayson Tatum Injury Update: Out", "espn_injuries", published);
        item.player_name = Some("Jayson Tatum".to_string());
        item.team = Some("BOS".to_string());
        item.category = Category::Injury;
        item.severity = Some(Severity::Moderate);
        item.impact_level = ImpactLevel::High;
        item.status = Some("out".to_string());
        item.tags = vec!["Achilles".to_string(), "Leg".to_string()];
        item.affected_stats = vec!["minutes".to_string(), "points".to_string()];
        item.fantasy_impact_note = Some("Bench until further notice.".to_string());
        item
    }

    #[test]
    fn duplicate_save_is_a_no_op() {
        let db = Db::open_in_memory().unwrap();
        let item = sample_item();

        assert_eq!(db.save(&item).unwrap(), SaveOutcome::Saved);
        assert_eq!(db.save(&item).unwrap(), SaveOutcome::Duplicate);
        assert_eq!(db.count_items().unwrap(), 1);
    }

    #[test]
    fn same_title_different_timestamp_is_a_new_row() {
        let db = Db::open_in_memory().unwrap();
        let item = sample_item();
        let mut later = item.clone();
        later.published_at = item.published_at + Duration::hours(6);

        assert_eq!(db.save(&item).unwrap(), SaveOutcome::Saved);
        assert_eq!(db.save(&later).unwrap(), SaveOutcome::Saved);
        assert_eq!(db.count_items().unwrap(), 2);
    }

    #[test]
    fn row_round_trips_enums_and_lists() {
        let db = Db::open_in_memory().unwrap();
        let item = sample_item();
        db.save(&item).unwrap();

        let loaded = db.get(&item.title, &item.published_at).unwrap().unwrap();
        assert_eq!(loaded.category, Category::Injury);
        assert_eq!(loaded.severity, Some(Severity::Moderate));
        assert_eq!(loaded.impact_level, ImpactLevel::High);
        assert_eq!(loaded.tags, item.tags);
        assert_eq!(loaded.affected_stats, item.affected_stats);
        assert_eq!(loaded.player_name, item.player_name);
        assert_eq!(loaded.published_at, item.published_at);
    }

    #[test]
    fn cleanup_deletes_only_rows_past_the_window() {
        let db = Db::open_in_memory().unwrap();

        let mut stale = sample_item();
        stale.title = "Old news".to_string();
        stale.published_at = Utc::now() - Duration::days(40);

        let mut fresh = sample_item();
        fresh.title = "Fresh news".to_string();
        fresh.published_at = Utc::now() - Duration::days(5);

        db.save(&stale).unwrap();
        db.save(&fresh).unwrap();

        let deleted = db.cleanup(30).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.count_items().unwrap(), 1);
        assert!(db.get(&fresh.title, &fresh.published_at).unwrap().is_some());
        assert!(db.get(&stale.title, &stale.published_at).unwrap().is_none());
    }
}
