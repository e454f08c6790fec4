// src/services/fetcher.rs

//! Profile fetcher.
//!
//! Reads a profile timeline from a Nitter instance and returns its posts,
//! newest first.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{RawPost, SourceConfig};
use crate::utils::{extract_status_id, resolve_url};

/// Source of raw posts for one configured profile.
#[async_trait]
pub trait PostFetcher: Send + Sync {
    /// Posts ordered newest-first; empty when the profile has none.
    async fn fetch_latest(&self) -> Result<Vec<RawPost>>;

    /// Where posts come from, for logs.
    fn source(&self) -> String;
}

/// Fetcher for Nitter profile pages.
pub struct NitterFetcher {
    config: SourceConfig,
    client: Client,
}

impl NitterFetcher {
    /// Create a new fetcher with the given client.
    pub fn new(config: SourceConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }

    /// Extract timeline posts from a profile page.
    pub fn parse_timeline(
        &self,
        document: &Html,
        base_url: &Url,
        observed_at: DateTime<Utc>,
    ) -> Result<Vec<RawPost>> {
        let error_sel = Self::parse_selector(".error-panel")?;
        if let Some(panel) = document.select(&error_sel).next() {
            let message = collect_text(&panel);
            let lower = message.to_lowercase();
            if lower.contains("not found") || lower.contains("suspended") {
                return Err(AppError::SourceNotFound(format!(
                    "{}: {}",
                    self.config.profile_url(),
                    message
                )));
            }
            return Err(AppError::fetch(self.config.profile_url(), message));
        }

        let item_sel = Self::parse_selector(".timeline-item")?;
        let link_sel = Self::parse_selector("a.tweet-link")?;
        let content_sel = Self::parse_selector(".tweet-content")?;
        let date_sel = Self::parse_selector(".tweet-date a")?;
        let pinned_sel = Self::parse_selector(".pinned")?;
        let retweet_sel = Self::parse_selector(".retweet-header")?;
        let image_sel = Self::parse_selector(".attachments a.still-image")?;
        let video_sel = Self::parse_selector(".attachments video source")?;

        let mut posts = Vec::new();
        let mut saw_items = false;
        for item in document.select(&item_sel) {
            saw_items = true;
            let pinned = item.select(&pinned_sel).next().is_some();
            let retweet = item.select(&retweet_sel).next().is_some();
            if pinned && self.config.skip_pinned {
                log::debug!("Skipping pinned post");
                continue;
            }
            if retweet && !self.config.include_retweets {
                log::debug!("Skipping repost");
                continue;
            }

            let id = item
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(extract_status_id)
                .or_else(|| item.value().attr("data-id").map(str::to_string));

            let text = item
                .select(&content_sel)
                .next()
                .map(|content| collect_text(&content))
                .unwrap_or_default();

            let published_at = item
                .select(&date_sel)
                .next()
                .and_then(|a| a.value().attr("title"))
                .and_then(parse_nitter_date);

            let media = item
                .select(&image_sel)
                .filter_map(|a| a.value().attr("href"))
                .chain(item.select(&video_sel).filter_map(|s| s.value().attr("src")))
                .map(|href| resolve_url(base_url, href))
                .collect();

            posts.push(RawPost {
                id,
                text,
                published_at,
                media,
                pinned,
                retweet,
                observed_at,
            });
        }

        if !saw_items {
            // Unfamiliar markup: fall back to the first status link on the page.
            let anchor_sel = Self::parse_selector("a[href]")?;
            let fallback = document
                .select(&anchor_sel)
                .filter_map(|a| a.value().attr("href"))
                .find_map(extract_status_id);
            if let Some(id) = fallback {
                log::warn!("No timeline items found; using first status link {}", id);
                posts.push(RawPost {
                    id: Some(id),
                    observed_at,
                    ..RawPost::default()
                });
            }
        }

        Ok(posts)
    }
}

#[async_trait]
impl PostFetcher for NitterFetcher {
    async fn fetch_latest(&self) -> Result<Vec<RawPost>> {
        let url = self.config.profile_url();
        let base_url = Url::parse(&url)?;
        log::info!("Fetching {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::fetch(&url, format!("timed out after {}s", self.config.timeout_secs))
            } else {
                AppError::fetch(&url, e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::SourceNotFound(url));
        }
        if !status.is_success() {
            return Err(AppError::fetch(&url, format!("HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::fetch(&url, e))?;
        let document = Html::parse_document(&html);
        let posts = self.parse_timeline(&document, &base_url, Utc::now())?;

        log::info!("Found {} posts on {}", posts.len(), url);
        Ok(posts)
    }

    fn source(&self) -> String {
        self.config.profile_url()
    }
}

/// Text of an element, whitespace-trimmed.
fn collect_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse the `title` of a Nitter date link, e.g. `Jan 5, 2024 · 3:04 PM UTC`.
fn parse_nitter_date(title: &str) -> Option<DateTime<Utc>> {
    let cleaned = title
        .replace('·', " ")
        .trim()
        .trim_end_matches("UTC")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    NaiveDateTime::parse_from_str(&cleaned, "%b %d, %Y %I:%M %p")
        .ok()
        .map(|naive| naive.and_utc())
}
