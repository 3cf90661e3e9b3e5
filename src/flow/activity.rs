// src/flow/activity.rs

//! Resolution of the event-stage placeholder (`HD-7` → `OF-7`).
//!
//! The current side-story code comes from an [`ActivitySource`] and is
//! cached for a day. A failed refresh keeps serving the previous value.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::exec::BoxFuture;

pub const ACTIVITY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const FEED_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// The currently running side story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityInfo {
    /// Stage code prefix, e.g. `OF`.
    pub code: String,
    pub name: String,
    pub fetched_at: DateTime<Local>,
}

impl ActivityInfo {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            fetched_at: Local::now(),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Local>, ttl: Duration) -> bool {
        let age = now.signed_duration_since(self.fetched_at);
        age.to_std().map_or(true, |age| age < ttl)
    }
}

/// Where activity information comes from.
pub trait ActivitySource: Send + Sync {
    /// `Ok(None)` means no side story is running right now.
    fn fetch(&self) -> BoxFuture<'_, Result<Option<ActivityInfo>>>;
}

/// Reads the public `StageActivity.json` feed.
#[derive(Debug, Clone)]
pub struct HttpActivitySource {
    client: reqwest::Client,
    url: String,
    client_type: String,
}

impl HttpActivitySource {
    pub fn new(url: impl Into<String>, client_type: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            client_type: client_type.into(),
        }
    }
}

impl ActivitySource for HttpActivitySource {
    fn fetch(&self) -> BoxFuture<'_, Result<Option<ActivityInfo>>> {
        Box::pin(async move {
            let body = self
                .client
                .get(&self.url)
                .send()
                .await
                .with_context(|| format!("requesting activity feed {}", self.url))?
                .error_for_status()
                .context("activity feed returned an error status")?
                .text()
                .await
                .context("reading activity feed body")?;

            parse_activity_feed(&body, &self.client_type, Utc::now())
        })
    }
}

/// Pick the side story open at `now` for `client_type` out of a
/// `StageActivity.json` document.
pub fn parse_activity_feed(
    body: &str,
    client_type: &str,
    now: DateTime<Utc>,
) -> Result<Option<ActivityInfo>> {
    let doc: Value = serde_json::from_str(body).context("parsing activity feed")?;

    let Some(stages) = doc
        .get(client_type)
        .and_then(|c| c.get("sideStoryStage"))
        .and_then(Value::as_array)
    else {
        debug!(client_type, "activity feed has no side story section");
        return Ok(None);
    };

    for stage in stages {
        let Some(value) = stage.get("Value").and_then(Value::as_str) else {
            continue;
        };
        let activity = stage.get("Activity");
        let start = activity.and_then(|a| feed_time(a, "UtcStartTime"));
        let expire = activity.and_then(|a| feed_time(a, "UtcExpireTime"));

        let open = start.is_none_or(|s| s <= now) && expire.is_some_and(|e| now < e);
        if !open {
            continue;
        }

        let code = value.split('-').next().unwrap_or(value).to_string();
        let name = activity
            .and_then(|a| a.get("StageName"))
            .and_then(Value::as_str)
            .unwrap_or(value)
            .to_string();
        return Ok(Some(ActivityInfo::new(code, name)));
    }

    Ok(None)
}

fn feed_time(activity: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = activity.get(key)?.as_str()?;
    NaiveDateTime::parse_from_str(raw, FEED_TIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Shared, lazily refreshed activity cache. Last writer wins.
#[derive(Clone)]
pub struct ActivityCache {
    source: Arc<dyn ActivitySource>,
    placeholder: String,
    ttl: Duration,
    cached: Arc<RwLock<Option<ActivityInfo>>>,
}

impl std::fmt::Debug for ActivityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityCache")
            .field("placeholder", &self.placeholder)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ActivityCache {
    pub fn new(source: Arc<dyn ActivitySource>, placeholder: impl Into<String>) -> Self {
        Self {
            source,
            placeholder: placeholder.into(),
            ttl: ACTIVITY_TTL,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn is_placeholder(&self, stage_code: &str) -> bool {
        let code = stage_code.trim();
        match code.get(..self.placeholder.len()) {
            Some(head) if head.eq_ignore_ascii_case(&self.placeholder) => {
                let rest = &code[self.placeholder.len()..];
                rest.is_empty() || rest.starts_with('-')
            }
            _ => false,
        }
    }

    /// Current activity, refreshing when the cached value expired.
    pub async fn current(&self) -> Option<ActivityInfo> {
        let now = Local::now();
        let stale = {
            let cached = self.cached.read().await;
            match cached.as_ref() {
                Some(info) if info.is_fresh(now, self.ttl) => return Some(info.clone()),
                other => other.cloned(),
            }
        };

        match self.source.fetch().await {
            Ok(fresh) => {
                if let Some(info) = &fresh {
                    info!(code = %info.code, name = %info.name, "activity refreshed");
                }
                *self.cached.write().await = fresh.clone();
                fresh
            }
            Err(e) => {
                warn!(error = %e, "activity refresh failed; using cached value");
                stale
            }
        }
    }

    /// Replace the placeholder prefix of `stage_code` with the current
    /// activity code. Other stages, and placeholders with no known activity,
    /// are returned unchanged.
    pub async fn resolve(&self, stage_code: &str) -> String {
        if !self.is_placeholder(stage_code) {
            return stage_code.to_string();
        }

        match self.current().await {
            Some(info) => {
                let rest = &stage_code.trim()[self.placeholder.len()..];
                let resolved = format!("{}{}", info.code, rest);
                debug!(from = stage_code, to = %resolved, "resolved activity stage");
                resolved
            }
            None => {
                warn!(stage = stage_code, "no activity is running; stage left unresolved");
                stage_code.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"{
        "Official": {
            "sideStoryStage": [
                {
                    "Display": "OF-7",
                    "Value": "OF-7",
                    "Activity": {
                        "StageName": "Heart of Surging Flame",
                        "UtcStartTime": "2024/01/01 08:00:00",
                        "UtcExpireTime": "2024/01/15 04:00:00"
                    }
                }
            ]
        }
    }"#;

    fn at(s: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDateTime::parse_from_str(s, FEED_TIME_FORMAT).unwrap())
    }

    #[test]
    fn picks_the_open_side_story() {
        let info = parse_activity_feed(FEED, "Official", at("2024/01/05 00:00:00"))
            .unwrap()
            .unwrap();
        assert_eq!(info.code, "OF");
        assert_eq!(info.name, "Heart of Surging Flame");
    }

    #[test]
    fn expired_or_missing_section_yields_none() {
        assert!(parse_activity_feed(FEED, "Official", at("2024/02/01 00:00:00"))
            .unwrap()
            .is_none());
        assert!(parse_activity_feed(FEED, "YoStarEN", at("2024/01/05 00:00:00"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_activity_feed("not json", "Official", Utc::now()).is_err());
    }
}
