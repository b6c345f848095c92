pub mod amazon;
pub mod apple;
pub mod dailymotion;
pub mod facebook;
pub mod generic;
pub mod soundcloud;
pub mod spotify;
pub mod tiktok;
pub mod youtube;

use std::collections::HashMap;

use scraper::{Html, Selector};

use crate::record::MetaInfo;

/// Per-platform extraction strategy: page content + URL in, best-effort
/// metadata out. Missing or malformed fields come back empty, never as an
/// error.
pub trait Extract: Send + Sync {
    fn extract(&self, html: &str, url: &str) -> MetaInfo;
}

/// Maps a platform identifier to its strategy. Unknown platforms get the
/// generic fallback instead of failing.
pub struct Registry {
    strategies: HashMap<&'static str, Box<dyn Extract>>,
    fallback: Box<dyn Extract>,
}

impl Registry {
    pub fn builtin() -> Self {
        let mut strategies: HashMap<&'static str, Box<dyn Extract>> = HashMap::new();
        strategies.insert("YouTube", Box::new(youtube::YouTube));
        strategies.insert("TikTok", Box::new(tiktok::TikTok));
        strategies.insert("Soundcloud", Box::new(soundcloud::Soundcloud));
        strategies.insert("Daily Motion", Box::new(dailymotion::DailyMotion));
        strategies.insert("Spotify", Box::new(spotify::Spotify));
        strategies.insert("Apple", Box::new(apple::AppleMusic));
        strategies.insert("Apple Music", Box::new(apple::AppleMusic));
        strategies.insert("Facebook", Box::new(facebook::Facebook));
        strategies.insert("Amazon", Box::new(amazon::AmazonMusic));
        strategies.insert("Amazon Music", Box::new(amazon::AmazonMusic));
        Registry {
            strategies,
            fallback: Box::new(generic::Generic),
        }
    }

    /// Empty content short-circuits to an all-empty result so failed fetches
    /// never abort a record downstream.
    pub fn extract(&self, platform: &str, html: &str, url: &str) -> MetaInfo {
        if html.is_empty() {
            return MetaInfo::default();
        }
        let strategy = self
            .strategies
            .get(platform.trim())
            .map(Box::as_ref)
            .unwrap_or(self.fallback.as_ref());
        strategy.extract(html, url)
    }
}

/// Content attribute of the first element matching a CSS selector, if
/// present and non-empty.
pub(crate) fn meta_content(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector)
        .next()?
        .value()
        .attr("content")
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// ISO-8601 duration ("PT1H2M3S") to "1:02:03", or "4:05" when under an
/// hour.
pub(crate) fn format_iso8601(raw: &str) -> Option<String> {
    let mut rest = raw.strip_prefix("PT")?;
    let mut hours = 0u64;
    let mut minutes = 0u64;
    let mut seconds = 0u64;

    if let Some(i) = rest.find('H') {
        hours = rest[..i].parse().ok()?;
        rest = &rest[i + 1..];
    }
    if let Some(i) = rest.find('M') {
        minutes = rest[..i].parse().ok()?;
        rest = &rest[i + 1..];
    }
    if let Some(i) = rest.find('S') {
        seconds = rest[..i].parse().ok()?;
    }

    Some(if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    })
}

/// Whole seconds to "m:ss". Minutes are not wrapped at the hour.
pub(crate) fn format_seconds(total: u64) -> String {
    format!("{}:{:02}", total / 60, total % 60)
}

// ── Tests ──
