use scraper::Html;
use url::Url;

use super::{format_seconds, meta_content, Extract};
use crate::record::MetaInfo;

const HYDRATION_MARKER: &str = "window.__sc_hydration = ";

pub struct Soundcloud;

impl Extract for Soundcloud {
    fn extract(&self, html: &str, url: &str) -> MetaInfo {
        let doc = Html::parse_document(html);
        let mut info = MetaInfo::default();

        // First path segment after the host is the account name.
        if let Some(account) = account_from_url(url) {
            info.account = account;
        }

        if let Some(title) = meta_content(&doc, r#"meta[property="og:title"]"#) {
            info.media_title = title;
        }

        if let Some(ms) = hydration_duration_ms(html) {
            info.media_length = format_seconds(ms / 1000);
        }

        info
    }
}

fn account_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !parsed.host_str()?.ends_with("soundcloud.com") {
        return None;
    }
    parsed
        .path_segments()?
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Track duration in milliseconds from the inline hydration payload.
fn hydration_duration_ms(html: &str) -> Option<u64> {
    let start = html.find(HYDRATION_MARKER)? + HYDRATION_MARKER.len();
    let rest = &html[start..];
    let end = rest.find(";</script>").or_else(|| rest.find(';'))?;

    let data: serde_json::Value = serde_json::from_str(&rest[..end]).ok()?;
    data.as_array()?
        .iter()
        .find(|item| item.get("hydratable").and_then(|h| h.as_str()) == Some("sound"))?
        .get("data")?
        .get("duration")?
        .as_u64()
}
