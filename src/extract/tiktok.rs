use scraper::Html;
use url::Url;

use super::{format_seconds, meta_content, Extract};
use crate::record::MetaInfo;

pub struct TikTok;

impl Extract for TikTok {
    fn extract(&self, html: &str, url: &str) -> MetaInfo {
        let doc = Html::parse_document(html);
        let mut info = MetaInfo::default();

        // Account handle comes from the URL itself.
        if let Some(handle) = account_handle(url) {
            info.account = handle;
        }

        for css in [
            r#"meta[property="og:title"]"#,
            r#"meta[name="title"]"#,
            r#"meta[property="twitter:title"]"#,
        ] {
            if let Some(title) = meta_content(&doc, css) {
                info.media_title = title
                    .strip_suffix(" on TikTok")
                    .unwrap_or(&title)
                    .to_string();
                break;
            }
        }

        // Duration is plain seconds when present at all.
        if let Some(secs) = meta_content(&doc, r#"meta[property="video:duration"]"#)
            .and_then(|d| d.parse::<u64>().ok())
        {
            info.media_length = format_seconds(secs);
        }

        info
    }
}

/// The "@user" path segment of a TikTok URL.
fn account_handle(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .find(|s| s.len() > 1 && s.starts_with('@'))
        .map(str::to_string)
}
