use scraper::Html;

use super::{format_seconds, meta_content, Extract};
use crate::record::MetaInfo;

/// Fallback for platforms without a dedicated strategy.
pub struct Generic;

impl Extract for Generic {
    fn extract(&self, html: &str, _url: &str) -> MetaInfo {
        let doc = Html::parse_document(html);
        let mut info = MetaInfo::default();

        if let Some(title) = meta_content(&doc, r#"meta[property="og:title"]"#) {
            info.media_title = title;
        }

        for css in [
            r#"meta[name="author"]"#,
            r#"meta[property="og:author"]"#,
            r#"meta[name="channel"]"#,
        ] {
            if let Some(account) = meta_content(&doc, css) {
                info.account = account;
                break;
            }
        }

        if let Some(secs) = meta_content(&doc, r#"meta[property="video:duration"]"#)
            .and_then(|d| d.parse::<u64>().ok())
        {
            info.media_length = format_seconds(secs);
        }

        info
    }
}
