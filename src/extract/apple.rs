use scraper::Html;

use super::{format_seconds, meta_content, Extract};
use crate::record::MetaInfo;

pub struct AppleMusic;

impl Extract for AppleMusic {
    fn extract(&self, html: &str, _url: &str) -> MetaInfo {
        let doc = Html::parse_document(html);
        let mut info = MetaInfo::default();

        if let Some(title) = meta_content(&doc, r#"meta[property="og:title"]"#) {
            info.media_title = title;
        }
        if let Some(secs) = meta_content(&doc, r#"meta[property="music:duration"]"#)
            .and_then(|d| d.parse::<u64>().ok())
        {
            info.media_length = format_seconds(secs);
        }
        if let Some(artist_url) = meta_content(&doc, r#"meta[property="music:musician"]"#) {
            if let Some(id) = artist_url.rsplit('/').next().filter(|s| !s.is_empty()) {
                info.account_id = id.to_string();
            }
        }
        // "Listen to <title> by <artist>. <year>."
        if let Some(desc) = meta_content(&doc, r#"meta[property="og:description"]"#) {
            if let Some(after_by) = desc.rsplit("by").next().filter(|_| desc.contains("by")) {
                let artist = after_by.split('.').next().unwrap_or(after_by).trim();
                if !artist.is_empty() {
                    info.account = artist.to_string();
                }
            }
        }

        info
    }
}
