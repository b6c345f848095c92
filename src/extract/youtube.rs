use scraper::Html;

use super::{format_iso8601, meta_content, Extract};
use crate::record::MetaInfo;

pub struct YouTube;

impl Extract for YouTube {
    fn extract(&self, html: &str, _url: &str) -> MetaInfo {
        let doc = Html::parse_document(html);
        let mut info = MetaInfo::default();

        if let Some(title) = meta_content(&doc, r#"meta[property="og:title"]"#) {
            info.media_title = title;
        }

        // Duration lives in itemprop on watch pages, video:duration elsewhere.
        let duration = meta_content(&doc, r#"meta[itemprop="duration"]"#)
            .or_else(|| meta_content(&doc, r#"meta[property="video:duration"]"#));
        if let Some(length) = duration.as_deref().and_then(format_iso8601) {
            info.media_length = length;
        }

        if let Some(author) = meta_content(&doc, r#"meta[name="author"]"#) {
            info.account = author;
        }

        for css in [
            r#"meta[name="channelId"]"#,
            r#"meta[property="og:video:channel"]"#,
            r#"meta[itemprop="channelId"]"#,
        ] {
            if let Some(id) = meta_content(&doc, css) {
                info.account_id = id;
                break;
            }
        }

        info
    }
}
