use scraper::Html;

use super::{format_seconds, meta_content, Extract};
use crate::record::MetaInfo;

pub struct DailyMotion;

impl Extract for DailyMotion {
    fn extract(&self, html: &str, _url: &str) -> MetaInfo {
        let doc = Html::parse_document(html);
        let mut info = MetaInfo::default();

        if let Some(title) = meta_content(&doc, r#"meta[property="og:title"]"#) {
            info.media_title = title;
        }
        if let Some(secs) = meta_content(&doc, r#"meta[property="video:duration"]"#)
            .and_then(|d| d.parse::<u64>().ok())
        {
            info.media_length = format_seconds(secs);
        }
        // og:site_name is a sentinel ("Dailymotion"), not the uploader;
        // the page exposes no uploader meta.
        if let Some(site) = meta_content(&doc, r#"meta[property="og:site_name"]"#) {
            info.account = site;
        }

        info
    }
}
