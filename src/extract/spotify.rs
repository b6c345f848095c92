use scraper::Html;

use super::{meta_content, Extract};
use crate::record::MetaInfo;

pub struct Spotify;

impl Extract for Spotify {
    fn extract(&self, html: &str, url: &str) -> MetaInfo {
        let mut info = MetaInfo::default();

        // Track and artist pages carry no usable account metadata.
        if url.contains("track") || url.contains("artist") {
            return info;
        }

        let doc = Html::parse_document(html);

        if let Some(artist_url) = meta_content(&doc, r#"meta[name="music:musician"]"#) {
            if let Some(id) = artist_url.rsplit('/').next().filter(|s| !s.is_empty()) {
                info.account_id = id.to_string();
            }
        }

        // Description reads "Playlist · Artist Name · N items"; the artist
        // sits between the separators.
        if let Some(desc) = meta_content(&doc, r#"meta[name="description"]"#) {
            let parts: Vec<&str> = desc.split('·').collect();
            if parts.len() >= 3 {
                info.account = parts[1].trim().to_string();
            }
        }

        if let Some(title) = meta_content(&doc, r#"meta[property="og:title"]"#) {
            info.media_title = title;
        }

        info
    }
}
