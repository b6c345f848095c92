use scraper::{Html, Selector};

use super::Extract;
use crate::record::MetaInfo;

const ARTIST_URL_PREFIX: &str = "https://music.amazon.com/artists/";

pub struct AmazonMusic;

impl Extract for AmazonMusic {
    fn extract(&self, html: &str, _url: &str) -> MetaInfo {
        let doc = Html::parse_document(html);
        let mut info = MetaInfo::default();

        let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
            return info;
        };

        // One of the ld+json blobs carries byArtist.url; the rest are noise.
        for script in doc.select(&selector) {
            let raw = script.inner_html();
            let Ok(data) = serde_json::from_str::<serde_json::Value>(raw.trim()) else {
                continue;
            };
            let Some(artist_url) = data
                .get("byArtist")
                .and_then(|a| a.get("url"))
                .and_then(|u| u.as_str())
            else {
                continue;
            };

            if let Some(rest) = artist_url.strip_prefix(ARTIST_URL_PREFIX) {
                let mut parts = rest.split('/');
                if let Some(id) = parts.next().filter(|s| !s.is_empty()) {
                    info.account_id = id.to_string();
                }
                if let Some(name) = parts.next().filter(|s| !s.is_empty()) {
                    info.account = name.to_string();
                }
            }
            break;
        }

        info
    }
}
