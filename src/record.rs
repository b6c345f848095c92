use serde::{Deserialize, Serialize};

/// Output column order. Inputs may carry extra columns; they are dropped on
/// the first split so every downstream artifact shares this schema.
pub const COLUMNS: [&str; 7] = [
    "platform",
    "url",
    "account",
    "account_id",
    "media_title",
    "media_length",
    "processed_at",
];

/// One input row. Everything besides `platform`/`url` starts empty and is
/// only ever filled, never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub media_title: String,
    #[serde(default)]
    pub media_length: String,
    #[serde(default)]
    pub processed_at: String,
}

/// What an extraction strategy managed to pull out of a page. Any subset of
/// fields may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaInfo {
    pub account: String,
    pub account_id: String,
    pub media_title: String,
    pub media_length: String,
}

impl Record {
    pub fn new(platform: &str, url: &str) -> Self {
        Record {
            platform: platform.to_string(),
            url: url.to_string(),
            ..Record::default()
        }
    }

    /// Fill-if-blank merge: extracted values land only in fields that are
    /// currently empty. Pre-populated values always win, and an empty
    /// extraction result never blanks anything.
    pub fn fill_from(&mut self, info: &MetaInfo) {
        fill(&mut self.account, &info.account);
        fill(&mut self.account_id, &info.account_id);
        fill(&mut self.media_title, &info.media_title);
        fill(&mut self.media_length, &info.media_length);
    }

    /// Stamp the processing time, once.
    pub fn stamp(&mut self) {
        if self.processed_at.is_empty() {
            self.processed_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        }
    }

    /// Row values in output column order.
    pub fn values(&self) -> Vec<String> {
        vec![
            self.platform.clone(),
            self.url.clone(),
            self.account.clone(),
            self.account_id.clone(),
            self.media_title.clone(),
            self.media_length.clone(),
            self.processed_at.clone(),
        ]
    }
}

fn fill(slot: &mut String, value: &str) {
    if slot.is_empty() && !value.is_empty() {
        *slot = value.to_string();
    }
}

// ── Tests ──
