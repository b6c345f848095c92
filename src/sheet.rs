use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::extract::Registry;
use crate::fetch::Fetcher;
use crate::pipeline::process_record;
use crate::record::{Record, COLUMNS};

pub const TOKEN_ENV: &str = "SHEET_API_TOKEN";

/// A row-addressable remote sink. One process owns the row cursor; the
/// trait is deliberately too small to support concurrent writers.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Total rows currently in the sink, header included.
    async fn row_count(&self) -> Result<usize>;
    /// Write values at a 1-based row position.
    async fn update_row(&self, row: usize, values: &[String]) -> Result<()>;
    /// Drop everything, header included.
    async fn clear(&self) -> Result<()>;
}

/// Records already in the sink, i.e. the input index to resume from.
pub fn resume_index(sink_rows: usize) -> usize {
    sink_rows.saturating_sub(1)
}

#[derive(Debug, Default)]
pub struct SheetStats {
    pub total: usize,
    pub already_done: usize,
    pub attempted: usize,
    pub written: usize,
}

/// Process input records starting at the resume index, appending each to the
/// sink as one row. The header goes in lazily, exactly once, on the first
/// write. A failed write is logged and the cursor stays put, so the next
/// record lands in the same row position instead of leaving a gap.
pub async fn run(
    fetcher: &dyn Fetcher,
    registry: &Registry,
    sink: &dyn Sink,
    mut records: Vec<Record>,
    delay: Duration,
) -> Result<SheetStats> {
    let sink_rows = sink.row_count().await?;
    let start = resume_index(sink_rows);

    let mut stats = SheetStats {
        total: records.len(),
        already_done: start.min(records.len()),
        ..SheetStats::default()
    };

    if start >= records.len() {
        info!(
            "Sheet already has {} of {} records, nothing to do",
            stats.already_done, stats.total
        );
        return Ok(stats);
    }
    info!(
        "Resuming at record {} of {} ({} already in sheet)",
        start + 1,
        stats.total,
        stats.already_done
    );

    let pb = ProgressBar::new((records.len() - start) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} rows ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut header_written = sink_rows >= 1;
    // 1-based sheet row: one header row plus the records already present.
    let mut cursor = start + 2;

    for record in records.iter_mut().skip(start) {
        stats.attempted += 1;
        let had_url = !record.url.is_empty();
        process_record(fetcher, registry, record).await;

        // One immediate retry at the same row. If that fails too, the
        // record's extracted data is dropped: the next record takes this
        // row, and a later resume continues past it rather than
        // revisiting the lost record.
        let mut written = write_row(sink, &mut header_written, cursor, record).await;
        if !written {
            written = write_row(sink, &mut header_written, cursor, record).await;
        }
        if written {
            stats.written += 1;
            cursor += 1;
        }
        pb.inc(1);

        if had_url && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    pb.finish_and_clear();

    info!(
        "Sheet run complete: {}/{} rows written",
        stats.written, stats.attempted
    );
    Ok(stats)
}

async fn write_row(
    sink: &dyn Sink,
    header_written: &mut bool,
    cursor: usize,
    record: &Record,
) -> bool {
    if !*header_written {
        let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
        if let Err(e) = sink.update_row(1, &header).await {
            warn!("Failed to write header row: {}", e);
            return false;
        }
        *header_written = true;
    }

    match sink.update_row(cursor, &record.values()).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to write row {} ({}): {}", cursor, record.url, e);
            false
        }
    }
}

// ── Google Sheets sink ──

pub struct GoogleSheet {
    client: reqwest::Client,
    spreadsheet_id: String,
    sheet_name: String,
    token: String,
}

impl GoogleSheet {
    /// Token comes from the environment; its absence is fatal before any
    /// work starts.
    pub fn from_env(spreadsheet_id: &str, sheet_name: &str) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .with_context(|| format!("{} environment variable must be set", TOKEN_ENV))?;
        Ok(GoogleSheet {
            client: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
            token,
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}",
            self.spreadsheet_id, range
        )
    }

    fn row_range(&self, row: usize) -> String {
        let last_col = (b'A' + COLUMNS.len() as u8 - 1) as char;
        format!("{}!A{}:{}{}", self.sheet_name, row, last_col, row)
    }
}

#[async_trait]
impl Sink for GoogleSheet {
    async fn row_count(&self) -> Result<usize> {
        let url = self.values_url(&self.sheet_name);
        let body: serde_json::Value = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body
            .get("values")
            .and_then(|v| v.as_array())
            .map(|rows| rows.len())
            .unwrap_or(0))
    }

    async fn update_row(&self, row: usize, values: &[String]) -> Result<()> {
        let url = format!(
            "{}?valueInputOption=RAW",
            self.values_url(&self.row_range(row))
        );
        self.client
            .put(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "values": [values] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let url = format!("{}:clear", self.values_url(&self.sheet_name));
        self.client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MemorySink {
        rows: Mutex<BTreeMap<usize, Vec<String>>>,
        fail_writes: AtomicUsize,
    }

    impl MemorySink {
        fn with_rows(n: usize) -> Self {
            let rows = (1..=n)
                .map(|i| (i, vec![format!("row{}", i)]))
                .collect();
            MemorySink {
                rows: Mutex::new(rows),
                fail_writes: AtomicUsize::new(0),
            }
        }

        fn fail_next_writes(&self, n: usize) {
            self.fail_writes.store(n, Ordering::SeqCst);
        }

        fn row(&self, n: usize) -> Option<Vec<String>> {
            self.rows.lock().unwrap().get(&n).cloned()
        }
    }

    #[async_trait]
    impl Sink for MemorySink {
        async fn row_count(&self) -> Result<usize> {
            Ok(self.rows.lock().unwrap().len())
        }

        async fn update_row(&self, row: usize, values: &[String]) -> Result<()> {
            if self
                .fail_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                anyhow::bail!("sink unavailable");
            }
            self.rows.lock().unwrap().insert(row, values.to_vec());
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            self.rows.lock().unwrap().clear();
            Ok(())
        }
    }

    struct NoFetch;

    #[async_trait]
    impl Fetcher for NoFetch {
        async fn fetch(&self, _url: &str) -> Result<String> {
            anyhow::bail!("offline")
        }
    }

    fn inputs(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new("YouTube", &format!("https://y.example/{i}")))
            .collect()
    }

    #[test]
    fn resume_index_arithmetic() {
        assert_eq!(resume_index(0), 0); // empty sink
        assert_eq!(resume_index(1), 0); // header only
        assert_eq!(resume_index(6), 5); // header + 5 data rows
        assert_eq!(resume_index(11), 10);
    }

    #[tokio::test]
    async fn fully_processed_sheet_does_no_work() {
        let sink = MemorySink::with_rows(11); // header + 10
        let stats = run(
            &NoFetch,
            &Registry::builtin(),
            &sink,
            inputs(10),
            Duration::ZERO,
        )
        .await
        .unwrap();
        assert_eq!(stats.attempted, 0);
        assert_eq!(stats.already_done, 10);
        assert_eq!(sink.row_count().await.unwrap(), 11);
    }

    #[tokio::test]
    async fn resumes_from_sink_row_count() {
        let sink = MemorySink::with_rows(6); // header + 5
        let stats = run(
            &NoFetch,
            &Registry::builtin(),
            &sink,
            inputs(10),
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert_eq!(stats.attempted, 5); // records 6-10
        assert_eq!(stats.written, 5);
        assert_eq!(sink.row_count().await.unwrap(), 11);
        // Record index 5 lands at sheet row 7.
        assert_eq!(sink.row(7).unwrap()[1], "https://y.example/5");
    }

    #[tokio::test]
    async fn header_written_lazily_exactly_once() {
        let sink = MemorySink::with_rows(0);
        run(
            &NoFetch,
            &Registry::builtin(),
            &sink,
            inputs(2),
            Duration::ZERO,
        )
        .await
        .unwrap();

        let header = sink.row(1).unwrap();
        assert_eq!(header, COLUMNS.map(String::from).to_vec());
        assert_eq!(sink.row_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_write_does_not_advance_cursor() {
        let sink = MemorySink::with_rows(1); // header already present
        sink.fail_next_writes(2); // both attempts for the first record

        let stats = run(
            &NoFetch,
            &Registry::builtin(),
            &sink,
            inputs(2),
            Duration::ZERO,
        )
        .await
        .unwrap();

        // First record's write failed twice; second record reuses row 2
        // instead of leaving a gap.
        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.written, 1);
        assert_eq!(sink.row(2).unwrap()[1], "https://y.example/1");
        assert!(sink.row(3).is_none());
    }

    #[tokio::test]
    async fn transient_write_failure_recovers_in_place() {
        let sink = MemorySink::with_rows(1);
        sink.fail_next_writes(1); // first attempt fails, retry lands

        let stats = run(
            &NoFetch,
            &Registry::builtin(),
            &sink,
            inputs(2),
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert_eq!(stats.written, 2);
        assert_eq!(sink.row(2).unwrap()[1], "https://y.example/0");
        assert_eq!(sink.row(3).unwrap()[1], "https://y.example/1");
    }

    #[tokio::test]
    async fn clear_resets_progress() {
        let sink = MemorySink::with_rows(6);
        sink.clear().await.unwrap();
        assert_eq!(resume_index(sink.row_count().await.unwrap()), 0);
    }
}
