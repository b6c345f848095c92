use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::chunk;
use crate::extract::Registry;
use crate::fetch::Fetcher;
use crate::record::Record;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Worker pool size; 1 means strictly sequential.
    pub workers: usize,
    /// Fixed pause between records, to stay polite with target sites.
    pub delay: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            workers: DEFAULT_WORKERS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub chunks: usize,
    pub skipped: usize,
    pub records: usize,
    pub fetch_errors: usize,
}

struct ChunkOutcome {
    n: usize,
    skipped: bool,
    records: usize,
    fetch_errors: usize,
}

/// Process one record in place. A fetch or extraction failure keeps the
/// original record; the return value reports whether the fetch succeeded.
pub async fn process_record(
    fetcher: &dyn Fetcher,
    registry: &Registry,
    record: &mut Record,
) -> bool {
    if record.url.is_empty() {
        // Pass through untouched; still written to output.
        return true;
    }

    let (html, ok) = match fetcher.fetch(&record.url).await {
        Ok(html) => (html, true),
        Err(e) => {
            warn!("Fetch failed for {}: {}", record.url, e);
            (String::new(), false)
        }
    };

    let meta = registry.extract(&record.platform, &html, &record.url);
    record.fill_from(&meta);
    record.stamp();
    ok
}

/// Process every record of a chunk, preserving order and count. Returns the
/// number of fetch failures.
pub async fn process_chunk(
    fetcher: &dyn Fetcher,
    registry: &Registry,
    records: &mut [Record],
    delay: Duration,
) -> usize {
    let mut fetch_errors = 0;
    for record in records.iter_mut() {
        let had_url = !record.url.is_empty();
        if !process_record(fetcher, registry, record).await {
            fetch_errors += 1;
        }
        if had_url && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    fetch_errors
}

/// Process one chunk file, honoring the skip-if-done artifact check.
async fn process_chunk_file(
    fetcher: &dyn Fetcher,
    registry: &Registry,
    chunk_file: &Path,
    n: usize,
    processed_dir: &Path,
    delay: Duration,
) -> Result<ChunkOutcome> {
    let output = chunk::processed_path(processed_dir, n);
    if output.exists() {
        info!("Chunk {} already processed, skipping", n);
        let records = chunk::read_records(&output)?;
        return Ok(ChunkOutcome {
            n,
            skipped: true,
            records: records.len(),
            fetch_errors: 0,
        });
    }

    let mut records = chunk::read_records(chunk_file)?;
    let fetch_errors = process_chunk(fetcher, registry, &mut records, delay).await;
    chunk::write_records(&output, &records)?;

    Ok(ChunkOutcome {
        n,
        skipped: false,
        records: records.len(),
        fetch_errors,
    })
}

/// Process all pending chunks through a bounded worker pool. Completion
/// order is arbitrary; the combiner restores chunk order afterwards.
pub async fn run(
    fetcher: Arc<dyn Fetcher>,
    registry: Arc<Registry>,
    chunk_dir: &Path,
    processed_dir: &Path,
    opts: PipelineOptions,
) -> Result<PipelineStats> {
    let chunks = chunk::list_chunks(chunk_dir)?;
    if chunks.is_empty() {
        info!("No chunk files in {}", chunk_dir.display());
        return Ok(PipelineStats::default());
    }
    std::fs::create_dir_all(processed_dir)?;

    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} chunks ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let semaphore = Arc::new(Semaphore::new(opts.workers.max(1)));
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Result<ChunkOutcome>>(opts.workers.max(1) * 2);

    for (n, path) in chunks {
        let fetcher = Arc::clone(&fetcher);
        let registry = Arc::clone(&registry);
        let sem = Arc::clone(&semaphore);
        let processed_dir = processed_dir.to_path_buf();
        let tx = tx.clone();
        let delay = opts.delay;

        tokio::spawn(async move {
            let _permit = sem.acquire().await;
            let outcome = process_chunk_file(
                fetcher.as_ref(),
                registry.as_ref(),
                &path,
                n,
                &processed_dir,
                delay,
            )
            .await;
            let _ = tx.send(outcome).await;
        });
    }
    drop(tx);

    let mut stats = PipelineStats::default();
    while let Some(outcome) = rx.recv().await {
        match outcome {
            Ok(o) => {
                stats.chunks += 1;
                stats.records += o.records;
                stats.fetch_errors += o.fetch_errors;
                if o.skipped {
                    stats.skipped += 1;
                } else {
                    info!("Chunk {} done ({} records)", o.n, o.records);
                }
            }
            Err(e) => warn!("Chunk failed: {}", e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(stats)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubFetcher {
        html: Option<String>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn returning(html: &str) -> Self {
            StubFetcher {
                html: Some(html.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            StubFetcher {
                html: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.html {
                Some(h) => Ok(h.clone()),
                None => anyhow::bail!("host unreachable"),
            }
        }
    }

    const AUTHOR_PAGE: &str =
        r#"<html><head><meta name="author" content="Extracted Channel"></head></html>"#;

    #[tokio::test]
    async fn preset_fields_survive_processing() {
        let fetcher = StubFetcher::returning(AUTHOR_PAGE);
        let registry = Registry::builtin();

        let mut record = Record::new("YouTube", "https://youtube.com/watch?v=x");
        record.account = "preset".into();

        process_record(&fetcher, &registry, &mut record).await;
        assert_eq!(record.account, "preset");
        assert!(!record.processed_at.is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_yields_empty_metadata_not_error() {
        let fetcher = StubFetcher::failing();
        let registry = Registry::builtin();

        let mut record = Record::new("YouTube", "https://youtube.com/watch?v=x");
        let ok = process_record(&fetcher, &registry, &mut record).await;

        assert!(!ok);
        assert_eq!(record.account, "");
        assert_eq!(record.media_title, "");
        assert!(!record.processed_at.is_empty());
    }

    #[tokio::test]
    async fn empty_url_passes_through_unprocessed() {
        let fetcher = StubFetcher::returning(AUTHOR_PAGE);
        let registry = Registry::builtin();

        let mut record = Record::new("YouTube", "");
        process_record(&fetcher, &registry, &mut record).await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(record.processed_at, "");
    }

    #[tokio::test]
    async fn chunk_keeps_order_and_count_despite_failures() {
        let fetcher = StubFetcher::failing();
        let registry = Registry::builtin();

        let mut records = vec![
            Record::new("A", "https://a.example/1"),
            Record::new("B", ""),
            Record::new("C", "https://c.example/3"),
        ];
        let errors = process_chunk(&fetcher, &registry, &mut records, Duration::ZERO).await;

        assert_eq!(errors, 2);
        assert_eq!(records.len(), 3);
        let platforms: Vec<&str> = records.iter().map(|r| r.platform.as_str()).collect();
        assert_eq!(platforms, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn existing_artifact_skips_extraction_work() {
        let dir = tempfile::tempdir().unwrap();
        let chunk_file = crate::chunk::chunk_path(dir.path(), 1);
        crate::chunk::write_records(&chunk_file, &[Record::new("YouTube", "https://y.example/1")])
            .unwrap();

        // Prior run already produced the artifact.
        let mut done = Record::new("YouTube", "https://y.example/1");
        done.media_title = "from prior run".into();
        let artifact = crate::chunk::processed_path(dir.path(), 1);
        crate::chunk::write_records(&artifact, &[done.clone()]).unwrap();

        let fetcher = StubFetcher::returning(AUTHOR_PAGE);
        let registry = Registry::builtin();
        let outcome = process_chunk_file(
            &fetcher,
            &registry,
            &chunk_file,
            1,
            dir.path(),
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert!(outcome.skipped);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(crate::chunk::read_records(&artifact).unwrap(), vec![done]);
    }

    #[tokio::test]
    async fn worker_pool_processes_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let chunk_dir = dir.path().join("chunks");
        let processed_dir = dir.path().join("processed");
        std::fs::create_dir_all(&chunk_dir).unwrap();

        for n in 1..=3 {
            let recs = vec![Record::new("YouTube", &format!("https://y.example/{n}"))];
            crate::chunk::write_records(&crate::chunk::chunk_path(&chunk_dir, n), &recs).unwrap();
        }

        let fetcher: Arc<dyn Fetcher> = Arc::new(StubFetcher::returning(AUTHOR_PAGE));
        let registry = Arc::new(Registry::builtin());
        let opts = PipelineOptions {
            workers: 2,
            delay: Duration::ZERO,
        };

        let stats = run(fetcher, registry, &chunk_dir, &processed_dir, opts)
            .await
            .unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.records, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(crate::chunk::list_processed(&processed_dir).unwrap().len(), 3);
    }
}
