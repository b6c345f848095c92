use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::record::Record;

/// Split records into ordered chunks of at most `size` rows. The last chunk
/// may be short; empty input yields no chunks.
pub fn split_records(records: Vec<Record>, size: usize) -> Vec<Vec<Record>> {
    records
        .chunks(size.max(1))
        .map(|c| c.to_vec())
        .collect()
}

/// Path of input chunk `n` (1-based) inside `dir`.
pub fn chunk_path(dir: &Path, n: usize) -> PathBuf {
    dir.join(format!("chunk_{n:04}.csv"))
}

/// Path of the processed artifact for chunk `n`. Its existence is the
/// skip-if-done signal.
pub fn processed_path(dir: &Path, n: usize) -> PathBuf {
    dir.join(format!("chunk_{n:04}_processed.csv"))
}

pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

pub fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for rec in records {
        writer.serialize(rec)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the input CSV and write numbered chunk files into `chunk_dir`.
/// Columns missing from the input are created empty; extra columns are
/// dropped so every artifact shares the fixed schema.
pub fn split_csv(input: &Path, chunk_dir: &Path, size: usize) -> Result<Vec<PathBuf>> {
    anyhow::ensure!(size > 0, "chunk size must be positive");
    let records = read_records(input)?;
    fs::create_dir_all(chunk_dir)?;

    let chunks = split_records(records, size);
    let mut paths = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let path = chunk_path(chunk_dir, i + 1);
        write_records(&path, chunk)?;
        paths.push(path);
    }
    info!("Split {} into {} chunks", input.display(), paths.len());
    Ok(paths)
}

/// Numbered chunk files in `dir`, sorted by sequence number.
pub fn list_chunks(dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let pattern = Regex::new(r"^chunk_(\d+)\.csv$").unwrap();
    list_numbered(dir, &pattern)
}

/// Processed chunk artifacts in `dir`, sorted by sequence number.
pub fn list_processed(dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let pattern = Regex::new(r"^chunk_(\d+)_processed\.csv$").unwrap();
    list_numbered(dir, &pattern)
}

fn list_numbered(dir: &Path, pattern: &Regex) -> Result<Vec<(usize, PathBuf)>> {
    let mut found = Vec::new();
    if !dir.is_dir() {
        return Ok(found);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = pattern.captures(name) {
            if let Ok(n) = caps[1].parse::<usize>() {
                found.push((n, entry.path()));
            }
        }
    }
    found.sort_by_key(|(n, _)| *n);
    Ok(found)
}

/// Concatenate processed chunk artifacts into the final output, ordered by
/// chunk sequence number regardless of which finished first. Unreadable
/// artifacts are skipped with a warning rather than failing the combine.
pub fn combine(processed_dir: &Path, output: &Path) -> Result<usize> {
    let artifacts = list_processed(processed_dir)?;
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let mut total = 0usize;
    for (n, path) in &artifacts {
        let records = match read_records(path) {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping chunk {} ({}): {}", n, path.display(), e);
                continue;
            }
        };
        for rec in &records {
            writer.serialize(rec)?;
        }
        total += records.len();
    }
    writer.flush()?;
    info!(
        "Combined {} chunks ({} rows) into {}",
        artifacts.len(),
        total,
        output.display()
    );
    Ok(total)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new("YouTube", &format!("https://example.com/{i}")))
            .collect()
    }

    #[test]
    fn split_preserves_order_and_count() {
        let records = sample(10);
        let chunks = split_records(records.clone(), 3);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].len(), 1); // last chunk is short

        let rejoined: Vec<Record> = chunks.into_iter().flatten().collect();
        assert_eq!(rejoined, records);
    }

    #[test]
    fn split_empty_input_is_empty() {
        assert!(split_records(Vec::new(), 100).is_empty());
    }

    #[test]
    fn split_combine_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let records = sample(7);

        let input = dir.path().join("input.csv");
        write_records(&input, &records).unwrap();

        let chunk_dir = dir.path().join("chunks");
        let paths = split_csv(&input, &chunk_dir, 3).unwrap();
        assert_eq!(paths.len(), 3);

        // Pretend processing happened: copy chunks to processed artifacts.
        let processed_dir = dir.path().join("processed");
        std::fs::create_dir_all(&processed_dir).unwrap();
        for (n, path) in list_chunks(&chunk_dir).unwrap() {
            let recs = read_records(&path).unwrap();
            write_records(&processed_path(&processed_dir, n), &recs).unwrap();
        }

        let output = dir.path().join("out.csv");
        let total = combine(&processed_dir, &output).unwrap();
        assert_eq!(total, 7);
        assert_eq!(read_records(&output).unwrap(), records);
    }

    #[test]
    fn combine_orders_by_chunk_number_not_mtime() {
        let dir = tempfile::tempdir().unwrap();

        // Write chunk 3 before chunk 1, as a parallel run might.
        write_records(&processed_path(dir.path(), 3), &[Record::new("B", "u3")]).unwrap();
        write_records(&processed_path(dir.path(), 1), &[Record::new("A", "u1")]).unwrap();

        let output = dir.path().join("out.csv");
        combine(dir.path(), &output).unwrap();

        let combined = read_records(&output).unwrap();
        assert_eq!(combined[0].platform, "A");
        assert_eq!(combined[1].platform, "B");
    }

    #[test]
    fn combine_skips_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        write_records(&processed_path(dir.path(), 2), &[Record::new("A", "u")]).unwrap();
        // Chunk 1 never produced an artifact.

        let output = dir.path().join("out.csv");
        let total = combine(dir.path(), &output).unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn missing_input_columns_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.csv");
        std::fs::write(&input, "platform,url\nYouTube,https://example.com/1\n").unwrap();

        let chunks = split_csv(&input, &dir.path().join("chunks"), 10).unwrap();
        let recs = read_records(&chunks[0]).unwrap();
        assert_eq!(recs[0].platform, "YouTube");
        assert_eq!(recs[0].account, "");
        assert_eq!(recs[0].processed_at, "");
    }
}
