// src/jsonl.rs
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

/// One published snapshot, as appended to the feed log. `book_json` is
/// embedded verbatim (it is already JSON).
pub struct FeedLine<'a> {
    pub ts_us: i64,
    pub symbol: &'a str,
    pub processed: i64,
    pub depth: usize,
    pub book_json: &'a str,
}

/// One completed replay session, as appended to the bench log.
#[derive(Debug, Serialize)]
pub struct BenchLine {
    pub ts_wall_us: i64,
    pub host: String,
    pub port: u16,
    pub depth: usize,
    pub snapshot_every: i64,
    pub feed_enabled: bool,
    pub pg_enabled: bool,
    pub processed: i64,
    pub elapsed_s: f64,
    pub throughput_msgs_per_s: f64,
    pub apply_p50_us: f64,
    pub apply_p95_us: f64,
    pub apply_p99_us: f64,
    pub snap_p50_ms: f64,
    pub snap_p95_ms: f64,
    pub snap_p99_ms: f64,
}

/// Append-only line-delimited JSON sink. One handle per session; not
/// thread-safe.
pub struct JsonlWriter {
    path: PathBuf,
    out: BufWriter<fs::File>,
}

impl JsonlWriter {
    /// Open `path` in binary append mode, creating missing parent
    /// directories.
    pub fn open_append(path: &Path) -> anyhow::Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).ok();
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open jsonl {path:?}"))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one feed record. Records without a usable timestamp, symbol,
    /// or book body are dropped.
    pub fn write_feed(&mut self, line: &FeedLine<'_>) {
        if line.ts_us <= 0 || line.symbol.is_empty() || line.book_json.is_empty() {
            return;
        }
        // symbol is short exchange ASCII (e.g. CLX5); no escaping needed
        let _ = writeln!(
            self.out,
            "{{\"ts_us\":{},\"symbol\":\"{}\",\"processed\":{},\"depth\":{},\"book\":{}}}",
            line.ts_us, line.symbol, line.processed, line.depth, line.book_json
        );
    }

    /// Append one bench summary record.
    pub fn write_bench(&mut self, line: &BenchLine) {
        if let Ok(s) = serde_json::to_string(line) {
            let _ = writeln!(self.out, "{s}");
        }
    }

    pub fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}
