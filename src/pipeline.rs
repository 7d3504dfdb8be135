// src/pipeline.rs
use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use log::{error, info};

use crate::config::AppConfig;
use crate::dbqueue::{SnapshotQueue, SnapshotWrite};
use crate::hist::Pow2Histogram;
use crate::jsonl::{BenchLine, FeedLine, JsonlWriter};
use crate::metrics;
use crate::orderbook::MboBook;
use crate::output;
use crate::parser::parse_mbo_csv_line;
use crate::store;
use crate::util::{now_wall_us, ts_event_to_us, BarrierFlag};

const READ_BUF_BYTES: usize = 1 << 20;
/// "Dump everything" depth for the end-of-session book file.
const FULL_DEPTH: usize = 1_000_000;
const RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Mutable state of one replay session: the book, latency histograms, and
/// running counters. The surrounding I/O loop feeds it complete lines.
struct Session<'a> {
    cfg: &'a AppConfig,
    db_queue: Option<&'a Arc<SnapshotQueue>>,
    feed: Option<JsonlWriter>,
    book: MboBook,
    has_symbol: bool,
    apply_hist: Pow2Histogram,
    snap_hist: Pow2Histogram,
    processed: i64,
    parsed_ok: i64,
    lines_total: u64,
    last_ts_us: i64,
}

impl<'a> Session<'a> {
    fn new(cfg: &'a AppConfig, db_queue: Option<&'a Arc<SnapshotQueue>>, feed: Option<JsonlWriter>) -> Self {
        Self {
            cfg,
            db_queue,
            feed,
            book: MboBook::new(""),
            has_symbol: false,
            apply_hist: Pow2Histogram::new(),
            snap_hist: Pow2Histogram::new(),
            processed: 0,
            parsed_ok: 0,
            lines_total: 0,
            last_ts_us: 0,
        }
    }

    fn handle_line(&mut self, raw: &[u8]) {
        let Ok(line) = std::str::from_utf8(raw) else {
            metrics::inc_parse_rejects();
            return;
        };
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return;
        }
        // header rows from the sender, in any of its known shapes
        if line.starts_with("ts_event")
            || line.starts_with("publisher_id")
            || line.starts_with("instrument_id")
        {
            return;
        }

        self.lines_total += 1;
        metrics::inc_feed_lines();

        let Some(e) = parse_mbo_csv_line(line) else {
            metrics::inc_parse_rejects();
            return;
        };
        self.parsed_ok += 1;

        if !e.ts_event.is_empty() {
            self.last_ts_us = ts_event_to_us(&e.ts_event);
        }

        // first event that names a symbol owns the session
        if !self.has_symbol && !e.symbol.is_empty() {
            info!("session symbol: {}", e.symbol);
            self.book = MboBook::new(e.symbol.clone());
            self.has_symbol = true;
        }

        let t0 = Instant::now();
        self.book.apply(&e);
        self.apply_hist.add(t0.elapsed().as_nanos() as u64);
        metrics::inc_events_applied();

        self.processed += 1;

        if self.cfg.snapshot_every > 0 && self.processed % self.cfg.snapshot_every == 0 {
            self.snapshot();
            info!("{}", self.book.to_pretty_bbo().trim_end());
        }
    }

    /// The timed snapshot path: render once, then fan out to the
    /// latest-snapshot store, the DB queue, and the feed log.
    fn snapshot(&mut self) {
        let t0 = Instant::now();

        let json = self.book.to_json(self.cfg.depth);
        let sym = self.book.symbol().to_string();

        if !sym.is_empty() {
            store::publish(&sym, json.clone());
        } else {
            store::publish_global(json.clone());
        }
        metrics::inc_snapshots_published();

        if !sym.is_empty() && self.last_ts_us > 0 {
            if let Some(q) = self.db_queue {
                q.push(SnapshotWrite {
                    ts_us: self.last_ts_us,
                    symbol: sym.clone(),
                    tob: self.book.top_of_book(),
                });
            }
        }

        if let Some(w) = self.feed.as_mut() {
            w.write_feed(&FeedLine {
                ts_us: self.last_ts_us,
                symbol: &sym,
                processed: self.processed,
                depth: self.cfg.depth,
                book_json: &json,
            });
        }

        self.snap_hist.add(t0.elapsed().as_nanos() as u64);
        metrics::set_live_orders(self.book.order_count());
    }

    fn reached_cap(&self) -> bool {
        self.cfg.max_msgs >= 0 && self.processed >= self.cfg.max_msgs
    }
}

/// Frame `\n`-terminated lines out of `reader` and feed them to the session
/// until EOF or the message cap. Returns total bytes read.
fn pump(reader: &mut impl Read, sess: &mut Session<'_>) -> anyhow::Result<u64> {
    let mut buf = vec![0u8; READ_BUF_BYTES];
    let mut carry: Vec<u8> = Vec::with_capacity(READ_BUF_BYTES);
    let mut bytes_total = 0u64;

    'read: loop {
        let n = reader.read(&mut buf).context("read feed")?;
        if n == 0 {
            break; // EOF
        }
        bytes_total += n as u64;
        carry.extend_from_slice(&buf[..n]);

        let mut pos = 0usize;
        while let Some(off) = carry[pos..].iter().position(|&b| b == b'\n') {
            let end = pos + off;
            sess.handle_line(&carry[pos..end]);
            pos = end + 1;
            if sess.reached_cap() {
                break 'read;
            }
        }
        carry.drain(..pos);
    }

    // trailing partial line without a newline
    if !carry.is_empty() && !sess.reached_cap() {
        sess.handle_line(&carry);
    }
    Ok(bytes_total)
}

/// One replay session: connect, stream, snapshot, and summarize. Any
/// transport error aborts the session and bubbles up to the retry loop.
pub fn run_session(
    cfg: &AppConfig,
    db_queue: Option<&Arc<SnapshotQueue>>,
    bench: Option<&mut JsonlWriter>,
) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect((cfg.host.as_str(), cfg.port))
        .with_context(|| format!("connect {}:{}", cfg.host, cfg.port))?;
    stream.set_nodelay(true).ok();
    info!("connected to {}:{}", cfg.host, cfg.port);
    metrics::inc_sessions();

    let feed = if cfg.feed_enabled {
        match JsonlWriter::open_append(&cfg.feed_path) {
            Ok(w) => {
                info!("feed log appending to {}", w.path().display());
                Some(w)
            }
            Err(e) => {
                error!("feed log disabled: {e:?}");
                None
            }
        }
    } else {
        None
    };

    let mut sess = Session::new(cfg, db_queue, feed);
    let t0 = Instant::now();
    let bytes_total = pump(&mut stream, &mut sess)?;

    // force one last snapshot when the tail did not line up with the cadence
    if sess.processed > 0
        && (cfg.snapshot_every <= 0 || sess.processed % cfg.snapshot_every != 0)
    {
        sess.snapshot();
        info!("forced final snapshot at {} events", sess.processed);
    }

    info!("{}", sess.book.to_pretty_bbo().trim_end());

    output::write_final_books(&sess.book.to_json(FULL_DEPTH), sess.book.symbol());

    if let Some(w) = sess.feed.as_mut() {
        w.flush();
    }

    let secs = t0.elapsed().as_secs_f64();
    let mps = if secs > 0.0 {
        sess.processed as f64 / secs
    } else {
        0.0
    };

    let ns_to_us = |ns: u64| ns as f64 / 1000.0;
    let ns_to_ms = |ns: u64| ns as f64 / 1e6;

    let apply_p50 = sess.apply_hist.percentile(0.50);
    let apply_p95 = sess.apply_hist.percentile(0.95);
    let apply_p99 = sess.apply_hist.percentile(0.99);
    let snap_p50 = sess.snap_hist.percentile(0.50);
    let snap_p95 = sess.snap_hist.percentile(0.95);
    let snap_p99 = sess.snap_hist.percentile(0.99);

    info!(
        "session done: bytes={} lines={} processed={} parsed_ok={} elapsed_s={:.3} throughput={:.0}/s",
        bytes_total, sess.lines_total, sess.processed, sess.parsed_ok, secs, mps
    );
    info!(
        "apply latency est (us): p50={:.3} p95={:.3} p99={:.3}",
        ns_to_us(apply_p50),
        ns_to_us(apply_p95),
        ns_to_us(apply_p99)
    );
    if cfg.snapshot_every > 0 {
        info!(
            "snapshot latency est (ms): p50={:.3} p95={:.3} p99={:.3}",
            ns_to_ms(snap_p50),
            ns_to_ms(snap_p95),
            ns_to_ms(snap_p99)
        );
    }

    if let Some(bw) = bench {
        bw.write_bench(&BenchLine {
            ts_wall_us: now_wall_us(),
            host: cfg.host.clone(),
            port: cfg.port,
            depth: cfg.depth,
            snapshot_every: cfg.snapshot_every,
            feed_enabled: cfg.feed_enabled,
            pg_enabled: db_queue.is_some(),
            processed: sess.processed,
            elapsed_s: secs,
            throughput_msgs_per_s: mps,
            apply_p50_us: ns_to_us(apply_p50),
            apply_p95_us: ns_to_us(apply_p95),
            apply_p99_us: ns_to_us(apply_p99),
            snap_p50_ms: ns_to_ms(snap_p50),
            snap_p95_ms: ns_to_ms(snap_p95),
            snap_p99_ms: ns_to_ms(snap_p99),
        });
        bw.flush();
    }

    Ok(())
}

/// Session retry loop: a failed connect or mid-session transport error is
/// logged, waited out, and retried until shutdown.
pub fn run_forever(
    cfg: &AppConfig,
    db_queue: Option<Arc<SnapshotQueue>>,
    mut bench: Option<JsonlWriter>,
    shutdown: &BarrierFlag,
) {
    while !shutdown.is_raised() {
        info!("waiting for feed {}:{} ...", cfg.host, cfg.port);
        match run_session(cfg, db_queue.as_ref(), bench.as_mut()) {
            Ok(()) => info!("session done, back to waiting..."),
            Err(e) => {
                error!("session failed: {e:?} (retry in {}ms)", RETRY_DELAY.as_millis());
                if shutdown.is_raised() {
                    break;
                }
                thread::sleep(RETRY_DELAY);
            }
        }
    }
}
