// src/main.rs
mod config;
mod dbqueue;
mod hist;
mod jsonl;
mod metrics;
mod orderbook;
mod output;
mod parser;
mod pg;
mod pipeline;
mod store;
mod util;
mod ws_server;

use std::sync::Arc;
use std::thread;

use log::{error, info};

use crate::config::AppConfig;
use crate::dbqueue::SnapshotQueue;
use crate::jsonl::JsonlWriter;
use crate::pg::PgWriter;
use crate::util::BarrierFlag;

/// Capacity of the queue between the pipeline and the database writer.
const DB_QUEUE_CAP: usize = 20_000;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let cfg = AppConfig::from_args(&args)?;
    info!("config: {cfg:?}");

    let shutdown = Arc::new(BarrierFlag::default());
    {
        let s = shutdown.clone();
        ctrlc::set_handler(move || {
            s.raise();
        })?;
    }

    if let Some(bind) = &cfg.metrics_bind {
        metrics::spawn_http(bind.clone());
    }

    // Push server; a failed bind is fatal at startup.
    let _ws_handle = ws_server::spawn(cfg.ws_port, cfg.push_ms)?;
    info!(
        "push server listening on port {} (push every {} ms)",
        cfg.ws_port, cfg.push_ms
    );

    if cfg.feed_enabled {
        info!("feed log enabled, path={}", cfg.feed_path.display());
    } else {
        info!("feed log disabled (set FEED_ENABLED=1)");
    }

    // Database writer: one thread owning the connection and its queue.
    let (db_queue, pg_handle) = match &cfg.pg_conninfo {
        Some(conninfo) => {
            let mut writer = PgWriter::connect(conninfo);
            let queue = Arc::new(SnapshotQueue::new(DB_QUEUE_CAP));
            let q = queue.clone();
            let handle = thread::Builder::new()
                .name("pg-writer".into())
                .spawn(move || {
                    while let Some(item) = q.pop_blocking() {
                        let ok = writer.write_snapshot(item.ts_us, &item.symbol, &item.tob);
                        metrics::inc_db_write(ok);
                    }
                    info!("pg writer thread exit");
                })
                .expect("spawn pg writer");
            (Some(queue), Some(handle))
        }
        None => {
            info!("pg disabled (set PG_CONNINFO)");
            (None, None)
        }
    };

    let bench = match JsonlWriter::open_append(&cfg.bench_log_path) {
        Ok(w) => {
            info!("bench logging to {}", w.path().display());
            Some(w)
        }
        Err(e) => {
            error!("bench log disabled: {e:?}");
            None
        }
    };

    pipeline::run_forever(&cfg, db_queue.clone(), bench, &shutdown);

    // Clean shutdown: drain pending DB writes, then join the writer.
    if let Some(q) = db_queue {
        q.stop();
    }
    if let Some(h) = pg_handle {
        let _ = h.join();
    }
    info!("clean shutdown");
    Ok(())
}
