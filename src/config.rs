// src/config.rs
use std::path::PathBuf;

use anyhow::Context;

use crate::output::public_dir;
use crate::util::env_truthy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub ws_port: u16,
    pub depth: usize,
    /// Publish a snapshot every N applied events; <= 0 disables periodic
    /// snapshots (a final one is still forced at session end).
    pub snapshot_every: i64,
    /// Stop the session after this many events; < 0 means run to EOF.
    pub max_msgs: i64,
    /// Default push-server tick, overridable per client session.
    pub push_ms: u64,
    pub feed_enabled: bool,
    pub feed_path: PathBuf,
    pub bench_log_path: PathBuf,
    pub pg_conninfo: Option<String>,
    pub metrics_bind: Option<String>,
}

pub fn usage(prog: &str) {
    eprintln!(
        "Usage: {prog} <feed_host> <feed_port> <ws_port> [depth=5] [snapshot_every=200] [max_msgs=-1] [push_ms=50]\n\
         Example: {prog} 127.0.0.1 9000 8080 50 200 -1 50\n\
         Env: PG_CONNINFO=\"host=127.0.0.1 port=5432 dbname=mbo user=postgres password=postgres\"\n\
         Env: FEED_ENABLED=1 (optional)\n\
         Env: FEED_PATH=frontend/public/snapshots_feed.jsonl (optional)\n\
         Env: BENCH_LOG_PATH=frontend/public/benchmarks.jsonl (optional)\n\
         Env: METRICS_BIND=0.0.0.0:9100 (optional)"
    );
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

type Positional = (String, u16, u16, usize, i64, i64, u64);

fn parse_positional(args: &[String]) -> anyhow::Result<Positional> {
    if args.len() < 4 {
        anyhow::bail!("expected <feed_host> <feed_port> <ws_port>");
    }
    let host = args[1].clone();
    let port: u16 = args[2].parse().with_context(|| format!("bad port {:?}", args[2]))?;
    let ws_port: u16 = args[3]
        .parse()
        .with_context(|| format!("bad ws_port {:?}", args[3]))?;
    let depth: usize = match args.get(4) {
        Some(v) => v.parse().with_context(|| format!("bad depth {v:?}"))?,
        None => 5,
    };
    let snapshot_every: i64 = match args.get(5) {
        Some(v) => v
            .parse()
            .with_context(|| format!("bad snapshot_every {v:?}"))?,
        None => 200,
    };
    let max_msgs: i64 = match args.get(6) {
        Some(v) => v.parse().with_context(|| format!("bad max_msgs {v:?}"))?,
        None => -1,
    };
    let push_ms: u64 = match args.get(7) {
        Some(v) => v.parse().with_context(|| format!("bad push_ms {v:?}"))?,
        None => 50,
    };
    Ok((host, port, ws_port, depth, snapshot_every, max_msgs, push_ms))
}

impl AppConfig {
    /// Build the configuration from `std::env::args()` plus the environment.
    /// Prints usage and fails when the three required arguments are missing.
    pub fn from_args(args: &[String]) -> anyhow::Result<Self> {
        let parsed = match parse_positional(args) {
            Ok(p) => p,
            Err(e) => {
                usage(args.first().map(String::as_str).unwrap_or("mbo-replay"));
                return Err(e);
            }
        };
        let (host, port, ws_port, depth, snapshot_every, max_msgs, push_ms) = parsed;

        let feed_path = env_nonempty("FEED_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| public_dir().join("snapshots_feed.jsonl"));
        let bench_log_path = env_nonempty("BENCH_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| public_dir().join("benchmarks.jsonl"));

        Ok(Self {
            host,
            port,
            ws_port,
            depth,
            snapshot_every,
            max_msgs,
            push_ms,
            feed_enabled: env_truthy("FEED_ENABLED"),
            feed_path,
            bench_log_path,
            pg_conninfo: env_nonempty("PG_CONNINFO"),
            metrics_bind: env_nonempty("METRICS_BIND"),
        })
    }
}
