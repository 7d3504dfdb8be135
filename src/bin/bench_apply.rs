// src/bin/bench_apply.rs
//
// Offline apply-latency benchmark: replays an MBO CSV file through the book
// without any of the network or sink machinery.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::Instant;

// Pull the book modules directly into this bench to avoid compiling the full
// binary graph
#[path = "../parser.rs"]
mod parser;
#[path = "../orderbook.rs"]
mod orderbook;
#[path = "../hist.rs"]
mod hist;

use crate::hist::Pow2Histogram;
use crate::orderbook::MboBook;
use crate::parser::parse_mbo_csv_line;

struct BenchArgs {
    path: String,
    warmup: u64,
    max_msgs: i64,
    sample_every: u64,
    symbol: String,
}

impl Default for BenchArgs {
    fn default() -> Self {
        Self {
            path: "CLX5_mbo.csv".to_string(),
            warmup: 50_000,
            max_msgs: -1,
            sample_every: 10,
            symbol: String::new(),
        }
    }
}

fn parse_args() -> Option<BenchArgs> {
    let mut out = BenchArgs::default();
    let argv: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--path" if i + 1 < argv.len() => {
                out.path = argv[i + 1].clone();
                i += 1;
            }
            "--warmup" if i + 1 < argv.len() => {
                out.warmup = argv[i + 1].parse().ok()?;
                i += 1;
            }
            "--max" if i + 1 < argv.len() => {
                out.max_msgs = argv[i + 1].parse().ok()?;
                i += 1;
            }
            "--sample-every" if i + 1 < argv.len() => {
                out.sample_every = argv[i + 1].parse().ok()?;
                i += 1;
            }
            "--symbol" if i + 1 < argv.len() => {
                out.symbol = argv[i + 1].clone();
                i += 1;
            }
            "--help" => {
                println!(
                    "Usage: bench_apply [--path CLX5_mbo.csv] [--warmup N] [--max N]\n                  [--sample-every K] [--symbol SYM]"
                );
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown argument: {other}");
                return None;
            }
        }
        i += 1;
    }
    Some(out)
}

fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args() else {
        std::process::exit(2);
    };

    let file = File::open(&args.path)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {e}", args.path))?;
    let reader = BufReader::new(file);

    let mut book = MboBook::new(args.symbol.clone());
    let mut hist = Pow2Histogram::new();

    let mut warmed: u64 = 0;
    let mut processed: u64 = 0;
    let mut measuring = false;
    let mut t0 = Instant::now();

    for line in reader.lines() {
        let line = line?;
        if args.max_msgs >= 0 && (warmed + processed) as i64 >= args.max_msgs {
            break;
        }
        let Some(e) = parse_mbo_csv_line(&line) else {
            continue;
        };

        if warmed < args.warmup {
            book.apply(&e);
            warmed += 1;
            continue;
        }
        if !measuring {
            measuring = true;
            t0 = Instant::now();
        }

        let sample = args.sample_every <= 1 || processed % args.sample_every == 0;
        if sample {
            let s = Instant::now();
            book.apply(&e);
            hist.add(s.elapsed().as_nanos() as u64);
        } else {
            book.apply(&e);
        }
        processed += 1;
    }

    let secs = if measuring {
        t0.elapsed().as_secs_f64()
    } else {
        0.0
    };
    let mps = if secs > 0.0 {
        processed as f64 / secs
    } else {
        0.0
    };

    let p50 = hist.percentile(0.50);
    let p95 = hist.percentile(0.95);
    let p99 = hist.percentile(0.99);

    println!("Warmup applied: {warmed}");
    println!("Measured applied: {processed}");
    println!("Throughput: {} msg/s", mps as u64);
    println!("Apply latency est (ns): p50={p50} p95={p95} p99={p99}");
    println!(
        "Apply latency est (us): p50={} p95={} p99={}",
        p50 as f64 / 1000.0,
        p95 as f64 / 1000.0,
        p99 as f64 / 1000.0
    );

    Ok(())
}
