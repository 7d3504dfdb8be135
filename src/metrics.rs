// src/metrics.rs
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::net::ToSocketAddrs;
use std::thread;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static FEED_LINES: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("feed_lines_total", "Complete lines framed from the feed")
        .expect("feed_lines_total");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static PARSE_REJECTS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("parse_rejects_total", "Lines dropped by the CSV parser")
        .expect("parse_rejects_total");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static EVENTS_APPLIED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("events_applied_total", "Events applied to the book")
        .expect("events_applied_total");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static SNAPSHOTS_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "snapshots_published_total",
        "Snapshots published to the latest-snapshot store",
    )
    .expect("snapshots_published_total");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static SESSIONS: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("replay_sessions_total", "Replay sessions started")
        .expect("replay_sessions_total");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static DB_WRITES: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("db_writes_total", "Database snapshot inserts by outcome"),
        &["outcome"],
    )
    .expect("db_writes_total");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static BOOK_LIVE_ORDERS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("book_live_orders", "Live orders resting in the book")
        .expect("book_live_orders");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static WS_CLIENTS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("ws_clients", "Connected push-server clients").expect("ws_clients");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static WS_FRAMES: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("ws_frames_total", "Snapshot frames sent to push clients")
        .expect("ws_frames_total");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

pub fn inc_feed_lines() {
    FEED_LINES.inc();
}
pub fn inc_parse_rejects() {
    PARSE_REJECTS.inc();
}
pub fn inc_events_applied() {
    EVENTS_APPLIED.inc();
}
pub fn inc_snapshots_published() {
    SNAPSHOTS_PUBLISHED.inc();
}
pub fn inc_sessions() {
    SESSIONS.inc();
}
pub fn inc_db_write(ok: bool) {
    DB_WRITES
        .with_label_values(&[if ok { "ok" } else { "error" }])
        .inc();
}
pub fn set_live_orders(n: usize) {
    BOOK_LIVE_ORDERS.set(n as i64);
}
pub fn inc_ws_clients(delta: i64) {
    WS_CLIENTS.add(delta);
}
pub fn inc_ws_frames() {
    WS_FRAMES.inc();
}

/// Serve the Prometheus exposition plus liveness endpoints. Best-effort
/// side-channel; never touches the replay hot path.
pub fn spawn_http<A: ToSocketAddrs + Send + 'static>(addr: A) -> thread::JoinHandle<()> {
    let addr_string = addr
        .to_socket_addrs()
        .ok()
        .and_then(|mut it| it.next())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "0.0.0.0:9100".to_string());

    thread::spawn(move || {
        let server = match tiny_http::Server::http(&addr_string) {
            Ok(s) => s,
            Err(e) => {
                log::error!("metrics http failed to bind {addr_string}: {e}");
                return;
            }
        };
        log::info!("prometheus metrics listening on http://{addr_string}/metrics");
        let encoder = TextEncoder::new();
        loop {
            if let Ok(req) = server.recv() {
                let url = req.url().to_string();
                if url == "/metrics" {
                    let metric_families = REGISTRY.gather();
                    let mut buf = Vec::with_capacity(16 * 1024);
                    encoder.encode(&metric_families, &mut buf).ok();
                    let resp = tiny_http::Response::from_data(buf)
                        .with_status_code(200)
                        .with_header(
                            tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                &b"text/plain; version=0.0.4"[..],
                            )
                            .unwrap(),
                        );
                    let _ = req.respond(resp);
                } else if url == "/live" || url == "/healthz" {
                    let _ =
                        req.respond(tiny_http::Response::from_string("OK").with_status_code(200));
                } else {
                    let _ = req.respond(tiny_http::Response::empty(404));
                }
            }
        }
    })
}
