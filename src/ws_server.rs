// src/ws_server.rs
use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use tungstenite::{accept, Message, WebSocket};

use crate::metrics;
use crate::store;

/// Granularity of the per-client loop: the socket read timeout that
/// multiplexes control-frame reads with the push timer.
const READ_SLICE_MS: u64 = 20;

/// Per-connection session state, updated by control frames.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionState {
    symbol: String,
    depth: i64,
    push_ms: i64,
}

impl SessionState {
    fn new(default_push_ms: u64) -> Self {
        Self {
            symbol: "CLX5".to_string(),
            depth: 10,
            push_ms: default_push_ms as i64,
        }
    }

    /// Apply a `subscribe`/`update` control message. Returns true when the
    /// message was recognized (and deserves an ack). Partial updates are
    /// allowed; out-of-range values are clamped; malformed input is ignored.
    fn apply_control(&mut self, msg: &str) -> bool {
        let Some(ty) = string_value_after_key(msg, "type") else {
            return false;
        };
        if ty != "subscribe" && ty != "update" {
            return false;
        }

        if let Some(sym) = string_value_after_key(msg, "symbol") {
            if !sym.is_empty() {
                self.symbol = sym;
            }
        }
        if let Some(d) = int_value_after_key(msg, "depth") {
            if (1..=200).contains(&d) {
                self.depth = d;
            }
        }
        if let Some(pm) = int_value_after_key(msg, "push_ms") {
            self.push_ms = pm.clamp(10, 5000);
        }
        true
    }

    fn ack_json(&self) -> String {
        format!(
            "{{\"type\":\"ack\",\"symbol\":\"{}\",\"depth\":{},\"push_ms\":{}}}",
            self.symbol, self.depth, self.push_ms
        )
    }
}

// Intentionally tiny non-nesting JSON probe: find the quoted key literally
// and read the primitive after the colon. Escaped strings are not handled;
// symbols are short exchange ASCII.

fn string_value_after_key(s: &str, key: &str) -> Option<String> {
    let needle = format!("\"{key}\"");
    let kpos = s.find(&needle)?;
    let rest = &s[kpos + needle.len()..];
    let cpos = rest.find(':')?;
    let mut rest = rest[cpos + 1..].trim_start();
    if !rest.starts_with('"') {
        return None;
    }
    rest = &rest[1..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn int_value_after_key(s: &str, key: &str) -> Option<i64> {
    let needle = format!("\"{key}\"");
    let kpos = s.find(&needle)?;
    let rest = &s[kpos + needle.len()..];
    let cpos = rest.find(':')?;
    let rest = rest[cpos + 1..].trim_start();

    let (neg, digits) = match rest.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, rest),
    };
    let mut val: i64 = 0;
    let mut seen = false;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        seen = true;
        val = val * 10 + (b - b'0') as i64;
        if val > 1_000_000_000 {
            break;
        }
    }
    if !seen {
        return None;
    }
    Some(if neg { -val } else { val })
}

/// Bind the push listener; connections are served by one thread each.
pub fn spawn(ws_port: u16, default_push_ms: u64) -> anyhow::Result<thread::JoinHandle<()>> {
    let listener =
        TcpListener::bind(("0.0.0.0", ws_port)).context("bind push-server listener")?;
    let handle = thread::Builder::new()
        .name("ws-push".into())
        .spawn(move || run_listener(listener, default_push_ms))
        .expect("spawn ws listener");
    Ok(handle)
}

fn run_listener(listener: TcpListener, default_push_ms: u64) {
    for stream in listener.incoming().flatten() {
        thread::spawn(move || {
            metrics::inc_ws_clients(1);
            let r = handle_client(stream, default_push_ms);
            metrics::inc_ws_clients(-1);
            if let Err(e) = r {
                log::warn!("ws client error: {e:?}");
            }
        });
    }
}

fn handle_client(stream: TcpStream, default_push_ms: u64) -> anyhow::Result<()> {
    let mut ws: WebSocket<TcpStream> = accept(stream)?;
    // Short read timeout so one thread serves both the control plane and the
    // push timer.
    ws.get_ref()
        .set_read_timeout(Some(Duration::from_millis(READ_SLICE_MS)))?;

    let mut state = SessionState::new(default_push_ms);
    let mut last_sent: Option<Arc<String>> = None;
    let mut next_push = Instant::now();

    loop {
        match ws.read() {
            Ok(Message::Text(txt)) => {
                if state.apply_control(&txt) {
                    ws.send(Message::Text(state.ack_json()))?;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                break
            }
            Err(e) => return Err(e.into()),
        }

        // Each tick sends the newest snapshot or nothing; a slow send simply
        // delays the next tick, so intermediate snapshots are dropped.
        if Instant::now() >= next_push {
            let cur = store::load(&state.symbol);
            let unchanged = last_sent
                .as_ref()
                .map(|prev| Arc::ptr_eq(prev, &cur))
                .unwrap_or(false);
            if !unchanged {
                ws.send(Message::Text(cur.as_str().to_string()))?;
                metrics::inc_ws_frames();
                last_sent = Some(cur);
            }
            next_push = Instant::now() + Duration::from_millis(state.push_ms.max(1) as u64);
        }
    }
    Ok(())
}
