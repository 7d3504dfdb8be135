// src/store.rs
//
// Process-wide "latest snapshot" store shared between the replay pipeline
// (single writer) and the push server's per-client timers (many readers).
// Values are immutable shared strings; `publish` always installs a fresh
// `Arc`, so `Arc::ptr_eq` between two loads is a valid "nothing new" check.
use std::sync::{Arc, RwLock};

use hashbrown::HashMap;
use once_cell::sync::Lazy;

static BY_SYMBOL: Lazy<RwLock<HashMap<String, Arc<String>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

static GLOBAL: Lazy<RwLock<Arc<String>>> =
    Lazy::new(|| RwLock::new(Arc::new("{}".to_string())));

/// Replace the latest snapshot for `symbol`. Readers holding the previous
/// value keep it alive until they drop their clone.
pub fn publish(symbol: &str, s: String) {
    let p = Arc::new(s);
    let mut map = BY_SYMBOL.write().unwrap();
    map.insert(symbol.to_string(), p);
}

/// Replace the global fallback snapshot.
pub fn publish_global(s: String) {
    let p = Arc::new(s);
    *GLOBAL.write().unwrap() = p;
}

/// Latest snapshot for `symbol`, or the global fallback. Never empty.
pub fn load(symbol: &str) -> Arc<String> {
    let map = BY_SYMBOL.read().unwrap();
    if let Some(p) = map.get(symbol) {
        return p.clone();
    }
    drop(map);
    GLOBAL.read().unwrap().clone()
}

/// The global fallback snapshot.
pub fn load_global() -> Arc<String> {
    GLOBAL.read().unwrap().clone()
}
