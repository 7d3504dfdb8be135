// src/pg.rs
use log::{error, info};
use postgres::types::Type;
use postgres::{Client, NoTls, Statement};

use crate::orderbook::TopOfBook;

const INSERT_SNAPSHOT: &str = "INSERT INTO snapshots \
     (ts, symbol, best_bid_px, best_bid_sz, best_ask_px, best_ask_sz, mid, spread) \
     VALUES (to_timestamp($1 / 1e6), $2, $3, $4, $5, $6, $7, $8) \
     ON CONFLICT (symbol, ts) DO NOTHING";

/// Idempotent top-of-book sink. Owns one connection and one prepared
/// statement for the process lifetime; a failed connect or prepare leaves
/// the writer permanently disabled and every `write_snapshot` returns false.
pub struct PgWriter {
    // statement before client: dropped (deallocated) first
    stmt: Option<Statement>,
    client: Option<Client>,
}

impl PgWriter {
    pub fn connect(conninfo: &str) -> Self {
        let mut client = match Client::connect(conninfo, NoTls) {
            Ok(c) => c,
            Err(e) => {
                error!("pg connection failed: {e}");
                return Self { stmt: None, client: None };
            }
        };
        let stmt = match client.prepare_typed(
            INSERT_SNAPSHOT,
            &[
                Type::FLOAT8, // ts (microseconds)
                Type::TEXT,   // symbol
                Type::FLOAT8, // best_bid_px
                Type::INT8,   // best_bid_sz
                Type::FLOAT8, // best_ask_px
                Type::INT8,   // best_ask_sz
                Type::FLOAT8, // mid
                Type::FLOAT8, // spread
            ],
        ) {
            Ok(s) => s,
            Err(e) => {
                error!("pg prepare failed: {e}");
                return Self { stmt: None, client: None };
            }
        };
        info!("pg writer connected");
        Self {
            stmt: Some(stmt),
            client: Some(client),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Insert one snapshot row. Absent sides bind NULL; mid and spread are
    /// always bound. Failures are logged and reported; the connection is not
    /// reset, so a broken session fails fast on the next call.
    pub fn write_snapshot(&mut self, ts_us: i64, symbol: &str, tob: &TopOfBook) -> bool {
        let (Some(client), Some(stmt)) = (self.client.as_mut(), self.stmt.as_ref()) else {
            return false;
        };

        let ts = ts_us as f64;
        let bid_px: Option<f64> = tob.has_bid.then_some(tob.bid_px);
        let bid_sz: Option<i64> = tob.has_bid.then_some(tob.bid_sz);
        let ask_px: Option<f64> = tob.has_ask.then_some(tob.ask_px);
        let ask_sz: Option<i64> = tob.has_ask.then_some(tob.ask_sz);

        match client.execute(
            stmt,
            &[
                &ts, &symbol, &bid_px, &bid_sz, &ask_px, &ask_sz, &tob.mid, &tob.spread,
            ],
        ) {
            Ok(_) => true,
            Err(e) => {
                error!("pg insert failed: {e}");
                false
            }
        }
    }
}
