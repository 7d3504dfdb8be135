// src/parser.rs
//
// MBO CSV line format:
// ts_recv,ts_event,rtype,publisher_id,instrument_id,action,side,price,size,
// channel_id,order_id,flags,ts_in_delta,sequence,symbol
use smallvec::SmallVec;

/// Book mutation carried by an event. Unrecognized action bytes map to
/// `None`, which the book ignores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Cancel,
    Modify,
    Clear,
    Trade,
    Fill,
    None,
}

impl Action {
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'A' => Action::Add,
            b'C' => Action::Cancel,
            b'M' => Action::Modify,
            b'R' => Action::Clear,
            b'T' => Action::Trade,
            b'F' => Action::Fill,
            _ => Action::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
    None,
}

impl Side {
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'B' => Side::Bid,
            b'A' => Side::Ask,
            _ => Side::None,
        }
    }
}

/// One parsed MBO event. Prices are fixed-point ticks of 1e-4 dollars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MboEvent {
    pub ts_recv: String,
    pub ts_event: String,
    pub publisher_id: i32,
    pub instrument_id: i32,
    pub action: Action,
    pub side: Side,
    pub price: i64,
    pub size: i32,
    pub order_id: i64,
    pub flags: u32,
    pub symbol: String,
}

/// Dollars-to-ticks scale: tick size 1e-4.
pub const PRICE_SCALE: f64 = 10_000.0;

/// Parse one CSV line into an event. Returns `None` for header lines, short
/// lines, and lines whose critical numeric fields do not parse. A single
/// trailing `\r` is stripped. Quoted fields are not handled; MBO CSV does not
/// contain them.
pub fn parse_mbo_csv_line(line: &str) -> Option<MboEvent> {
    let s = line.strip_suffix('\r').unwrap_or(line);
    if s.is_empty() {
        return None;
    }
    if s.starts_with("ts_recv,") {
        return None;
    }

    let f: SmallVec<[&str; 16]> = s.split(',').collect();
    if f.len() < 15 {
        return None;
    }

    let publisher_id: i32 = f[3].parse().ok()?;
    let instrument_id: i32 = f[4].parse().ok()?;

    // price arrives as decimal dollars, e.g. "64.83"
    let px_dollars: f64 = f[7].parse().ok()?;
    let price = (px_dollars * PRICE_SCALE).round() as i64;

    let size: i32 = f[8].parse().ok()?;
    let order_id: i64 = f[10].parse().ok()?;
    let flags: u32 = f[11].parse().ok()?;

    let action = Action::from_byte(f[5].bytes().next().unwrap_or(b'N'));
    let side = Side::from_byte(f[6].bytes().next().unwrap_or(b'N'));

    Some(MboEvent {
        ts_recv: f[0].to_string(),
        ts_event: f[1].to_string(),
        publisher_id,
        instrument_id,
        action,
        side,
        price,
        size,
        order_id,
        flags,
        symbol: f[14].to_string(),
    })
}
