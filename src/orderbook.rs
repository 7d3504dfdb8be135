// src/orderbook.rs
use crate::parser::{Action, MboEvent, Side, PRICE_SCALE};
use hashbrown::HashMap;
use slab::Slab;
use std::collections::BTreeMap;
use std::fmt::Write as _;

type Handle = usize;

#[derive(Clone, Debug)]
struct Node {
    order_id: i64,
    price: i64,
    qty: i32,
    side: Side,
    prev: Option<Handle>,
    next: Option<Handle>,
}

impl Node {
    #[inline]
    fn new(order_id: i64, price: i64, qty: i32, side: Side) -> Self {
        Self { order_id, price, qty, side, prev: None, next: None }
    }
}

/// One price level: FIFO of resting orders, oldest at head.
#[derive(Clone, Debug, Default)]
struct Level {
    head: Option<Handle>,
    tail: Option<Handle>,
    total_qty: i64,
    count: usize,
}

impl Level {
    #[inline]
    fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate handles FIFO from head to tail.
    fn iter_fifo<'a>(&self, orders: &'a Slab<Node>) -> LevelIter<'a> {
        LevelIter { orders, cur: self.head }
    }
}

struct LevelIter<'a> {
    orders: &'a Slab<Node>,
    cur: Option<Handle>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = Handle;
    fn next(&mut self) -> Option<Self::Item> {
        if let Some(h) = self.cur {
            self.cur = self.orders[h].next;
            Some(h)
        } else {
            None
        }
    }
}

/// Aggregated best bid/offer in display units (dollars).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TopOfBook {
    pub has_bid: bool,
    pub bid_px: f64,
    pub bid_sz: i64,
    pub has_ask: bool,
    pub ask_px: f64,
    pub ask_sz: i64,
    /// Valid only when both sides are present.
    pub mid: f64,
    pub spread: f64,
}

/// Single-symbol MBO book: sorted price ladders with intra-level FIFO
/// priority and an order-id index for O(1) cancel/modify-in-place.
///
/// `apply` never fails; events the book cannot act on are no-ops.
pub struct MboBook {
    symbol: String,
    bids: BTreeMap<i64, Level>,
    asks: BTreeMap<i64, Level>,
    orders: Slab<Node>,
    index: HashMap<i64, Handle>,
}

impl MboBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: Slab::new(),
            index: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    #[inline]
    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<i64, Level> {
        match side {
            Side::Bid => &mut self.bids,
            _ => &mut self.asks,
        }
    }

    pub fn apply(&mut self, e: &MboEvent) {
        match e.action {
            // Trades and fills do not consume resting quantity in this feed;
            // the matching cancel/modify events carry the book change.
            Action::Trade | Action::Fill | Action::None => {}
            Action::Clear => self.clear(),
            // add/cancel/modify need a directed side
            Action::Add | Action::Cancel | Action::Modify if e.side == Side::None => {}
            Action::Add => self.add(e),
            Action::Cancel => self.cancel(e),
            Action::Modify => self.modify(e),
        }
    }

    fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.orders.clear();
        self.index.clear();
    }

    /// Append node `h` to the tail of its (side, price) level, creating the
    /// level if needed.
    fn link_tail(&mut self, h: Handle) {
        let (side, price, qty) = {
            let n = &self.orders[h];
            (n.side, n.price, n.qty)
        };
        let prev_tail = {
            let lvl = self.levels_mut(side).entry(price).or_default();
            lvl.tail
        };
        if let Some(t) = prev_tail {
            self.orders[t].next = Some(h);
        }
        {
            let n = &mut self.orders[h];
            n.prev = prev_tail;
            n.next = None;
        }
        let lvl = self.levels_mut(side).entry(price).or_default();
        if prev_tail.is_none() {
            lvl.head = Some(h);
        }
        lvl.tail = Some(h);
        lvl.count += 1;
        lvl.total_qty += qty as i64;
    }

    /// Detach node `h` from its level, dropping the level if it empties.
    /// The slab slot and index entry are left to the caller.
    fn unlink(&mut self, h: Handle) {
        let (side, price, prev, next, qty) = {
            let n = &self.orders[h];
            (n.side, n.price, n.prev, n.next, n.qty)
        };
        if let Some(p) = prev {
            self.orders[p].next = next;
        }
        if let Some(nx) = next {
            self.orders[nx].prev = prev;
        }
        let remove_level = if let Some(lvl) = self.levels_mut(side).get_mut(&price) {
            if prev.is_none() {
                lvl.head = next;
            }
            if next.is_none() {
                lvl.tail = prev;
            }
            lvl.count = lvl.count.saturating_sub(1);
            lvl.total_qty -= qty as i64;
            lvl.is_empty()
        } else {
            false
        };
        if remove_level {
            self.levels_mut(side).remove(&price);
        }
    }

    fn remove_order(&mut self, h: Handle) {
        self.unlink(h);
        let n = self.orders.remove(h);
        self.index.remove(&n.order_id);
    }

    fn set_qty(&mut self, h: Handle, new_qty: i32) {
        let (side, price, old_qty) = {
            let n = &self.orders[h];
            (n.side, n.price, n.qty)
        };
        self.orders[h].qty = new_qty;
        if let Some(lvl) = self.levels_mut(side).get_mut(&price) {
            lvl.total_qty += new_qty as i64 - old_qty as i64;
        }
    }

    fn add(&mut self, e: &MboEvent) {
        // A stale duplicate id means we missed its removal; drop the old
        // entry before inserting the new one.
        if let Some(&h) = self.index.get(&e.order_id) {
            self.remove_order(h);
        }
        let h = self
            .orders
            .insert(Node::new(e.order_id, e.price, e.size, e.side));
        self.link_tail(h);
        self.index.insert(e.order_id, h);
    }

    fn cancel(&mut self, e: &MboEvent) {
        let Some(&h) = self.index.get(&e.order_id) else {
            return;
        };
        let remaining = (self.orders[h].qty - e.size).max(0);
        if remaining == 0 {
            self.remove_order(h);
        } else {
            self.set_qty(h, remaining);
        }
    }

    fn modify(&mut self, e: &MboEvent) {
        let Some(&h) = self.index.get(&e.order_id) else {
            // Unknown id: the venue reports replaces of unseen orders as
            // modifies, so treat it as an add.
            self.add(e);
            return;
        };
        if self.orders[h].side != e.side {
            return;
        }
        let (old_px, old_qty) = {
            let n = &self.orders[h];
            (n.price, n.qty)
        };
        if e.price != old_px {
            // Price change forfeits queue priority; the replacement carries
            // the event's size.
            self.unlink(h);
            {
                let n = &mut self.orders[h];
                n.price = e.price;
                n.qty = e.size;
            }
            self.link_tail(h);
        } else if e.size > old_qty {
            // Size increase forfeits priority at the same price.
            self.unlink(h);
            self.orders[h].qty = e.size;
            self.link_tail(h);
        } else {
            self.set_qty(h, e.size);
        }
    }

    pub fn top_of_book(&self) -> TopOfBook {
        let mut t = TopOfBook::default();
        if let Some((px, lvl)) = self.bids.iter().next_back() {
            t.has_bid = true;
            t.bid_px = *px as f64 / PRICE_SCALE;
            t.bid_sz = lvl.total_qty;
        }
        if let Some((px, lvl)) = self.asks.iter().next() {
            t.has_ask = true;
            t.ask_px = *px as f64 / PRICE_SCALE;
            t.ask_sz = lvl.total_qty;
        }
        if t.has_bid && t.has_ask {
            t.mid = 0.5 * (t.bid_px + t.ask_px);
            t.spread = t.ask_px - t.bid_px;
        }
        t
    }

    fn write_level(out: &mut String, px: i64, lvl: &Level) {
        let _ = write!(
            out,
            "{{\"px\":{},\"px_f\":{:.4},\"sz\":{},\"ct\":{}}}",
            px,
            px as f64 / PRICE_SCALE,
            lvl.total_qty,
            lvl.count
        );
    }

    /// Depth-limited snapshot, best-first on both sides.
    pub fn to_json(&self, depth: usize) -> String {
        let mut out = String::with_capacity(128 + 64 * depth.min(64));
        out.push('{');
        if !self.symbol.is_empty() {
            let _ = write!(out, "\"symbol\":\"{}\",", self.symbol);
        }
        out.push_str("\"bids\":[");
        for (i, (px, lvl)) in self.bids.iter().rev().take(depth).enumerate() {
            if i > 0 {
                out.push(',');
            }
            Self::write_level(&mut out, *px, lvl);
        }
        out.push_str("],\"asks\":[");
        for (i, (px, lvl)) in self.asks.iter().take(depth).enumerate() {
            if i > 0 {
                out.push(',');
            }
            Self::write_level(&mut out, *px, lvl);
        }
        out.push_str("]}");
        out
    }

    /// Best level per side only; absent sides are `null`.
    pub fn to_json_bbo(&self) -> String {
        let mut out = String::with_capacity(160);
        out.push('{');
        if !self.symbol.is_empty() {
            let _ = write!(out, "\"symbol\":\"{}\",", self.symbol);
        }
        out.push_str("\"bid\":");
        match self.bids.iter().next_back() {
            Some((px, lvl)) => Self::write_level(&mut out, *px, lvl),
            None => out.push_str("null"),
        }
        out.push_str(",\"ask\":");
        match self.asks.iter().next() {
            Some((px, lvl)) => Self::write_level(&mut out, *px, lvl),
            None => out.push_str("null"),
        }
        out.push('}');
        out
    }

    /// Diagnostic two-line BBO, ask over bid.
    pub fn to_pretty_bbo(&self) -> String {
        let mut out = String::with_capacity(96);
        let _ = writeln!(out, "{} Aggregated BBO", self.symbol);
        match self.asks.iter().next() {
            Some((px, lvl)) => {
                let _ = writeln!(
                    out,
                    "     {} @ {:.2} |  {} order(s)",
                    lvl.total_qty,
                    *px as f64 / PRICE_SCALE,
                    lvl.count
                );
            }
            None => out.push_str("     None\n"),
        }
        match self.bids.iter().next_back() {
            Some((px, lvl)) => {
                let _ = writeln!(
                    out,
                    "     {} @ {:.2} |  {} order(s)",
                    lvl.total_qty,
                    *px as f64 / PRICE_SCALE,
                    lvl.count
                );
            }
            None => out.push_str("     None\n"),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(action: Action, side: Side, price: i64, size: i32, order_id: i64) -> MboEvent {
        MboEvent {
            ts_recv: String::new(),
            ts_event: String::new(),
            publisher_id: 1,
            instrument_id: 1,
            action,
            side,
            price,
            size,
            order_id,
            flags: 0,
            symbol: "CLX5".to_string(),
        }
    }

    /// Structural invariants that must hold after every apply.
    fn check_invariants(b: &MboBook) {
        let mut seen = 0usize;
        for (ladder, side) in [(&b.bids, Side::Bid), (&b.asks, Side::Ask)] {
            for (px, lvl) in ladder.iter() {
                assert!(!lvl.is_empty(), "empty level at {px}");
                let mut sum = 0i64;
                let mut ct = 0usize;
                for h in lvl.iter_fifo(&b.orders) {
                    let n = &b.orders[h];
                    assert_eq!(n.price, *px);
                    assert_eq!(n.side, side);
                    assert_eq!(b.index.get(&n.order_id), Some(&h));
                    sum += n.qty as i64;
                    ct += 1;
                }
                assert_eq!(sum, lvl.total_qty);
                assert_eq!(ct, lvl.count);
                seen += ct;
            }
        }
        assert_eq!(seen, b.index.len());
    }

    fn level_ids(b: &MboBook, side: Side, px: i64) -> Vec<i64> {
        let ladder = match side {
            Side::Bid => &b.bids,
            _ => &b.asks,
        };
        ladder
            .get(&px)
            .map(|lvl| lvl.iter_fifo(&b.orders).map(|h| b.orders[h].order_id).collect())
            .unwrap_or_default()
    }

    #[test]
    fn add_bid_exact_snapshot_json() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 6_483_000, 5, 1));
        assert_eq!(
            b.to_json(1),
            "{\"symbol\":\"CLX5\",\"bids\":[{\"px\":6483000,\"px_f\":648.3000,\"sz\":5,\"ct\":1}],\"asks\":[]}"
        );
        check_invariants(&b);
    }

    #[test]
    fn partial_cancel_reduces_in_place() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 6_483_000, 5, 1));
        b.apply(&ev(Action::Cancel, Side::Bid, 6_483_000, 2, 1));
        let lvl = b.bids.get(&6_483_000).unwrap();
        assert_eq!(lvl.total_qty, 3);
        assert_eq!(lvl.count, 1);
        check_invariants(&b);
    }

    #[test]
    fn oversize_cancel_removes_order_and_level() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 6_483_000, 5, 1));
        b.apply(&ev(Action::Cancel, Side::Bid, 6_483_000, 10, 1));
        assert!(b.bids.is_empty());
        assert!(b.index.is_empty());
        assert_eq!(b.to_json(1), "{\"symbol\":\"CLX5\",\"bids\":[],\"asks\":[]}");
        check_invariants(&b);
    }

    #[test]
    fn full_cancel_restores_pre_add_state() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Ask, 100, 7, 9));
        b.apply(&ev(Action::Cancel, Side::Ask, 100, 7, 9));
        assert!(b.asks.is_empty());
        assert_eq!(b.order_count(), 0);
        check_invariants(&b);
    }

    #[test]
    fn cancel_unknown_id_is_noop() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Cancel, Side::Bid, 100, 5, 77));
        assert!(b.bids.is_empty() && b.asks.is_empty());
    }

    #[test]
    fn size_increase_moves_to_tail() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 100, 5, 1));
        b.apply(&ev(Action::Add, Side::Bid, 100, 5, 2));
        b.apply(&ev(Action::Modify, Side::Bid, 100, 7, 1));
        assert_eq!(level_ids(&b, Side::Bid, 100), vec![2, 1]);
        let lvl = b.bids.get(&100).unwrap();
        assert_eq!(lvl.total_qty, 12);
        assert_eq!(lvl.count, 2);
        check_invariants(&b);
    }

    #[test]
    fn size_decrease_preserves_position() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Ask, 200, 5, 1));
        b.apply(&ev(Action::Add, Side::Ask, 200, 5, 2));
        b.apply(&ev(Action::Modify, Side::Ask, 200, 3, 1));
        assert_eq!(level_ids(&b, Side::Ask, 200), vec![1, 2]);
        assert_eq!(b.asks.get(&200).unwrap().total_qty, 8);
        check_invariants(&b);
    }

    #[test]
    fn same_size_same_price_modify_keeps_order() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 100, 5, 1));
        b.apply(&ev(Action::Add, Side::Bid, 100, 5, 2));
        b.apply(&ev(Action::Modify, Side::Bid, 100, 5, 1));
        assert_eq!(level_ids(&b, Side::Bid, 100), vec![1, 2]);
        check_invariants(&b);
    }

    #[test]
    fn modify_price_change_uses_event_size() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 100, 5, 1));
        b.apply(&ev(Action::Add, Side::Bid, 110, 4, 2));
        b.apply(&ev(Action::Modify, Side::Bid, 110, 9, 1));
        assert!(b.bids.get(&100).is_none());
        assert_eq!(level_ids(&b, Side::Bid, 110), vec![2, 1]);
        assert_eq!(b.bids.get(&110).unwrap().total_qty, 13);
        check_invariants(&b);
    }

    #[test]
    fn modify_unknown_id_becomes_add() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Modify, Side::Ask, 500, 3, 9));
        assert_eq!(level_ids(&b, Side::Ask, 500), vec![9]);
        let lvl = b.asks.get(&500).unwrap();
        assert_eq!(lvl.total_qty, 3);
        assert_eq!(lvl.count, 1);
        assert!(b.index.contains_key(&9));
        check_invariants(&b);
    }

    #[test]
    fn modify_side_mismatch_is_noop() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 100, 5, 1));
        b.apply(&ev(Action::Modify, Side::Ask, 100, 9, 1));
        assert_eq!(level_ids(&b, Side::Bid, 100), vec![1]);
        assert_eq!(b.bids.get(&100).unwrap().total_qty, 5);
        check_invariants(&b);
    }

    #[test]
    fn duplicate_add_replaces_stale_entry() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 100, 5, 1));
        b.apply(&ev(Action::Add, Side::Ask, 200, 3, 1));
        assert!(b.bids.is_empty());
        assert_eq!(level_ids(&b, Side::Ask, 200), vec![1]);
        assert_eq!(b.order_count(), 1);
        check_invariants(&b);
    }

    #[test]
    fn clear_resets_everything_and_is_idempotent() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 100, 5, 1));
        b.apply(&ev(Action::Add, Side::Ask, 200, 3, 2));
        b.apply(&ev(Action::Clear, Side::None, 0, 0, 0));
        assert_eq!(b.to_json(5), "{\"symbol\":\"CLX5\",\"bids\":[],\"asks\":[]}");
        assert_eq!(b.order_count(), 0);
        b.apply(&ev(Action::Clear, Side::None, 0, 0, 0));
        assert_eq!(b.to_json(5), "{\"symbol\":\"CLX5\",\"bids\":[],\"asks\":[]}");
        check_invariants(&b);
    }

    #[test]
    fn trade_fill_and_none_do_not_touch_the_book() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 100, 5, 1));
        let before = b.to_json(5);
        b.apply(&ev(Action::Trade, Side::Bid, 100, 5, 1));
        b.apply(&ev(Action::Fill, Side::Bid, 100, 5, 1));
        b.apply(&ev(Action::None, Side::Bid, 100, 5, 1));
        assert_eq!(b.to_json(5), before);
    }

    #[test]
    fn add_without_side_is_noop() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::None, 100, 5, 1));
        b.apply(&ev(Action::Cancel, Side::None, 100, 5, 1));
        b.apply(&ev(Action::Modify, Side::None, 100, 5, 1));
        assert_eq!(b.order_count(), 0);
    }

    #[test]
    fn snapshot_depth_limits_and_orders_best_first() {
        let mut b = MboBook::new("CLX5");
        for (i, px) in [100i64, 110, 120].iter().enumerate() {
            b.apply(&ev(Action::Add, Side::Bid, *px, 1, i as i64 + 1));
            b.apply(&ev(Action::Add, Side::Ask, *px + 100, 1, i as i64 + 10));
        }
        let v: serde_json::Value = serde_json::from_str(&b.to_json(2)).unwrap();
        let bids = v["bids"].as_array().unwrap();
        let asks = v["asks"].as_array().unwrap();
        assert_eq!(bids.len(), 2);
        assert_eq!(asks.len(), 2);
        assert_eq!(bids[0]["px"], 120);
        assert_eq!(bids[1]["px"], 110);
        assert_eq!(asks[0]["px"], 200);
        assert_eq!(asks[1]["px"], 210);
    }

    #[test]
    fn px_f_round_trips_to_ticks() {
        let mut b = MboBook::new("CLX5");
        for (i, px) in [1i64, 6_483_000, 12_345, 999_999_999].iter().enumerate() {
            b.apply(&ev(Action::Add, Side::Bid, *px, 1, i as i64 + 1));
        }
        let v: serde_json::Value = serde_json::from_str(&b.to_json(10)).unwrap();
        for entry in v["bids"].as_array().unwrap() {
            let px = entry["px"].as_i64().unwrap();
            let px_f = entry["px_f"].as_f64().unwrap();
            assert_eq!((px_f * PRICE_SCALE).round() as i64, px);
        }
    }

    #[test]
    fn empty_symbol_omits_field() {
        let b = MboBook::new("");
        assert_eq!(b.to_json(5), "{\"bids\":[],\"asks\":[]}");
    }

    #[test]
    fn bbo_json_null_sides() {
        let mut b = MboBook::new("CLX5");
        assert_eq!(b.to_json_bbo(), "{\"symbol\":\"CLX5\",\"bid\":null,\"ask\":null}");
        b.apply(&ev(Action::Add, Side::Bid, 6_483_000, 5, 1));
        assert_eq!(
            b.to_json_bbo(),
            "{\"symbol\":\"CLX5\",\"bid\":{\"px\":6483000,\"px_f\":648.3000,\"sz\":5,\"ct\":1},\"ask\":null}"
        );
    }

    #[test]
    fn top_of_book_mid_and_spread() {
        let mut b = MboBook::new("CLX5");
        let t = b.top_of_book();
        assert!(!t.has_bid && !t.has_ask);

        b.apply(&ev(Action::Add, Side::Bid, 1_000_000, 5, 1));
        b.apply(&ev(Action::Add, Side::Bid, 999_000, 2, 2));
        b.apply(&ev(Action::Add, Side::Ask, 1_001_000, 3, 3));
        let t = b.top_of_book();
        assert!(t.has_bid && t.has_ask);
        assert!((t.bid_px - 100.0).abs() < 1e-9);
        assert_eq!(t.bid_sz, 5);
        assert!((t.ask_px - 100.1).abs() < 1e-9);
        assert_eq!(t.ask_sz, 3);
        assert!((t.mid - 100.05).abs() < 1e-9);
        assert!((t.spread - 0.1).abs() < 1e-9);
    }

    #[test]
    fn pretty_bbo_shows_ask_over_bid() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 1_000_000, 5, 1));
        let s = b.to_pretty_bbo();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines[0], "CLX5 Aggregated BBO");
        assert_eq!(lines[1], "     None");
        assert_eq!(lines[2], "     5 @ 100.00 |  1 order(s)");
    }

    #[test]
    fn fifo_within_level_and_totals() {
        let mut b = MboBook::new("CLX5");
        b.apply(&ev(Action::Add, Side::Bid, 100, 10, 1));
        b.apply(&ev(Action::Add, Side::Bid, 100, 20, 2));
        assert_eq!(level_ids(&b, Side::Bid, 100), vec![1, 2]);
        assert_eq!(b.bids.get(&100).unwrap().total_qty, 30);

        b.apply(&ev(Action::Cancel, Side::Bid, 100, 5, 1));
        assert_eq!(b.bids.get(&100).unwrap().total_qty, 25);

        b.apply(&ev(Action::Cancel, Side::Bid, 100, 20, 2));
        let lvl = b.bids.get(&100).unwrap();
        assert_eq!(lvl.total_qty, 5);
        assert_eq!(lvl.count, 1);
        check_invariants(&b);
    }

    #[test]
    fn invariants_hold_over_mixed_sequence() {
        let mut b = MboBook::new("CLX5");
        let seq = [
            ev(Action::Add, Side::Bid, 100, 10, 1),
            ev(Action::Add, Side::Bid, 100, 20, 2),
            ev(Action::Add, Side::Ask, 105, 7, 3),
            ev(Action::Add, Side::Ask, 106, 9, 4),
            ev(Action::Modify, Side::Bid, 101, 10, 1),
            ev(Action::Cancel, Side::Ask, 105, 3, 3),
            ev(Action::Modify, Side::Ask, 106, 12, 4),
            ev(Action::Add, Side::Bid, 99, 5, 5),
            ev(Action::Cancel, Side::Bid, 100, 20, 2),
            ev(Action::Modify, Side::Bid, 99, 5, 5),
        ];
        for e in &seq {
            b.apply(e);
            check_invariants(&b);
        }
        // best bid above all other bids, best ask below all other asks
        let best_bid = *b.bids.keys().next_back().unwrap();
        assert!(b.bids.keys().all(|px| *px <= best_bid));
        let best_ask = *b.asks.keys().next().unwrap();
        assert!(b.asks.keys().all(|px| *px >= best_ask));
        assert!(best_bid < best_ask);
    }
}
