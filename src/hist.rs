// src/hist.rs

const K: usize = 64;

/// Online latency histogram with power-of-two buckets: a sample of `ns`
/// nanoseconds lands in bucket `floor(log2(ns))` (zero in bucket 0, values
/// at or above 2^63 in bucket 63). Constant-time insert; percentile queries
/// walk the 64 counters and return an upper-bound estimate.
///
/// Single writer; concurrent readers may observe a torn snapshot, which is
/// acceptable for a diagnostic.
#[derive(Debug, Clone)]
pub struct Pow2Histogram {
    counts: [u64; K],
    n: u64,
}

impl Default for Pow2Histogram {
    fn default() -> Self {
        Self { counts: [0; K], n: 0 }
    }
}

impl Pow2Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn bucket(ns: u64) -> usize {
        if ns == 0 {
            return 0;
        }
        63 - ns.leading_zeros() as usize
    }

    #[inline]
    pub fn add(&mut self, ns: u64) {
        self.counts[Self::bucket(ns)] += 1;
        self.n += 1;
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    /// Upper-bound estimate of the `p`-th percentile in nanoseconds: `2^(b+1)`
    /// for the smallest bucket `b` whose cumulative count reaches
    /// `max(1, ceil(p * n))`. Returns 0 when the histogram is empty.
    pub fn percentile(&self, p: f64) -> u64 {
        if self.n == 0 {
            return 0;
        }
        let p = p.clamp(0.0, 1.0);
        let target = ((p * self.n as f64).ceil() as u64).max(1);

        let mut cum = 0u64;
        for (b, c) in self.counts.iter().enumerate() {
            cum += c;
            if cum >= target {
                if b >= 63 {
                    return 1u64 << 63;
                }
                return 1u64 << (b + 1);
            }
        }
        1u64 << 63
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_edges() {
        assert_eq!(Pow2Histogram::bucket(0), 0);
        assert_eq!(Pow2Histogram::bucket(1), 0);
        assert_eq!(Pow2Histogram::bucket(2), 1);
        assert_eq!(Pow2Histogram::bucket(3), 1);
        assert_eq!(Pow2Histogram::bucket(4), 2);
        assert_eq!(Pow2Histogram::bucket(u64::MAX), 63);
        assert_eq!(Pow2Histogram::bucket(1 << 63), 63);
    }

    #[test]
    fn empty_percentile_is_zero() {
        let h = Pow2Histogram::new();
        assert_eq!(h.percentile(0.5), 0);
    }

    #[test]
    fn percentile_upper_bounds_constant_sample() {
        let mut h = Pow2Histogram::new();
        for _ in 0..100 {
            h.add(1000); // bucket 9 (512..1023)
        }
        assert_eq!(h.count(), 100);
        let p50 = h.percentile(0.5);
        assert!(p50 >= 1000);
        assert_eq!(p50, 1 << 10);
    }

    #[test]
    fn percentiles_are_monotonic() {
        let mut h = Pow2Histogram::new();
        for i in 0..10_000u64 {
            h.add(i * 37 % 100_000);
        }
        let mut last = 0;
        for p in [0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 0.95, 0.99, 1.0] {
            let v = h.percentile(p);
            assert!(v >= last, "p={p}: {v} < {last}");
            last = v;
        }
    }

    #[test]
    fn split_sample_percentiles() {
        let mut h = Pow2Histogram::new();
        for _ in 0..90 {
            h.add(100); // bucket 6
        }
        for _ in 0..10 {
            h.add(1 << 20); // bucket 20
        }
        assert_eq!(h.percentile(0.5), 1 << 7);
        assert_eq!(h.percentile(0.99), 1 << 21);
    }

    #[test]
    fn extreme_values_saturate_top_bucket() {
        let mut h = Pow2Histogram::new();
        h.add(u64::MAX);
        assert_eq!(h.percentile(0.5), 1 << 63);
    }

    #[test]
    fn tiny_sample_uses_floor_of_one() {
        let mut h = Pow2Histogram::new();
        h.add(0);
        // p ~ 0 still targets the first sample
        assert_eq!(h.percentile(0.0), 2);
    }
}
