//! Seeded subsetting of cleaned records.
//!
//! Two modes, both reproducible for a given seed and input order:
//! a Bernoulli pass that keeps each record with probability `sample_rate`,
//! and a reservoir cap that keeps a uniform subset of at most `limit` records.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::PipelineError;

/// Independent keep/skip decision per record.
#[derive(Debug, Clone)]
pub struct Sampler {
    rate: f64,
    rng: StdRng,
}

impl Sampler {
    /// `rate` must lie in `(0, 1]`; NaN is rejected.
    pub fn new(rate: f64, seed: u64) -> Result<Self, PipelineError> {
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "sample_rate must be in (0, 1], got {rate}"
            )));
        }
        Ok(Self {
            rate,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn keep(&mut self) -> bool {
        if self.rate >= 1.0 {
            return true;
        }
        self.rng.gen_bool(self.rate)
    }
}

/// Algorithm R reservoir. Items come back in the order they were offered.
#[derive(Debug, Clone)]
pub struct Reservoir<T> {
    limit: usize,
    seen: u64,
    items: Vec<(u64, T)>,
    rng: StdRng,
}

impl<T> Reservoir<T> {
    pub fn new(limit: usize, seed: u64) -> Self {
        Self {
            limit,
            seen: 0,
            items: Vec::with_capacity(limit.min(1 << 16)),
            // Distinct stream from the Bernoulli sampler sharing the seed.
            rng: StdRng::seed_from_u64(seed.wrapping_add(0x9e37_79b9_7f4a_7c15)),
        }
    }

    pub fn offer(&mut self, item: T) {
        let index = self.seen;
        self.seen += 1;
        if self.items.len() < self.limit {
            self.items.push((index, item));
            return;
        }
        let slot = self.rng.gen_range(0..=index);
        if let Ok(slot) = usize::try_from(slot)
            && slot < self.limit
        {
            self.items[slot] = (index, item);
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn discarded(&self) -> u64 {
        self.seen - self.items.len() as u64
    }

    pub fn into_ordered(mut self) -> Vec<T> {
        self.items.sort_by_key(|(index, _)| *index);
        self.items.into_iter().map(|(_, item)| item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_rate_keeps_everything() {
        let mut sampler = Sampler::new(1.0, 1).expect("rate");
        assert!((0..1000).all(|_| sampler.keep()));
    }

    #[test]
    fn same_seed_same_decisions() {
        let mut a = Sampler::new(0.3, 99).expect("rate");
        let mut b = Sampler::new(0.3, 99).expect("rate");
        let left = (0..500).map(|_| a.keep()).collect::<Vec<_>>();
        let right = (0..500).map(|_| b.keep()).collect::<Vec<_>>();
        assert_eq!(left, right);
        let kept = left.iter().filter(|k| **k).count();
        assert!(kept > 50 && kept < 300, "kept {kept} of 500 at rate 0.3");
    }

    #[test]
    fn nan_and_out_of_range_rates_are_rejected() {
        for rate in [f64::NAN, 0.0, -1.0, 1.5, f64::INFINITY] {
            assert!(
                matches!(Sampler::new(rate, 7), Err(PipelineError::InvalidConfig(_))),
                "rate {rate} should be rejected"
            );
        }
    }

    #[test]
    fn reservoir_caps_and_preserves_order() {
        let mut reservoir = Reservoir::new(10, 42);
        for value in 0..1000u32 {
            reservoir.offer(value);
        }
        assert_eq!(reservoir.seen(), 1000);
        assert_eq!(reservoir.discarded(), 990);
        let kept = reservoir.into_ordered();
        assert_eq!(kept.len(), 10);
        assert!(kept.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn reservoir_under_limit_keeps_all() {
        let mut reservoir = Reservoir::new(10, 42);
        for value in 0..4u32 {
            reservoir.offer(value);
        }
        assert_eq!(reservoir.into_ordered(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn reservoir_is_reproducible() {
        let run = |seed| {
            let mut reservoir = Reservoir::new(5, seed);
            for value in 0..200u32 {
                reservoir.offer(value);
            }
            reservoir.into_ordered()
        };
        assert_eq!(run(7), run(7));
    }
}
