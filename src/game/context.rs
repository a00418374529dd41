//! Explicit simulation context: the run seed and the clock.
//!
//! Components never reach for a global RNG or timer. They get an independent
//! generator per [`RngStream`] from the context, so two worlds built from the
//! same seed and clock readings evolve identically.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::rc::Rc;
use std::time::Duration;

use crate::schedule::{Clock, MonotonicClock};

/// Named generator streams derived from the run seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngStream {
    /// Food placement decisions
    Food,
    /// Initial snake placement
    Spawn,
    /// Steering fallbacks
    Steering,
}

impl RngStream {
    fn salt(self) -> u64 {
        match self {
            RngStream::Food => 0x9E37_79B9_7F4A_7C15,
            RngStream::Spawn => 0xC2B2_AE3D_27D4_EB4F,
            RngStream::Steering => 0x1656_67B1_9E37_79F9,
        }
    }
}

#[derive(Clone)]
pub struct SimContext {
    seed: u64,
    clock: Rc<dyn Clock>,
}

impl SimContext {
    /// Context backed by the wall clock
    pub fn new(seed: u64) -> Self {
        Self::with_clock(seed, Rc::new(MonotonicClock::new()))
    }

    pub fn with_clock(seed: u64, clock: Rc<dyn Clock>) -> Self {
        Self { seed, clock }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Fresh generator for `stream`; the same seed always yields the same sequence
    pub fn rng(&self, stream: RngStream) -> SmallRng {
        SmallRng::seed_from_u64(self.seed ^ stream.salt())
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }
}

impl std::fmt::Debug for SimContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimContext")
            .field("seed", &self.seed)
            .field("now", &self.clock.now())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualClock;
    use rand::Rng;

    #[test]
    fn test_streams_are_reproducible_and_distinct() {
        let ctx = SimContext::new(7);
        let draw = |stream| {
            let mut rng = ctx.rng(stream);
            (0..8).map(|_| rng.gen::<u32>()).collect::<Vec<_>>()
        };

        assert_eq!(draw(RngStream::Food), draw(RngStream::Food));
        assert_ne!(draw(RngStream::Food), draw(RngStream::Spawn));
        assert_ne!(draw(RngStream::Spawn), draw(RngStream::Steering));
    }

    #[test]
    fn test_clock_is_shared() {
        let clock = ManualClock::new();
        let ctx = SimContext::with_clock(1, Rc::new(clock.clone()));
        clock.advance(Duration::from_secs(2));
        assert_eq!(ctx.now(), Duration::from_secs(2));
        assert_eq!(ctx.clock().now(), Duration::from_secs(2));
    }
}
