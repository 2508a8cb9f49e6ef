//! Injectable random source for projections and failure injection.
//!
//! Engines accept an `Arc<dyn RandomSource>` so tests can supply fixed or
//! scripted draws instead of thread-local randomness.

use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Uniform draws in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Production source backed by `rand::thread_rng`.
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Always returns the same value.
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Replays a scripted sequence, then repeats `fallback` once exhausted.
pub struct SequenceRandom {
    values: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl SequenceRandom {
    pub fn new(values: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            fallback,
        }
    }

    pub fn remaining(&self) -> usize {
        self.values.lock().expect("random sequence mutex poisoned").len()
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&self) -> f64 {
        self.values
            .lock()
            .expect("random sequence mutex poisoned")
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

/// Convenience: the production random source.
pub fn thread_random() -> Arc<dyn RandomSource> {
    Arc::new(ThreadRandom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_random_in_unit_interval() {
        let source = ThreadRandom;
        for _ in 0..1000 {
            let v = source.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_sequence_replays_then_falls_back() {
        let source = SequenceRandom::new([0.1, 0.9], 0.5);
        assert_eq!(source.next_f64(), 0.1);
        assert_eq!(source.next_f64(), 0.9);
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.next_f64(), 0.5);
    }
}
