//! Workload generators for the strata benchmarks.
//!
//! - [`push_sizes`]: a seeded mix of small and medium push sizes
//! - [`churn_ops`]: a seeded create/destroy sequence for pool benchmarks
//!
//! Both are deterministic for a given seed so runs are comparable.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One step of a pool churn workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChurnOp {
    /// Create a handle.
    Create,
    /// Destroy the live handle at this position (modulo the live count).
    Destroy(u32),
}

/// `count` push sizes: mostly 8..=256 bytes, one in sixteen up to 16 KiB.
pub fn push_sizes(seed: u64, count: usize) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let r = rng.next_u32();
            if r % 16 == 0 {
                (r as usize >> 4) % (16 << 10) + 1
            } else {
                (r as usize >> 4) % 249 + 8
            }
        })
        .collect()
}

/// `count` churn steps, creating twice as often as destroying.
pub fn churn_ops(seed: u64, count: usize) -> Vec<ChurnOp> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let r = rng.next_u32();
            if r % 3 == 0 {
                ChurnOp::Destroy(r >> 2)
            } else {
                ChurnOp::Create
            }
        })
        .collect()
}
