//! # Quarter-Disk Sampling
//!
//! Draws uniform points in `[0,1)²` and counts those with `x² + y² ≤ 1`.
//! The inside fraction estimates `π/4`.

use rand::Rng;

/// Count how many of `samples` random points land inside the unit
/// quarter-disk. The result never exceeds `samples`.
pub fn count_inside<R: Rng + ?Sized>(rng: &mut R, samples: u64) -> u64 {
    let mut inside = 0u64;
    for _ in 0..samples {
        let x: f64 = rng.gen();
        let y: f64 = rng.gen();
        if x * x + y * y <= 1.0 {
            inside += 1;
        }
    }
    inside
}
