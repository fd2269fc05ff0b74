//! # Processing
//!
//! CPU-bound work performed by workers, kept free of any networking.

pub mod monte_carlo;
