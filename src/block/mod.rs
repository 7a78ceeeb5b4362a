// src/block/mod.rs

//! Block range arithmetic.
//!
//! - [`range`] holds the half-open [`Range`] type and helpers on sorted
//!   range lists.
//! - [`segmenter`] maps block numbers to fixed-width segment indices.
//! - [`bounded`] clips an arbitrary request to the segment-aligned range
//!   relevant to one module.

pub mod bounded;
pub mod range;
pub mod segmenter;

pub use bounded::BoundedRange;
pub use range::{Range, Ranges};
pub use segmenter::Segmenter;
