//! Deterministic pattern-bank order detection.
//!
//! The zero-cost first tier of the detection pipeline. A curated bank of
//! category-labelled regular expressions is compiled once at startup;
//! after that, analysis is pure read-only matching with no interior state
//! and no allocation beyond the returned detection.

pub mod bank;

mod analyzer;

pub use analyzer::{ACCEPT_FLOOR, PatternMatcher};
