//! Domain types for TrendCache

pub mod bar;

pub use bar::Bar;
