//! Procedural desert dressing: stone clusters and sand beds placed over a
//! shared occupancy grid, persisted once and replayed on every later start.

pub mod dressing;
