//! Analyzer execution scaffolding shared by the `analyzers` family.

pub mod base;

pub use base::{AnalyzerBase, BatchRunStats};
