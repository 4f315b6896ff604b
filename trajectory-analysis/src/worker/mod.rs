//! Out-of-process analyzer execution (spec.md §4.6).

pub mod external;

pub use external::ExternalWorkerAnalyzer;
