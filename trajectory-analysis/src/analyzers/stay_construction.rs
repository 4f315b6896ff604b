//! Stay construction (spec.md §4.5.3): executed by an external worker.
//! This crate only declares the contract — the analyzer name, its
//! cascade position, and the `StaySegment` row shape it's expected to
//! produce. No in-process algorithm is implemented here, matching
//! spec.md's explicit statement that this analyzer is "executed by an
//! external worker; the core specifies contract only."
//!
//! Registered against [`crate::worker::ExternalWorkerAnalyzer`] rather
//! than a bespoke in-process implementation (spec.md §9: treat the
//! external-worker path as a single process boundary, not something to
//! partially reimplement in-process).

pub const NAME: &str = "stay_detection";

/// Tables this analyzer reads from, declared for documentation and for
/// the dispatcher's dependency presentation (spec.md §4.4: "the core
/// does not auto-schedule dependencies; the dispatcher presents them to
/// the operator as an ordered task list").
pub const INPUT_TABLES: &[&str] = &["track_points"];

/// The table this analyzer owns and writes.
pub const OUTPUT_TABLE: &str = "stay_segments";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_its_contract() {
        assert_eq!(NAME, "stay_detection");
        assert_eq!(OUTPUT_TABLE, "stay_segments");
        assert!(INPUT_TABLES.contains(&"track_points"));
    }
}
