//! Engine-wide tunables. Every field is `Option<T>` with a matching
//! `effective_*()` accessor, so a user's TOML config only needs to name
//! the values it wants to override (spec.md §3 constants and §4).

use serde::{Deserialize, Serialize};

/// Top-level configuration for the trajectory analytics engine, loaded
/// from TOML and merged over these defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub outliers: OutlierConfig,
    pub transport_mode: TransportModeConfig,
    pub speed_events: SpeedEventConfig,
    pub stays: StayConfig,
    pub trips: TripConfig,
    pub batching: BatchConfig,
    pub external_worker: ExternalWorkerConfig,
}

/// Thresholds for the rule-based outlier detector (spec.md §4.5.1).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutlierConfig {
    /// Speed above which a point is flagged as physically implausible.
    /// Default: 277.78 m/s (~1000 km/h).
    pub max_plausible_speed_mps: Option<f64>,
    /// Reported GPS accuracy beyond which a point is flagged as
    /// low-quality. Default: 100.0 meters.
    pub max_accuracy_radius_m: Option<f64>,
    /// A point more than this far from its neighbor within this short a
    /// time window is flagged as a position jump.
    /// Default: 1000.0 meters within 10.0 seconds.
    pub jump_distance_m: Option<f64>,
    pub jump_window_s: Option<f64>,
}

impl OutlierConfig {
    pub fn effective_max_plausible_speed_mps(&self) -> f64 {
        self.max_plausible_speed_mps.unwrap_or(277.78)
    }

    pub fn effective_max_accuracy_radius_m(&self) -> f64 {
        self.max_accuracy_radius_m.unwrap_or(100.0)
    }

    pub fn effective_jump_distance_m(&self) -> f64 {
        self.jump_distance_m.unwrap_or(1000.0)
    }

    pub fn effective_jump_window_s(&self) -> f64 {
        self.jump_window_s.unwrap_or(10.0)
    }
}

/// Speed bands used to classify segments into a transport mode
/// (spec.md §4.5.2). Bands are expressed as an upper bound in m/s; a
/// segment's mean speed is matched against the first band it falls
/// under, in ascending order: walking, cycling, driving, then anything
/// faster is "unknown".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TransportModeConfig {
    pub walking_max_mps: Option<f64>,
    pub cycling_max_mps: Option<f64>,
    pub driving_max_mps: Option<f64>,
}

impl TransportModeConfig {
    pub fn effective_walking_max_mps(&self) -> f64 {
        self.walking_max_mps.unwrap_or(2.0)
    }

    pub fn effective_cycling_max_mps(&self) -> f64 {
        self.cycling_max_mps.unwrap_or(7.0)
    }

    pub fn effective_driving_max_mps(&self) -> f64 {
        self.driving_max_mps.unwrap_or(40.0)
    }
}

/// Thresholds for detecting a sustained speed event (spec.md §4.5.4).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SpeedEventConfig {
    /// Speed that must be sustained to open an event.
    /// Default: 33.33 m/s (~120 km/h).
    pub trigger_speed_mps: Option<f64>,
    /// Minimum duration above the trigger speed to count as an event.
    /// Default: 60.0 seconds.
    pub min_duration_s: Option<f64>,
    /// A gap in points longer than this closes an in-progress event.
    /// Default: 10.0 seconds.
    pub max_gap_s: Option<f64>,
}

impl SpeedEventConfig {
    pub fn effective_trigger_speed_mps(&self) -> f64 {
        self.trigger_speed_mps.unwrap_or(33.33)
    }

    pub fn effective_min_duration_s(&self) -> f64 {
        self.min_duration_s.unwrap_or(60.0)
    }

    pub fn effective_max_gap_s(&self) -> f64 {
        self.max_gap_s.unwrap_or(10.0)
    }
}

/// Thresholds for stay construction (spec.md §4.5.3). Stay construction
/// itself is a contract only (external worker); this config still ships
/// in-process so the dispatcher can validate worker output against it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StayConfig {
    /// Radius within which consecutive points are considered part of
    /// the same stay. Default: 50.0 meters.
    pub radius_m: Option<f64>,
    /// Minimum dwell time for a cluster of points to count as a stay.
    /// Default: 300.0 seconds (5 minutes).
    pub min_dwell_s: Option<f64>,
    /// Dwell time at or above which a stay is considered "significant"
    /// (spec.md glossary). Default: 1800.0 seconds (30 minutes).
    pub significant_dwell_s: Option<f64>,
}

impl StayConfig {
    pub fn effective_radius_m(&self) -> f64 {
        self.radius_m.unwrap_or(50.0)
    }

    pub fn effective_min_dwell_s(&self) -> f64 {
        self.min_dwell_s.unwrap_or(300.0)
    }

    pub fn effective_significant_dwell_s(&self) -> f64 {
        self.significant_dwell_s.unwrap_or(1800.0)
    }
}

/// Thresholds for trip construction (spec.md §4.5.5): a trip ends when
/// the gap between consecutive points exceeds `gap_s`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TripConfig {
    /// Default: 7200.0 seconds (2 hours).
    pub gap_s: Option<f64>,
}

impl TripConfig {
    pub fn effective_gap_s(&self) -> f64 {
        self.gap_s.unwrap_or(7200.0)
    }
}

/// Batch sizing for the storage-layer writer thread (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BatchConfig {
    /// Rows buffered before a forced flush. Default: 500.
    pub max_batch_rows: Option<usize>,
    /// Milliseconds between periodic flushes. Default: 250.
    pub flush_interval_ms: Option<u64>,
}

impl BatchConfig {
    pub fn effective_max_batch_rows(&self) -> usize {
        self.max_batch_rows.unwrap_or(500)
    }

    pub fn effective_flush_interval_ms(&self) -> u64 {
        self.flush_interval_ms.unwrap_or(250)
    }
}

/// Location of the external/containerized worker binary and the
/// database it reads from and writes results to (spec.md §9).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExternalWorkerConfig {
    pub binary_path: Option<String>,
    pub database_path: Option<String>,
    /// Seconds to wait for a worker process before treating it as
    /// stalled. Default: 3600 (1 hour).
    pub timeout_s: Option<u64>,
}

impl ExternalWorkerConfig {
    pub fn effective_binary_path(&self) -> String {
        self.binary_path
            .clone()
            .unwrap_or_else(|| "trajectory-worker".to_string())
    }

    pub fn effective_database_path(&self) -> String {
        self.database_path
            .clone()
            .unwrap_or_else(|| "trajectory.db".to_string())
    }

    pub fn effective_timeout_s(&self) -> u64 {
        self.timeout_s.unwrap_or(3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.outliers.effective_max_plausible_speed_mps(), 277.78);
        assert_eq!(cfg.outliers.effective_max_accuracy_radius_m(), 100.0);
        assert_eq!(cfg.outliers.effective_jump_distance_m(), 1000.0);
        assert_eq!(cfg.outliers.effective_jump_window_s(), 10.0);
        assert_eq!(cfg.speed_events.effective_trigger_speed_mps(), 33.33);
        assert_eq!(cfg.speed_events.effective_min_duration_s(), 60.0);
        assert_eq!(cfg.speed_events.effective_max_gap_s(), 10.0);
        assert_eq!(cfg.trips.effective_gap_s(), 7200.0);
        assert_eq!(cfg.stays.effective_significant_dwell_s(), 1800.0);
    }

    #[test]
    fn override_via_partial_struct() {
        let mut cfg = EngineConfig::default();
        cfg.trips.gap_s = Some(3600.0);
        assert_eq!(cfg.trips.effective_gap_s(), 3600.0);
        assert_eq!(cfg.stays.effective_radius_m(), 50.0);
    }

    #[test]
    fn toml_roundtrip_with_partial_overrides() {
        let toml_src = "[trips]\ngap_s = 5400.0\n";
        let cfg: EngineConfig = toml::from_str(toml_src).expect("valid toml");
        assert_eq!(cfg.trips.effective_gap_s(), 5400.0);
        assert_eq!(cfg.batching.effective_max_batch_rows(), 500);
    }
}
