//! `TrackPoint` — input row, externally populated (spec.md §3).

use serde::{Deserialize, Serialize};

/// Quality assessment status assigned by the outlier detector (§4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QaStatus {
    Pass,
    Warning,
    Fail,
    #[serde(rename = "interpolated")]
    Interpolated,
}

impl QaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warning => "WARNING",
            Self::Fail => "FAIL",
            Self::Interpolated => "interpolated",
        }
    }
}

impl std::str::FromStr for QaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Self::Pass),
            "WARNING" => Ok(Self::Warning),
            "FAIL" => Ok(Self::Fail),
            "interpolated" => Ok(Self::Interpolated),
            other => Err(format!("unknown qa_status: {other}")),
        }
    }
}

/// Administrative labels read from the point store (owned by the
/// out-of-scope geocoding subsystem; this core only reads them).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminLabels {
    pub province: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub town: Option<String>,
}

/// A single GPS sample.
///
/// Invariants (spec.md §3): timestamps are monotonically orderable;
/// `lat`/`lon` are non-null for any point that is not an outlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub id: i64,
    pub ts: i64,
    pub lat: f64,
    pub lon: f64,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub admin: AdminLabels,
    pub grid_id: Option<String>,
    pub outlier_flag: bool,
    pub outlier_reason_codes: Vec<String>,
    pub qa_status: QaStatus,
}

impl TrackPoint {
    /// Append a reason code and set the outlier flag, avoiding duplicate
    /// codes (each rule in §4.5.1 "applied independently; any hit sets
    /// the outlier flag and appends its code").
    pub fn flag_outlier(&mut self, reason_code: &str) {
        self.outlier_flag = true;
        if !self.outlier_reason_codes.iter().any(|c| c == reason_code) {
            self.outlier_reason_codes.push(reason_code.to_string());
        }
    }
}
