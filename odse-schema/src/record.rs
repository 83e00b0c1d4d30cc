use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ErrorType;

/// Canonical normalized telemetry record.
///
/// `timestamp` is offset-aware by construction; transforms convert to
/// UTC before emitting. Optional measurements are carried through only
/// when the source actually reported them; absent values are omitted
/// from the serialized form rather than defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "kWh")]
    pub kwh: f64,
    pub error_type: ErrorType,
    /// Vendor-native status/fault code, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Vendor API-level error code (distinct from the device status).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oem_error_code: Option<String>,
    #[serde(rename = "kW", default, skip_serializing_if = "Option::is_none")]
    pub kw: Option<f64>,
    #[serde(rename = "kVA", default, skip_serializing_if = "Option::is_none")]
    pub kva: Option<f64>,
    #[serde(rename = "kVAr", default, skip_serializing_if = "Option::is_none")]
    pub kvar: Option<f64>,
    #[serde(rename = "kVArh", default, skip_serializing_if = "Option::is_none")]
    pub kvarh: Option<f64>,
    #[serde(rename = "PF", default, skip_serializing_if = "Option::is_none")]
    pub pf: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_ac: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ac: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

impl CanonicalRecord {
    pub fn new(timestamp: OffsetDateTime, kwh: f64, error_type: ErrorType) -> Self {
        Self {
            timestamp,
            kwh,
            error_type,
            error_code: None,
            oem_error_code: None,
            kw: None,
            kva: None,
            kvar: None,
            kvarh: None,
            pf: None,
            voltage_ac: None,
            current_ac: None,
            frequency: None,
            temperature: None,
            asset_id: None,
        }
    }
}
