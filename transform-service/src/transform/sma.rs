//! Normalised SMA monitoring JSON (`records[].normalized`): energy and
//! electrical readings with an event severity, falling back to the
//! device status token when no severity is present.

use serde_json::Value;

use odse_schema::{CanonicalRecord, ErrorType};

use crate::taxonomy;

use super::{
    clamp_pf, field_f64, field_token, non_negative, normalized_entries, parse_timestamp,
    AccessClass, OemTransform, PayloadKind, RecordStream, SourceDescriptor, TransformError,
    TransformOptions,
};

pub struct Sma;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "sma",
    payload: PayloadKind::Json,
    access: AccessClass::PartnerGated,
};

const SOURCE: &str = "sma";

impl OemTransform for Sma {
    fn descriptor(&self) -> &'static SourceDescriptor {
        &DESCRIPTOR
    }

    fn transform(
        &self,
        raw: &str,
        opts: &TransformOptions,
    ) -> Result<RecordStream, TransformError> {
        let payload: Value = serde_json::from_str(raw)
            .map_err(|e| TransformError::malformed(SOURCE, "payload", e.to_string()))?;
        let assumed = opts.assumed_offset()?;
        let asset_id = opts.asset_id.clone();

        let iter = normalized_entries(payload).into_iter().map(move |entry| {
            let ts_text = field_token(&entry, "timestamp").ok_or_else(|| {
                TransformError::malformed(SOURCE, "timestamp", "required field missing")
            })?;
            let ts = parse_timestamp(&ts_text, assumed).ok_or_else(|| {
                TransformError::malformed(SOURCE, "timestamp", format!("unparseable '{ts_text}'"))
            })?;

            let e_wh = non_negative(
                SOURCE,
                "active_energy_wh",
                field_f64(&entry, "active_energy_wh").ok_or_else(|| {
                    TransformError::malformed(
                        SOURCE,
                        "active_energy_wh",
                        "required field missing or non-numeric",
                    )
                })?,
            )?;
            let p_w = field_f64(&entry, "active_power_w");
            let q_var = field_f64(&entry, "reactive_power_var");
            let s_va = field_f64(&entry, "apparent_power_va");

            let severity = field_token(&entry, "event_severity");
            let status = field_token(&entry, "status_code");
            let error_type = map_severity_then_status(severity.as_deref(), status.as_deref());

            let mut rec = CanonicalRecord::new(ts, e_wh / 1000.0, error_type);
            rec.error_code = field_token(&entry, "event_code").or(status);
            rec.kw = p_w.map(|w| w / 1000.0);
            rec.kvar = q_var.map(|v| v / 1000.0);
            rec.kva = s_va.map(|v| v / 1000.0);
            if let (Some(p), Some(s)) = (p_w, s_va) {
                if s > 0.0 {
                    rec.pf = Some(clamp_pf(p / s));
                }
            }
            rec.voltage_ac = field_f64(&entry, "voltage_v");
            rec.current_ac = field_f64(&entry, "current_a");
            rec.frequency = field_f64(&entry, "frequency_hz");
            rec.asset_id = asset_id.clone();
            Ok(rec)
        });

        Ok(Box::new(iter))
    }
}

/// Event severity takes precedence; the device status vocabulary is the
/// fallback. A token present in neither vocabulary is reported unknown.
fn map_severity_then_status(severity: Option<&str>, status: Option<&str>) -> ErrorType {
    if let Some(sev) = severity {
        if let Some(et) = taxonomy::try_token("sma", sev) {
            return et;
        }
        if let Some(et) = status.and_then(|s| taxonomy::try_token("sma-status", s)) {
            return et;
        }
        return taxonomy::unmapped("sma", sev);
    }
    match status {
        Some(s) => taxonomy::try_token("sma-status", s)
            .unwrap_or_else(|| taxonomy::unmapped("sma", s)),
        None => ErrorType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn run(raw: &str) -> Vec<Result<CanonicalRecord, TransformError>> {
        Sma.transform(raw, &TransformOptions::default())
            .unwrap()
            .collect()
    }

    #[test]
    fn fixture_severity_outranks_online_status() {
        let raw = crate::fixtures::payload("sma").unwrap();
        let records = run(raw);
        assert_eq!(records.len(), 1);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.timestamp, datetime!(2026-02-09 12:00:00 UTC));
        assert_eq!(rec.kwh, 2.5);
        assert_eq!(rec.error_type, ErrorType::Warning);
        assert_eq!(rec.error_code.as_deref(), Some("E101"));
        assert_eq!(rec.kw, Some(3.0));
    }

    #[test]
    fn status_fallback_when_no_severity() {
        assert_eq!(
            map_severity_then_status(None, Some("STANDBY")),
            ErrorType::Standby
        );
        assert_eq!(
            map_severity_then_status(Some("MAJOR"), Some("ONLINE")),
            ErrorType::Critical
        );
        assert_eq!(
            map_severity_then_status(Some("odd"), Some("ONLINE")),
            ErrorType::Normal
        );
        assert_eq!(map_severity_then_status(Some("odd"), None), ErrorType::Unknown);
        assert_eq!(map_severity_then_status(None, None), ErrorType::Unknown);
    }

    #[test]
    fn derives_power_factor_from_apparent_power() {
        let raw = r#"{"records": [{"normalized": {
            "timestamp": "2026-02-09T12:00:00Z",
            "active_energy_wh": 1000,
            "active_power_w": 900,
            "apparent_power_va": 1000,
            "status_code": "RUNNING"
        }}]}"#;
        let records = run(raw);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.pf, Some(0.9));
        assert_eq!(rec.error_type, ErrorType::Normal);
    }

    #[test]
    fn missing_energy_is_malformed() {
        let raw = r#"{"records": [{"normalized": {"timestamp": "2026-02-09T12:00:00Z"}}]}"#;
        let records = run(raw);
        assert!(matches!(
            records[0],
            Err(TransformError::MalformedPayload { ref field, .. }) if field == "active_energy_wh"
        ));
    }

    #[test]
    fn bare_entry_without_normalized_wrapper_is_accepted() {
        let raw = r#"[{"timestamp": "2026-02-09T12:00:00Z", "active_energy_wh": 500, "status_code": "OFFLINE"}]"#;
        let records = run(raw);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.kwh, 0.5);
        assert_eq!(rec.error_type, ErrorType::Offline);
    }
}
