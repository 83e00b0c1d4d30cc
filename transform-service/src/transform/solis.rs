//! Normalised SolisCloud JSON (`records[].normalized`): status
//! vocabulary on `inverter_status` (with `status_code` as the raw
//! error code), energy either direct or derived from active power.

use serde_json::Value;

use odse_schema::CanonicalRecord;

use crate::taxonomy;

use super::{
    clamp_pf, field_f64, field_token, non_negative, normalized_entries, parse_timestamp,
    AccessClass, OemTransform, PayloadKind, RecordStream, SourceDescriptor, TransformError,
    TransformOptions,
};

pub struct Solis;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "solis",
    payload: PayloadKind::Json,
    access: AccessClass::Sandbox,
};

const SOURCE: &str = "solis";

impl OemTransform for Solis {
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
        let interval_hours = opts.interval_hours(5.0);
        let asset_id = opts.asset_id.clone();

        let iter = normalized_entries(payload).into_iter().map(move |entry| {
            let ts_text = field_token(&entry, "timestamp").ok_or_else(|| {
                TransformError::malformed(SOURCE, "timestamp", "required field missing")
            })?;
            let ts = parse_timestamp(&ts_text, assumed).ok_or_else(|| {
                TransformError::malformed(SOURCE, "timestamp", format!("unparseable '{ts_text}'"))
            })?;

            let e_wh = field_f64(&entry, "active_energy_wh");
            let p_w = field_f64(&entry, "active_power_w");
            let kwh = match e_wh {
                Some(e) => non_negative(SOURCE, "active_energy_wh", e)? / 1000.0,
                None => {
                    let p = p_w.ok_or_else(|| {
                        TransformError::malformed(
                            SOURCE,
                            "active_energy_wh",
                            "neither active_energy_wh nor active_power_w present",
                        )
                    })?;
                    non_negative(SOURCE, "active_power_w", p)? / 1000.0 * interval_hours
                }
            };

            let status = field_token(&entry, "inverter_status")
                .or_else(|| field_token(&entry, "status_code"))
                .unwrap_or_else(|| "UNKNOWN".to_string());

            let q_var = field_f64(&entry, "reactive_power_var");
            let s_va = field_f64(&entry, "apparent_power_va");

            let mut rec = CanonicalRecord::new(ts, kwh, taxonomy::map_token(SOURCE, &status));
            rec.error_code =
                field_token(&entry, "status_code").or_else(|| field_token(&entry, "inverter_status"));
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
            rec.temperature = field_f64(&entry, "temperature_c");
            rec.asset_id = asset_id.clone();
            Ok(rec)
        });

        Ok(Box::new(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odse_schema::ErrorType;
    use time::macros::datetime;

    fn run(raw: &str) -> Vec<Result<CanonicalRecord, TransformError>> {
        Solis
            .transform(raw, &TransformOptions::default())
            .unwrap()
            .collect()
    }

    #[test]
    fn fixture_derives_energy_from_power() {
        let raw = crate::fixtures::payload("solis").unwrap();
        let records = run(raw);
        assert_eq!(records.len(), 1);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.timestamp, datetime!(2026-02-09 12:00:00 UTC));
        // 4600 W over the default 5-minute interval.
        assert!((rec.kwh - 4.6 / 12.0).abs() < 1e-9);
        assert_eq!(rec.error_type, ErrorType::Normal);
        assert_eq!(rec.error_code.as_deref(), Some("200"));
        assert_eq!(rec.temperature, Some(41.2));
    }

    #[test]
    fn direct_energy_reading_wins_over_power() {
        let raw = r#"{"records": [{"normalized": {
            "timestamp": "2026-02-09T12:00:00Z",
            "active_energy_wh": 2000,
            "active_power_w": 9999,
            "inverter_status": "STANDBY"
        }}]}"#;
        let records = run(raw);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.kwh, 2.0);
        assert_eq!(rec.error_type, ErrorType::Standby);
    }

    #[test]
    fn missing_status_fields_report_unknown() {
        let raw = r#"{"records": [{"normalized": {
            "timestamp": "2026-02-09T12:00:00Z",
            "active_energy_wh": 100
        }}]}"#;
        let records = run(raw);
        assert_eq!(records[0].as_ref().unwrap().error_type, ErrorType::Unknown);
    }

    #[test]
    fn negative_power_fallback_is_malformed() {
        let raw = r#"{"records": [{"normalized": {
            "timestamp": "2026-02-09T12:00:00Z",
            "active_power_w": -500
        }}]}"#;
        let records = run(raw);
        assert!(records[0].is_err());
    }

    #[test]
    fn missing_timestamp_is_malformed() {
        let raw = r#"{"records": [{"normalized": {"active_energy_wh": 100}}]}"#;
        let records = run(raw);
        assert!(matches!(
            records[0],
            Err(TransformError::MalformedPayload { ref field, .. }) if field == "timestamp"
        ));
    }
}
