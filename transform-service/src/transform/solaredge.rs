//! SolarEdge monitoring JSON, three documented shapes: inverter
//! telemetry (`data.telemetries`, with per-phase electrical detail),
//! site energy (`energy.values`), and site power (`power.values`).

use serde_json::Value;

use odse_schema::{CanonicalRecord, ErrorType};

use crate::taxonomy;

use super::{
    clamp_pf, field_f64, field_token, non_negative, parse_timestamp, AccessClass, OemTransform,
    PayloadKind, RecordStream, SourceDescriptor, TransformError, TransformOptions,
};

pub struct SolarEdge;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "solaredge",
    payload: PayloadKind::Json,
    access: AccessClass::AccountRequired,
};

const SOURCE: &str = "solaredge";

impl OemTransform for SolarEdge {
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
        let interval_hours = opts.interval_hours(15.0);
        let asset_id = opts.asset_id.clone();

        if let Some(Value::Array(telemetries)) = payload
            .get("data")
            .and_then(|data| data.get("telemetries"))
        {
            let telemetries = telemetries.clone();
            let iter = telemetries.into_iter().map(move |t| {
                let ts = required_timestamp(&t, "date", assumed)?;
                let power_w = non_negative(
                    SOURCE,
                    "totalActivePower",
                    field_f64(&t, "totalActivePower").ok_or_else(|| {
                        TransformError::malformed(
                            SOURCE,
                            "totalActivePower",
                            "required field missing or non-numeric",
                        )
                    })?,
                )?;
                let error_type = match field_token(&t, "inverterMode") {
                    Some(mode) => taxonomy::map_token(SOURCE, &mode),
                    None => ErrorType::Unknown,
                };

                let mut rec =
                    CanonicalRecord::new(ts, power_w / 1000.0 * interval_hours, error_type);
                rec.error_code = field_token(&t, "operationMode");
                rec.kw = Some(power_w / 1000.0);
                if let Some(l1) = t.get("L1Data").filter(|v| v.is_object()) {
                    rec.kva = field_f64(l1, "apparentPower").map(|v| v / 1000.0);
                    rec.kvar = field_f64(l1, "reactivePower").map(|v| v / 1000.0);
                    rec.pf = field_f64(l1, "cosPhi").map(clamp_pf);
                    rec.voltage_ac = field_f64(l1, "acVoltage");
                    rec.current_ac = field_f64(l1, "acCurrent");
                    rec.frequency = field_f64(l1, "acFrequency");
                }
                rec.asset_id = asset_id.clone();
                Ok(rec)
            });
            return Ok(Box::new(iter));
        }

        if let Some(Value::Array(values)) = payload
            .get("energy")
            .and_then(|energy| energy.get("values"))
        {
            let values = values.clone();
            let iter = values.into_iter().map(move |v| {
                let ts = required_timestamp(&v, "date", assumed)?;
                let wh = non_negative(
                    SOURCE,
                    "value",
                    field_f64(&v, "value").ok_or_else(|| {
                        TransformError::malformed(
                            SOURCE,
                            "value",
                            "required field missing or non-numeric",
                        )
                    })?,
                )?;
                let mut rec = CanonicalRecord::new(ts, wh / 1000.0, ErrorType::Normal);
                rec.asset_id = asset_id.clone();
                Ok(rec)
            });
            return Ok(Box::new(iter));
        }

        if let Some(Value::Array(values)) = payload
            .get("power")
            .and_then(|power| power.get("values"))
        {
            let values = values.clone();
            let iter = values.into_iter().map(move |v| {
                let ts = required_timestamp(&v, "date", assumed)?;
                let watts = non_negative(
                    SOURCE,
                    "value",
                    field_f64(&v, "value").ok_or_else(|| {
                        TransformError::malformed(
                            SOURCE,
                            "value",
                            "required field missing or non-numeric",
                        )
                    })?,
                )?;
                let error_type = if watts > 0.0 {
                    ErrorType::Normal
                } else {
                    ErrorType::Standby
                };
                let mut rec =
                    CanonicalRecord::new(ts, watts / 1000.0 * interval_hours, error_type);
                rec.kw = Some(watts / 1000.0);
                rec.asset_id = asset_id.clone();
                Ok(rec)
            });
            return Ok(Box::new(iter));
        }

        Err(TransformError::malformed(
            SOURCE,
            "payload",
            "no telemetries, energy, or power block in payload",
        ))
    }
}

fn required_timestamp(
    entry: &Value,
    field: &'static str,
    assumed: time::UtcOffset,
) -> Result<time::OffsetDateTime, TransformError> {
    let text = field_token(entry, field)
        .ok_or_else(|| TransformError::malformed(SOURCE, field, "required field missing"))?;
    parse_timestamp(&text, assumed)
        .ok_or_else(|| TransformError::malformed(SOURCE, field, format!("unparseable '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn run(raw: &str) -> Vec<Result<CanonicalRecord, TransformError>> {
        SolarEdge
            .transform(raw, &TransformOptions::default())
            .unwrap()
            .collect()
    }

    #[test]
    fn fixture_telemetry_carries_electrical_detail() {
        let raw = crate::fixtures::payload("solaredge").unwrap();
        let records = run(raw);
        assert_eq!(records.len(), 1);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.timestamp, datetime!(2026-02-09 12:00:00 UTC));
        assert_eq!(rec.error_type, ErrorType::Normal);
        assert!((rec.kwh - 1.25).abs() < 1e-9);
        assert_eq!(rec.kw, Some(5.0));
        assert_eq!(rec.kva, Some(5.2));
        assert_eq!(rec.kvar, Some(0.4));
        assert_eq!(rec.pf, Some(0.96));
        assert_eq!(rec.error_code.as_deref(), Some("1"));
    }

    #[test]
    fn unmapped_inverter_mode_is_unknown() {
        let raw = r#"{"data": {"telemetries": [
            {"date": "2026-02-09 12:00:00", "totalActivePower": 100, "inverterMode": "WIBBLE"}
        ]}}"#;
        let records = run(raw);
        assert_eq!(records[0].as_ref().unwrap().error_type, ErrorType::Unknown);
    }

    #[test]
    fn energy_values_shape_is_direct_kwh() {
        let raw = r#"{"energy": {"values": [{"date": "2026-02-09 12:00:00", "value": 2500}]}}"#;
        let records = run(raw);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.kwh, 2.5);
        assert_eq!(rec.error_type, ErrorType::Normal);
    }

    #[test]
    fn power_values_zero_watts_is_standby() {
        let raw = r#"{"power": {"values": [{"date": "2026-02-09 12:00:00", "value": 0}]}}"#;
        let records = run(raw);
        assert_eq!(records[0].as_ref().unwrap().error_type, ErrorType::Standby);
    }

    #[test]
    fn negative_telemetry_power_is_malformed() {
        let raw = r#"{"data": {"telemetries": [
            {"date": "2026-02-09 12:00:00", "totalActivePower": -100, "inverterMode": "MPPT"}
        ]}}"#;
        let records = run(raw);
        assert!(records[0].is_err());
    }

    #[test]
    fn unrecognised_shape_is_malformed() {
        assert!(SolarEdge
            .transform(r#"{"sites": []}"#, &TransformOptions::default())
            .is_err());
    }
}
