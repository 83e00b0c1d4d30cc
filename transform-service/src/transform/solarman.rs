//! Solarman data-logger exports: cumulative generation counter rows.
//! kWh per row is the delta against the previous row; the first row is
//! the baseline and yields 0.

use odse_schema::{CanonicalRecord, ErrorType};

use crate::taxonomy;

use super::{
    csv_payload, non_negative, parse_f64, parse_timestamp, require_row_value, row_value,
    AccessClass, CsvPayload, OemTransform, PayloadKind, RecordStream, SourceDescriptor,
    TransformError, TransformOptions,
};

pub struct Solarman;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "solarman",
    payload: PayloadKind::LoggerExport,
    access: AccessClass::AccountRequired,
};

const SOURCE: &str = "solarman";
const TIMESTAMP: &[&str] = &["update_time", "Update Time", "Time", "Timestamp"];
const GENERATION: &[&str] = &[
    "generation",
    "Generation(kWh)",
    "Total Generation",
    "Cumulative Energy",
];
const DEVICE_STATE: &[&str] = &["device_state", "Device State", "Status", "State"];
const POWER: &[&str] = &["power", "Power(W)", "Active Power", "Output Power"];

impl OemTransform for Solarman {
    fn descriptor(&self) -> &'static SourceDescriptor {
        &DESCRIPTOR
    }

    fn transform(
        &self,
        raw: &str,
        opts: &TransformOptions,
    ) -> Result<RecordStream, TransformError> {
        let assumed = opts.assumed_offset()?;
        let asset_id = opts.asset_id.clone();
        let CsvPayload { headers, records } = csv_payload(SOURCE, raw)?;

        let iter = records.scan(None::<f64>, move |prev_generation, row| {
            let result = (|| {
                let row =
                    row.map_err(|e| TransformError::malformed(SOURCE, "row", e.to_string()))?;

                let ts_text = require_row_value(SOURCE, &headers, &row, TIMESTAMP)?;
                let ts = parse_timestamp(ts_text, assumed).ok_or_else(|| {
                    TransformError::malformed(
                        SOURCE,
                        "update_time",
                        format!("unparseable '{ts_text}'"),
                    )
                })?;

                let gen_text = require_row_value(SOURCE, &headers, &row, GENERATION)?;
                let generation = non_negative(
                    SOURCE,
                    "generation",
                    parse_f64(SOURCE, "generation", gen_text)?,
                )?;

                // Counter reset clamps the delta to zero; the raw
                // reading itself was already checked above.
                let kwh = match *prev_generation {
                    Some(prev) => (generation - prev).max(0.0),
                    None => 0.0,
                };
                *prev_generation = Some(generation);

                let power_w = row_value(&headers, &row, POWER)
                    .map(|s| parse_f64(SOURCE, "power", s))
                    .transpose()?;
                let state = row_value(&headers, &row, DEVICE_STATE);

                let error_type = match state {
                    Some(token) => taxonomy::map_token(SOURCE, token),
                    None => infer_from_power(power_w),
                };

                let mut rec = CanonicalRecord::new(ts, kwh, error_type);
                rec.error_code = Some(
                    state
                        .map(str::to_string)
                        .unwrap_or_else(|| "inferred".to_string()),
                );
                rec.kw = power_w.map(|w| w / 1000.0);
                rec.asset_id = asset_id.clone();
                Ok(rec)
            })();
            Some(result)
        });

        Ok(Box::new(iter))
    }
}

/// No state column: fall back to what the power reading implies.
fn infer_from_power(power_w: Option<f64>) -> ErrorType {
    match power_w {
        None => ErrorType::Unknown,
        Some(w) if w > 0.0 => ErrorType::Normal,
        Some(w) if w == 0.0 => ErrorType::Offline,
        Some(_) => ErrorType::Warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn run(raw: &str) -> Vec<Result<CanonicalRecord, TransformError>> {
        Solarman
            .transform(raw, &TransformOptions::default())
            .unwrap()
            .collect()
    }

    #[test]
    fn fixture_rows_yield_baseline_then_delta() {
        let raw = crate::fixtures::payload("solarman").unwrap();
        let records = run(raw);
        assert_eq!(records.len(), 2);
        let first = records[0].as_ref().unwrap();
        let second = records[1].as_ref().unwrap();
        assert_eq!(first.kwh, 0.0);
        assert!((second.kwh - 0.6).abs() < 1e-9);
        assert_eq!(second.timestamp, datetime!(2026-02-09 12:05:00 UTC));
        assert_eq!(second.error_type, ErrorType::Normal);
        assert_eq!(second.kw, Some(0.6));
    }

    #[test]
    fn counter_reset_clamps_delta_to_zero() {
        let raw = "Update Time,Generation(kWh)\n\
                   2026-02-09 12:00:00,100.0\n\
                   2026-02-09 12:05:00,2.0\n";
        let records = run(raw);
        assert_eq!(records[1].as_ref().unwrap().kwh, 0.0);
    }

    #[test]
    fn negative_generation_reading_is_malformed() {
        let raw = "Update Time,Generation(kWh)\n2026-02-09 12:00:00,-3.0\n";
        let records = run(raw);
        assert!(matches!(
            records[0],
            Err(TransformError::MalformedPayload { ref field, .. }) if field == "generation"
        ));
    }

    #[test]
    fn missing_generation_column_is_malformed() {
        let raw = "Update Time,Power(W)\n2026-02-09 12:00:00,500\n";
        let records = run(raw);
        assert!(records[0].is_err());
    }

    #[test]
    fn unmapped_state_token_is_unknown() {
        let raw = "Update Time,Generation(kWh),Device State\n2026-02-09 12:00:00,1.0,Haywire\n";
        let records = run(raw);
        assert_eq!(records[0].as_ref().unwrap().error_type, ErrorType::Unknown);
    }

    #[test]
    fn state_absent_infers_from_power_sign() {
        let raw = "Update Time,Generation(kWh),Power(W)\n2026-02-09 12:00:00,1.0,0\n";
        let records = run(raw);
        assert_eq!(records[0].as_ref().unwrap().error_type, ErrorType::Offline);
    }
}
