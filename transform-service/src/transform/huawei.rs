//! Huawei FusionSolar CSV exports: one row per sampling interval with
//! active power and inverter/running state codes.

use odse_schema::CanonicalRecord;

use crate::taxonomy;

use super::{
    csv_payload, non_negative, parse_f64, parse_timestamp, require_row_value, row_value,
    AccessClass, CsvPayload, OemTransform, PayloadKind, RecordStream, SourceDescriptor,
    TransformError, TransformOptions,
};

pub struct Huawei;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "huawei",
    payload: PayloadKind::Csv,
    access: AccessClass::AccountRequired,
};

const SOURCE: &str = "huawei";
const TIMESTAMP: &[&str] = &["timestamp", "Time", "Timestamp", "time"];
const POWER: &[&str] = &["power", "Active Power(kW)", "Power", "power_kw"];
const INVERTER_STATE: &[&str] = &["inverter_state", "Inverter State", "State", "status"];
const RUN_STATE: &[&str] = &["run_state", "Running State", "Run State"];

impl OemTransform for Huawei {
    fn descriptor(&self) -> &'static SourceDescriptor {
        &DESCRIPTOR
    }

    fn transform(
        &self,
        raw: &str,
        opts: &TransformOptions,
    ) -> Result<RecordStream, TransformError> {
        let assumed = opts.assumed_offset()?;
        let interval_hours = opts.interval_hours(5.0);
        let asset_id = opts.asset_id.clone();
        let CsvPayload { headers, records } = csv_payload(SOURCE, raw)?;

        let iter = records.map(move |row| {
            let row = row.map_err(|e| TransformError::malformed(SOURCE, "row", e.to_string()))?;

            let ts_text = require_row_value(SOURCE, &headers, &row, TIMESTAMP)?;
            let ts = parse_timestamp(ts_text, assumed).ok_or_else(|| {
                TransformError::malformed(SOURCE, "timestamp", format!("unparseable '{ts_text}'"))
            })?;

            let power_text = require_row_value(SOURCE, &headers, &row, POWER)?;
            let power_kw = non_negative(SOURCE, "power", parse_f64(SOURCE, "power", power_text)?)?;

            let inverter_state = row_value(&headers, &row, INVERTER_STATE)
                .map(|s| parse_f64(SOURCE, "inverter_state", s))
                .transpose()?
                .map(|f| f as i64);
            let run_state = row_value(&headers, &row, RUN_STATE)
                .map(|s| parse_f64(SOURCE, "run_state", s))
                .transpose()?
                .map(|f| f as i64);

            let mut rec = CanonicalRecord::new(
                ts,
                power_kw * interval_hours,
                taxonomy::huawei_state(inverter_state, run_state),
            );
            rec.error_code = Some(
                inverter_state
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            );
            rec.kw = Some(power_kw);
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

    fn run(raw: &str, opts: &TransformOptions) -> Vec<Result<CanonicalRecord, TransformError>> {
        Huawei.transform(raw, opts).unwrap().collect()
    }

    #[test]
    fn fixture_row_becomes_one_normal_record() {
        let raw = crate::fixtures::payload("huawei").unwrap();
        let records = run(raw, &TransformOptions::default());
        assert_eq!(records.len(), 1);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.timestamp, datetime!(2026-02-09 12:00:00 UTC));
        assert_eq!(rec.error_type, ErrorType::Normal);
        assert_eq!(rec.error_code.as_deref(), Some("512"));
        // 10 kW over a 5-minute interval.
        assert!((rec.kwh - 10.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn undocumented_state_code_maps_to_unknown() {
        let raw = "timestamp,power,inverter_state,run_state\n2026-02-09 12:00:00,10,31337,1\n";
        let records = run(raw, &TransformOptions::default());
        assert_eq!(
            records[0].as_ref().unwrap().error_type,
            ErrorType::Unknown
        );
    }

    #[test]
    fn run_state_zero_reports_offline() {
        let raw = "timestamp,power,inverter_state,run_state\n2026-02-09 12:00:00,0,512,0\n";
        let records = run(raw, &TransformOptions::default());
        assert_eq!(records[0].as_ref().unwrap().error_type, ErrorType::Offline);
    }

    #[test]
    fn missing_timestamp_is_malformed_not_skipped() {
        let raw = "timestamp,power\n,10\n";
        let records = run(raw, &TransformOptions::default());
        assert!(matches!(
            records[0],
            Err(TransformError::MalformedPayload { ref field, .. }) if field == "timestamp"
        ));
    }

    #[test]
    fn negative_power_is_malformed_not_zero() {
        let raw = "timestamp,power\n2026-02-09 12:00:00,-5\n";
        let records = run(raw, &TransformOptions::default());
        assert!(matches!(
            records[0],
            Err(TransformError::MalformedPayload { ref field, .. }) if field == "power"
        ));
    }

    #[test]
    fn assumed_offset_applies_to_naive_rows() {
        let opts = TransformOptions {
            timezone: Some("+08:00".to_string()),
            ..Default::default()
        };
        let raw = crate::fixtures::payload("huawei").unwrap();
        let records = run(raw, &opts);
        assert_eq!(
            records[0].as_ref().unwrap().timestamp,
            datetime!(2026-02-09 04:00:00 UTC)
        );
    }
}
