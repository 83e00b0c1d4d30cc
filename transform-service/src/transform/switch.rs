//! Switch revenue-meter CSV: interval active/reactive power deltas in
//! watts across two channel columns. Apparent power and power factor
//! are derived; status comes from the power sign (the meter has no
//! status vocabulary).

use odse_schema::{CanonicalRecord, ErrorType};

use super::{
    clamp_pf, csv_payload, non_negative, parse_f64, parse_timestamp, require_row_value, row_value,
    AccessClass, CsvPayload, OemTransform, PayloadKind, RecordStream, SourceDescriptor,
    TransformError, TransformOptions,
};

pub struct Switch;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "switch",
    payload: PayloadKind::Csv,
    access: AccessClass::PartnerGated,
};

const SOURCE: &str = "switch";
const TIMESTAMP: &[&str] = &["timestampISO", "timestamp", "Time", "Date/Time"];
const ACTIVE: &[&str] = &["dP1", "dP2"];
const REACTIVE: &[&str] = &["dQ1", "dQ2"];

impl OemTransform for Switch {
    fn descriptor(&self) -> &'static SourceDescriptor {
        &DESCRIPTOR
    }

    fn transform(
        &self,
        raw: &str,
        opts: &TransformOptions,
    ) -> Result<RecordStream, TransformError> {
        let assumed = opts.assumed_offset()?;
        let interval_hours = opts.interval_hours(15.0);
        let asset_id = opts.asset_id.clone();
        let CsvPayload { headers, records } = csv_payload(SOURCE, raw)?;

        let iter = records.map(move |row| {
            let row = row.map_err(|e| TransformError::malformed(SOURCE, "row", e.to_string()))?;

            let ts_text = require_row_value(SOURCE, &headers, &row, TIMESTAMP)?;
            let ts = parse_timestamp(ts_text, assumed).ok_or_else(|| {
                TransformError::malformed(
                    SOURCE,
                    "timestampISO",
                    format!("unparseable '{ts_text}'"),
                )
            })?;

            let power_text = require_row_value(SOURCE, &headers, &row, ACTIVE)?;
            let power_w = non_negative(SOURCE, "dP1", parse_f64(SOURCE, "dP1", power_text)?)?;
            let reactive_w = row_value(&headers, &row, REACTIVE)
                .map(|s| parse_f64(SOURCE, "dQ1", s))
                .transpose()?;

            let p_kw = power_w / 1000.0;
            let q_kvar = reactive_w.map(|w| w / 1000.0);
            let kva = (p_kw.powi(2) + q_kvar.unwrap_or(0.0).powi(2)).sqrt();
            let pf = (kva > 0.0).then(|| clamp_pf(p_kw / kva));

            let error_type = if power_w == 0.0 {
                ErrorType::Standby
            } else {
                ErrorType::Normal
            };

            let mut rec = CanonicalRecord::new(ts, p_kw * interval_hours, error_type);
            rec.error_code = Some(if power_w == 0.0 { "0" } else { "1" }.to_string());
            rec.kw = Some(p_kw);
            rec.kva = Some(kva);
            rec.kvarh = q_kvar.map(|q| q * interval_hours);
            rec.pf = pf;
            rec.asset_id = asset_id.clone();
            Ok(rec)
        });

        Ok(Box::new(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn run(raw: &str) -> Vec<Result<CanonicalRecord, TransformError>> {
        Switch
            .transform(raw, &TransformOptions::default())
            .unwrap()
            .collect()
    }

    #[test]
    fn fixture_derives_apparent_power_and_pf() {
        let raw = crate::fixtures::payload("switch").unwrap();
        let records = run(raw);
        assert_eq!(records.len(), 1);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.timestamp, datetime!(2026-02-09 12:00:00 UTC));
        assert_eq!(rec.error_type, ErrorType::Normal);
        // 1000 W over 15 minutes.
        assert!((rec.kwh - 0.25).abs() < 1e-9);
        let kva = rec.kva.unwrap();
        assert!((kva - (1.0f64 + 0.04).sqrt()).abs() < 1e-9);
        let pf = rec.pf.unwrap();
        assert!(pf > 0.97 && pf <= 1.0);
    }

    #[test]
    fn second_channel_column_is_accepted() {
        let raw = "timestampISO,dP1,dP2\n2026-02-09 12:00:00,,500\n";
        let records = run(raw);
        assert_eq!(records[0].as_ref().unwrap().kw, Some(0.5));
    }

    #[test]
    fn zero_power_reports_standby() {
        let raw = "timestampISO,dP1\n2026-02-09 12:00:00,0\n";
        let records = run(raw);
        let rec = records[0].as_ref().unwrap();
        assert_eq!(rec.error_type, ErrorType::Standby);
        assert_eq!(rec.error_code.as_deref(), Some("0"));
    }

    #[test]
    fn negative_power_delta_is_malformed() {
        let raw = "timestampISO,dP1\n2026-02-09 12:00:00,-400\n";
        let records = run(raw);
        assert!(records[0].is_err());
    }

    #[test]
    fn missing_power_columns_are_malformed() {
        let raw = "timestampISO,dQ1\n2026-02-09 12:00:00,200\n";
        let records = run(raw);
        assert!(matches!(
            records[0],
            Err(TransformError::MalformedPayload { ref field, .. }) if field == "dP1"
        ));
    }
}
