//! FIMER Aurora Vision JSON, three documented shapes: an energy
//! `series` (with per-entry unit), a power `points` series, and a plant
//! status document.

use serde_json::Value;

use odse_schema::CanonicalRecord;

use crate::taxonomy;

use super::{
    field_f64, field_token, non_negative, parse_timestamp, AccessClass, OemTransform, PayloadKind,
    RecordStream, SourceDescriptor, TransformError, TransformOptions,
};

pub struct Fimer;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "fimer",
    payload: PayloadKind::Json,
    access: AccessClass::AccountRequired,
};

const SOURCE: &str = "fimer";

impl OemTransform for Fimer {
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

        if let Some(Value::Array(series)) = payload.get("series") {
            let series = series.clone();
            let iter = series.into_iter().map(move |entry| {
                let ts_text = field_token(&entry, "date").ok_or_else(|| {
                    TransformError::malformed(SOURCE, "date", "required field missing")
                })?;
                let ts = parse_timestamp(&ts_text, assumed).ok_or_else(|| {
                    TransformError::malformed(SOURCE, "date", format!("unparseable '{ts_text}'"))
                })?;
                let energy = field_f64(&entry, "energy").ok_or_else(|| {
                    TransformError::malformed(SOURCE, "energy", "required field missing or non-numeric")
                })?;
                let unit = field_token(&entry, "unit");
                let kwh = non_negative(SOURCE, "energy", energy_to_kwh(energy, unit.as_deref()))?;

                let mut rec = CanonicalRecord::new(ts, kwh, odse_schema::ErrorType::Normal);
                rec.asset_id = asset_id.clone();
                Ok(rec)
            });
            return Ok(Box::new(iter));
        }

        if let Some(Value::Array(points)) = payload.get("points") {
            let points = points.clone();
            let iter = points.into_iter().map(move |entry| {
                let ts_text = field_token(&entry, "timestamp").ok_or_else(|| {
                    TransformError::malformed(SOURCE, "timestamp", "required field missing")
                })?;
                let ts = parse_timestamp(&ts_text, assumed).ok_or_else(|| {
                    TransformError::malformed(
                        SOURCE,
                        "timestamp",
                        format!("unparseable '{ts_text}'"),
                    )
                })?;
                let value_w = non_negative(
                    SOURCE,
                    "value",
                    field_f64(&entry, "value").ok_or_else(|| {
                        TransformError::malformed(
                            SOURCE,
                            "value",
                            "required field missing or non-numeric",
                        )
                    })?,
                )?;

                let mut rec = CanonicalRecord::new(
                    ts,
                    value_w / 1000.0 * interval_hours,
                    odse_schema::ErrorType::Normal,
                );
                rec.kw = Some(value_w / 1000.0);
                rec.asset_id = asset_id.clone();
                Ok(rec)
            });
            return Ok(Box::new(iter));
        }

        // Plant status document: one record, zero production.
        let ts_text = field_token(&payload, "lastReportedTimestamp")
            .or_else(|| field_token(&payload, "timestamp"))
            .ok_or_else(|| {
                TransformError::malformed(
                    SOURCE,
                    "lastReportedTimestamp",
                    "payload has no series, points, or status timestamp",
                )
            })?;
        let ts = parse_timestamp(&ts_text, assumed).ok_or_else(|| {
            TransformError::malformed(
                SOURCE,
                "lastReportedTimestamp",
                format!("unparseable '{ts_text}'"),
            )
        })?;
        let status = field_token(&payload, "status").unwrap_or_else(|| "unknown".to_string());
        let error_type = taxonomy::map_token(SOURCE, &status);

        let mut rec = CanonicalRecord::new(ts, 0.0, error_type);
        rec.error_code = Some(field_token(&payload, "message").unwrap_or(status));
        rec.asset_id = asset_id;
        Ok(Box::new(std::iter::once(Ok(rec))))
    }
}

fn energy_to_kwh(energy: f64, unit: Option<&str>) -> f64 {
    match unit.map(|u| u.trim().to_ascii_uppercase()).as_deref() {
        Some("WH") => energy / 1000.0,
        Some("MWH") => energy * 1000.0,
        _ => energy,
    }
}
