//! SolaXCloud API v2 JSON: a `result`/`data` block (object or array)
//! with upload time, AC power, daily yield, and a numeric inverter
//! status code. The API-level `code` field is carried through as
//! `oem_error_code`.

use serde_json::Value;

use odse_schema::{CanonicalRecord, ErrorType};

use crate::taxonomy;

use super::{
    field_f64, field_token, non_negative, parse_timestamp, AccessClass, OemTransform, PayloadKind,
    RecordStream, SourceDescriptor, TransformError, TransformOptions,
};

pub struct SolaxCloud;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "solaxcloud",
    payload: PayloadKind::Json,
    access: AccessClass::Sandbox,
};

const SOURCE: &str = "solaxcloud";

impl OemTransform for SolaxCloud {
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

        let oem_error_code = payload
            .as_object()
            .and_then(|obj| obj.get("code"))
            .and_then(|code| match code {
                Value::Number(n) => Some(n.to_string()),
                Value::String(s) => Some(s.clone()),
                _ => None,
            });

        let entries = extract_entries(&payload)?;

        let iter = entries.into_iter().map(move |entry| {
            let ts_text = field_token(&entry, "uploadTime")
                .or_else(|| field_token(&entry, "timestamp"))
                .ok_or_else(|| {
                    TransformError::malformed(SOURCE, "uploadTime", "required field missing")
                })?;
            let ts = parse_timestamp(&ts_text, assumed).ok_or_else(|| {
                TransformError::malformed(SOURCE, "uploadTime", format!("unparseable '{ts_text}'"))
            })?;

            let ac_power_w = field_f64(&entry, "acpower");
            let yield_today = field_f64(&entry, "yieldtoday");

            let kwh = match yield_today {
                Some(y) => non_negative(SOURCE, "yieldtoday", y)?,
                None => {
                    let power = ac_power_w.ok_or_else(|| {
                        TransformError::malformed(
                            SOURCE,
                            "yieldtoday",
                            "neither yieldtoday nor acpower present",
                        )
                    })?;
                    non_negative(SOURCE, "acpower", power)? / 1000.0 * interval_hours
                }
            };

            let status = field_token(&entry, "inverterStatus");
            let error_type = match &status {
                Some(token) => taxonomy::map_token(SOURCE, token),
                None => ErrorType::Unknown,
            };

            let mut rec = CanonicalRecord::new(ts, kwh, error_type);
            rec.error_code = Some(status.unwrap_or_else(|| "unknown".to_string()));
            rec.oem_error_code = oem_error_code.clone();
            rec.kw = ac_power_w.map(|w| w / 1000.0);
            rec.asset_id = asset_id.clone();
            Ok(rec)
        });

        Ok(Box::new(iter))
    }
}

fn extract_entries(payload: &Value) -> Result<Vec<Value>, TransformError> {
    if let Value::Array(items) = payload {
        return Ok(items.iter().filter(|v| v.is_object()).cloned().collect());
    }
    if let Some(obj) = payload.as_object() {
        for key in ["result", "data"] {
            match obj.get(key) {
                Some(Value::Object(_)) => return Ok(vec![obj[key].clone()]),
                Some(Value::Array(items)) => {
                    return Ok(items.iter().filter(|v| v.is_object()).cloned().collect())
                }
                _ => {}
            }
        }
    }
    Err(TransformError::malformed(
        SOURCE,
        "result",
        "no result or data block in payload",
    ))
}
