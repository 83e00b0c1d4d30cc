//! Enphase Envoy production JSON: interval readings with delivered
//! watt-hours and the number of microinverters that reported. Status is
//! derived from the reporting ratio against `expected_devices` — the
//! vendor has no status vocabulary of its own.

use serde_json::Value;

use odse_schema::{CanonicalRecord, ErrorType};

use super::{
    epoch_timestamp, field_f64, non_negative, require_f64, AccessClass, OemTransform, PayloadKind,
    RecordStream, SourceDescriptor, TransformError, TransformOptions,
};

pub struct Enphase;

static DESCRIPTOR: SourceDescriptor = SourceDescriptor {
    id: "enphase",
    payload: PayloadKind::Json,
    access: AccessClass::AccountRequired,
};

const SOURCE: &str = "enphase";

impl OemTransform for Enphase {
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
        let expected_devices = opts.expected_devices;
        let asset_id = opts.asset_id.clone();

        let items: Vec<Value> = match payload {
            Value::Object(mut obj) => match obj.remove("production") {
                Some(Value::Array(items)) => items,
                Some(other) => {
                    return Err(TransformError::malformed(
                        SOURCE,
                        "production",
                        format!("expected array, got {other}"),
                    ))
                }
                None => vec![Value::Object(obj)],
            },
            Value::Array(items) => items,
            other => {
                return Err(TransformError::malformed(
                    SOURCE,
                    "payload",
                    format!("expected object or array, got {other}"),
                ))
            }
        };

        let iter = items.into_iter().map(move |item| {
            if !item.is_object() {
                return Err(TransformError::malformed(
                    SOURCE,
                    "production",
                    "interval entry is not an object",
                ));
            }

            let end_at = require_f64(SOURCE, &item, "end_at")?;
            let ts = epoch_timestamp(end_at).ok_or_else(|| {
                TransformError::malformed(SOURCE, "end_at", format!("invalid epoch {end_at}"))
            })?;
            let wh_del = non_negative(SOURCE, "wh_del", require_f64(SOURCE, &item, "wh_del")?)?;
            let devices_reporting = field_f64(&item, "devices_reporting").map(|f| f as i64);

            let mut rec = CanonicalRecord::new(
                ts,
                wh_del / 1000.0,
                derive_status(devices_reporting, expected_devices),
            );
            rec.asset_id = asset_id.clone();
            Ok(rec)
        });

        Ok(Box::new(iter))
    }
}

/// Reporting-completeness status: a full complement is normal, a small
/// shortfall a warning, a large one critical, none reporting offline.
fn derive_status(devices_reporting: Option<i64>, expected_devices: Option<u32>) -> ErrorType {
    let Some(reporting) = devices_reporting else {
        return ErrorType::Offline;
    };
    let Some(expected) = expected_devices.filter(|e| *e > 0) else {
        return if reporting == 0 {
            ErrorType::Offline
        } else {
            ErrorType::Normal
        };
    };

    let ratio = reporting as f64 / f64::from(expected);
    if ratio >= 0.95 {
        ErrorType::Normal
    } else if ratio >= 0.80 {
        ErrorType::Warning
    } else if reporting > 0 {
        ErrorType::Critical
    } else {
        ErrorType::Offline
    }
}
