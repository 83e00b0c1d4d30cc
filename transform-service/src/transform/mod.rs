use std::collections::BTreeMap;
use std::io::Cursor;

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use odse_schema::CanonicalRecord;

pub mod enphase;
pub mod fimer;
pub mod fronius;
pub mod huawei;
pub mod sma;
pub mod solaredge;
pub mod solarman;
pub mod solaxcloud;
pub mod solis;
pub mod switch;

#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error("unknown source '{0}'")]
    UnknownSource(String),
    #[error("[{oem}] malformed payload, field '{field}': {detail}")]
    MalformedPayload {
        oem: &'static str,
        field: String,
        detail: String,
    },
    #[error("invalid transform option '{name}': {detail}")]
    InvalidOption { name: &'static str, detail: String },
}

impl TransformError {
    pub(crate) fn malformed(
        oem: &'static str,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        TransformError::MalformedPayload {
            oem,
            field: field.into(),
            detail: detail.into(),
        }
    }
}

/// Raw payload shape a source emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Csv,
    Json,
    LoggerExport,
}

/// How live access to the vendor endpoint is gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    Demo,
    Sandbox,
    AccountRequired,
    PartnerGated,
}

#[derive(Debug, Clone, Copy)]
pub struct SourceDescriptor {
    pub id: &'static str,
    pub payload: PayloadKind,
    pub access: AccessClass,
}

/// Per-call transform parameters. Deserializable from the
/// `ODS_LIVE_<OEM>_TRANSFORM_KWARGS` environment JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Asset identifier stamped onto every emitted record.
    pub asset_id: Option<String>,
    /// Assumed UTC offset (`±HH:MM`) for sources that report naive
    /// timestamps. Defaults to UTC when unset.
    pub timezone: Option<String>,
    /// Sampling interval used when energy must be derived from power.
    pub interval_minutes: Option<f64>,
    /// Device count a complete enphase snapshot should report.
    pub expected_devices: Option<u32>,
}

impl TransformOptions {
    pub(crate) fn assumed_offset(&self) -> Result<UtcOffset, TransformError> {
        match &self.timezone {
            None => Ok(UtcOffset::UTC),
            Some(tz) => parse_offset(tz).ok_or_else(|| TransformError::InvalidOption {
                name: "timezone",
                detail: format!("'{tz}' is not a ±HH:MM offset"),
            }),
        }
    }

    pub(crate) fn interval_hours(&self, default_minutes: f64) -> f64 {
        self.interval_minutes
            .filter(|m| *m > 0.0)
            .unwrap_or(default_minutes)
            / 60.0
    }
}

fn parse_offset(tz: &str) -> Option<UtcOffset> {
    if tz.len() != 6 || tz.as_bytes()[3] != b':' {
        return None;
    }
    let sign: i8 = match &tz[0..1] {
        "+" => 1,
        "-" => -1,
        _ => return None,
    };
    let hours: i8 = tz[1..3].parse().ok()?;
    let minutes: i8 = tz[4..6].parse().ok()?;
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

/// Lazy, finite, restartable sequence of canonical records. Calling the
/// transform again on the same raw payload restarts the sequence.
pub type RecordStream = Box<dyn Iterator<Item = Result<CanonicalRecord, TransformError>> + Send>;

pub trait OemTransform: Send + Sync {
    fn descriptor(&self) -> &'static SourceDescriptor;

    fn transform(&self, raw: &str, opts: &TransformOptions)
        -> Result<RecordStream, TransformError>;
}

/// Canonical source identifiers, in harness report order.
pub const CANONICAL_SOURCES: [&str; 10] = [
    "huawei",
    "enphase",
    "solarman",
    "solaredge",
    "fronius",
    "switch",
    "sma",
    "fimer",
    "solis",
    "solaxcloud",
];

static REGISTRY: Lazy<BTreeMap<&'static str, &'static dyn OemTransform>> = Lazy::new(|| {
    let mut map: BTreeMap<&'static str, &'static dyn OemTransform> = BTreeMap::new();
    map.insert("huawei", &huawei::Huawei);
    map.insert("enphase", &enphase::Enphase);
    map.insert("solarman", &solarman::Solarman);
    map.insert("solaredge", &solaredge::SolarEdge);
    map.insert("fronius", &fronius::Fronius);
    map.insert("switch", &switch::Switch);
    map.insert("sma", &sma::Sma);
    map.insert("fimer", &fimer::Fimer);
    map.insert("solis", &solis::Solis);
    map.insert("solaxcloud", &solaxcloud::SolaxCloud);
    // Alternate identifiers some operators use for the same vendor.
    map.insert("solax", &solaxcloud::SolaxCloud);
    map.insert("auroravision", &fimer::Fimer);
    map.insert("soliscloud", &solis::Solis);
    map
});

/// Resolve a source identifier to its transform. Identifiers are
/// matched case-insensitively.
pub fn lookup(source: &str) -> Result<&'static dyn OemTransform, TransformError> {
    let key = source.trim().to_ascii_lowercase();
    REGISTRY
        .get(key.as_str())
        .copied()
        .ok_or_else(|| TransformError::UnknownSource(source.to_string()))
}

/// Transform one raw payload for the named source.
pub fn transform(
    raw: &str,
    source: &str,
    opts: &TransformOptions,
) -> Result<RecordStream, TransformError> {
    lookup(source)?.transform(raw, opts)
}

// ---------------------------------------------------------------------------
// Shared parsing helpers used by the per-OEM transforms.

pub(crate) struct CsvPayload {
    pub headers: csv::StringRecord,
    pub records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
}

pub(crate) fn csv_payload(source: &'static str, raw: &str) -> Result<CsvPayload, TransformError> {
    let mut rdr = csv::Reader::from_reader(Cursor::new(raw.as_bytes().to_vec()));
    let headers = rdr
        .headers()
        .map_err(|e| TransformError::malformed(source, "header", e.to_string()))?
        .clone();
    Ok(CsvPayload {
        headers,
        records: rdr.into_records(),
    })
}

/// First non-empty value among the aliased header names a vendor has
/// been observed to use for the same column.
pub(crate) fn row_value<'r>(
    headers: &csv::StringRecord,
    record: &'r csv::StringRecord,
    aliases: &[&str],
) -> Option<&'r str> {
    for name in aliases {
        if let Some(idx) = headers.iter().position(|h| h == *name) {
            if let Some(value) = record.get(idx) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

pub(crate) fn require_row_value<'r>(
    source: &'static str,
    headers: &csv::StringRecord,
    record: &'r csv::StringRecord,
    aliases: &[&str],
) -> Result<&'r str, TransformError> {
    row_value(headers, record, aliases).ok_or_else(|| {
        TransformError::malformed(source, aliases[0], "required column missing or empty")
    })
}

pub(crate) fn parse_f64(
    source: &'static str,
    field: &str,
    text: &str,
) -> Result<f64, TransformError> {
    text.trim()
        .parse()
        .map_err(|_| TransformError::malformed(source, field, format!("'{text}' is not numeric")))
}

/// Readings that feed kWh must be non-negative; a negative value is a
/// payload defect, never clamped to zero.
pub(crate) fn non_negative(
    source: &'static str,
    field: &str,
    value: f64,
) -> Result<f64, TransformError> {
    if value < 0.0 {
        return Err(TransformError::malformed(
            source,
            field,
            format!("negative reading {value}"),
        ));
    }
    Ok(value)
}

/// Numeric JSON value, accepting numbers or numeric strings (vendor
/// APIs are inconsistent about which they emit).
pub(crate) fn json_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse().ok()
            }
        }
        _ => None,
    }
}

pub(crate) fn json_i64(value: &Value) -> Option<i64> {
    json_f64(value).map(|f| f as i64)
}

pub(crate) fn field_f64(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(json_f64)
}

/// Status-token field as text; numeric codes are rendered as their
/// decimal form so vocabulary lookups see one representation.
pub(crate) fn field_token(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn require_f64(
    source: &'static str,
    value: &Value,
    key: &str,
) -> Result<f64, TransformError> {
    field_f64(value, key).ok_or_else(|| {
        TransformError::malformed(source, key, "required numeric field missing or non-numeric")
    })
}

/// Record entries from a normalised-monitoring envelope: a `records` /
/// `data` / `items` / `result` list (or single object), else the
/// payload itself. Entries wrapping their fields in a `normalized`
/// object are unwrapped.
pub(crate) fn normalized_entries(payload: Value) -> Vec<Value> {
    let entries: Vec<Value> = match payload {
        Value::Object(mut obj) => {
            let mut found = None;
            for key in ["records", "data", "items", "result"] {
                match obj.remove(key) {
                    Some(Value::Array(items)) => {
                        found = Some(items.into_iter().filter(|v| v.is_object()).collect());
                        break;
                    }
                    Some(inner @ Value::Object(_)) => {
                        found = Some(vec![inner]);
                        break;
                    }
                    Some(other) => {
                        obj.insert(key.to_string(), other);
                    }
                    None => {}
                }
            }
            found.unwrap_or_else(|| vec![Value::Object(obj)])
        }
        Value::Array(items) => items.into_iter().filter(|v| v.is_object()).collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .map(|entry| match entry.get("normalized") {
            Some(normalized) if normalized.is_object() => normalized.clone(),
            _ => entry,
        })
        .collect()
}

/// Parse a vendor timestamp and normalise it to UTC.
///
/// Accepts RFC 3339 (offset-aware) forms directly; naive
/// `YYYY-MM-DD HH:MM:SS`, `YYYY/MM/DD HH:MM:SS`, and bare-date forms
/// get `assumed` applied before conversion.
pub(crate) fn parse_timestamp(text: &str, assumed: UtcOffset) -> Option<OffsetDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(dt.to_offset(UtcOffset::UTC));
    }

    let naive_dash = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let naive_slash = format_description!("[year]/[month]/[day] [hour]:[minute]:[second]");
    let date_only = format_description!("[year]-[month]-[day]");

    let normalised = text.replacen('T', " ", 1);
    for fmt in [naive_dash, naive_slash] {
        if let Ok(dt) = PrimitiveDateTime::parse(&normalised, fmt) {
            return Some(dt.assume_offset(assumed).to_offset(UtcOffset::UTC));
        }
    }
    if let Ok(date) = Date::parse(text, date_only) {
        return Some(date.midnight().assume_offset(assumed).to_offset(UtcOffset::UTC));
    }

    None
}

/// Unix epoch seconds to UTC.
pub(crate) fn epoch_timestamp(seconds: f64) -> Option<OffsetDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    OffsetDateTime::from_unix_timestamp(seconds as i64).ok()
}

pub(crate) fn clamp_pf(pf: f64) -> f64 {
    pf.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn registry_covers_all_canonical_sources() {
        for source in CANONICAL_SOURCES {
            let t = lookup(source).unwrap();
            assert_eq!(t.descriptor().id, source);
        }
    }

    #[test]
    fn registry_resolves_aliases() {
        assert_eq!(lookup("solax").unwrap().descriptor().id, "solaxcloud");
        assert_eq!(lookup("auroravision").unwrap().descriptor().id, "fimer");
        assert_eq!(lookup("soliscloud").unwrap().descriptor().id, "solis");
        assert_eq!(lookup("HUAWEI").unwrap().descriptor().id, "huawei");
    }

    #[test]
    fn malformed_payload_renders_oem_and_field() {
        let err = TransformError::malformed("huawei", "power", "negative reading -5");
        assert_eq!(
            err.to_string(),
            "[huawei] malformed payload, field 'power': negative reading -5"
        );
        assert!(matches!(
            err,
            TransformError::MalformedPayload { oem: "huawei", .. }
        ));
    }

    #[test]
    fn unknown_source_is_an_error() {
        assert!(matches!(
            lookup("tesla"),
            Err(TransformError::UnknownSource(_))
        ));
    }

    #[test]
    fn naive_timestamp_gets_assumed_offset_then_utc() {
        let offset = parse_offset("+02:00").unwrap();
        let ts = parse_timestamp("2026-02-09 12:00:00", offset).unwrap();
        assert_eq!(ts, datetime!(2026-02-09 10:00:00 UTC));
        assert_eq!(ts.offset(), UtcOffset::UTC);
    }

    #[test]
    fn offset_aware_timestamp_is_normalised_to_utc() {
        let ts = parse_timestamp("2026-02-09T12:00:00+05:30", UtcOffset::UTC).unwrap();
        assert_eq!(ts, datetime!(2026-02-09 06:30:00 UTC));
    }

    #[test]
    fn date_only_timestamp_is_midnight() {
        let ts = parse_timestamp("2026-02-08", UtcOffset::UTC).unwrap();
        assert_eq!(ts, datetime!(2026-02-08 00:00:00 UTC));
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        assert!(parse_timestamp("yesterday", UtcOffset::UTC).is_none());
        assert!(parse_timestamp("", UtcOffset::UTC).is_none());
    }

    #[test]
    fn bad_timezone_option_is_rejected() {
        let opts = TransformOptions {
            timezone: Some("CET".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            opts.assumed_offset(),
            Err(TransformError::InvalidOption { name: "timezone", .. })
        ));
    }

    #[test]
    fn negative_reading_is_malformed() {
        assert!(non_negative("huawei", "power", -1.0).is_err());
        assert_eq!(non_negative("huawei", "power", 0.0).unwrap(), 0.0);
    }

    #[test]
    fn numeric_strings_parse_as_json_numbers() {
        assert_eq!(json_f64(&serde_json::json!("4.5")), Some(4.5));
        assert_eq!(json_f64(&serde_json::json!(4.5)), Some(4.5));
        assert_eq!(json_f64(&serde_json::json!("")), None);
        assert_eq!(json_f64(&serde_json::json!(true)), None);
    }

    #[test]
    fn transform_kwargs_deserialize_from_env_json() {
        let opts: TransformOptions =
            serde_json::from_str(r#"{"expected_devices": 10, "timezone": "+01:00"}"#).unwrap();
        assert_eq!(opts.expected_devices, Some(10));
        assert_eq!(opts.assumed_offset().unwrap(), parse_offset("+01:00").unwrap());
    }
}
