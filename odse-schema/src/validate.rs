use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::datetime;
use time::OffsetDateTime;

use crate::{CanonicalRecord, ErrorType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationCode {
    RequiredFieldMissing,
    TypeMismatch,
    EnumMismatch,
    OutOfBounds,
    ExceedsPhysicalMaximum,
    StateProductionMismatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub message: String,
    pub code: ViolationCode,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>, code: ViolationCode) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code,
        }
    }
}

/// Outcome of validating one record or document. All-or-nothing per
/// record: any error rejects the record wholly. Warnings never affect
/// validity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub errors: Vec<Violation>,
    pub warnings: Vec<Violation>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Flat list of violation descriptions, for report output.
    pub fn violations(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|v| format!("{}: {}", v.path, v.message))
            .collect()
    }
}

const MIN_TS: OffsetDateTime = datetime!(2000-01-01 00:00:00 UTC);
const MAX_TS: OffsetDateTime = datetime!(2100-01-01 00:00:00 UTC);

/// Validate a typed record against the canonical contract.
///
/// Rules:
/// - kWh must be a finite, non-negative number.
/// - PF, when present, must lie in [0, 1].
/// - timestamp must fall inside a broad sanity window
///   [2000-01-01, 2100-01-01].
pub fn validate_record(record: &CanonicalRecord) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !record.kwh.is_finite() {
        result.errors.push(Violation::new(
            "$.kWh",
            format!("expected finite number, got {}", record.kwh),
            ViolationCode::TypeMismatch,
        ));
    } else if record.kwh < 0.0 {
        result.errors.push(Violation::new(
            "$.kWh",
            "kWh must be >= 0",
            ViolationCode::OutOfBounds,
        ));
    }

    if let Some(pf) = record.pf {
        if !(0.0..=1.0).contains(&pf) {
            result.errors.push(Violation::new(
                "$.PF",
                "power factor must be between 0 and 1",
                ViolationCode::OutOfBounds,
            ));
        }
    }

    if record.timestamp < MIN_TS || record.timestamp > MAX_TS {
        result.errors.push(Violation::new(
            "$.timestamp",
            "timestamp out of allowed range",
            ViolationCode::OutOfBounds,
        ));
    }

    result
}

/// Semantic-level checks on an already schema-valid record. These
/// produce warnings, not errors: physically implausible values are
/// surfaced but the record is not rejected.
pub fn validate_semantic(record: &CanonicalRecord, capacity_kw: Option<f64>) -> ValidationResult {
    let mut result = ValidationResult::default();

    if let Some(capacity) = capacity_kw {
        // Assumes a one-hour interval; callers with finer granularity
        // should scale capacity accordingly.
        let max_kwh = capacity * 1.1;
        if record.kwh > max_kwh {
            result.warnings.push(Violation::new(
                "$.kWh",
                format!(
                    "kWh ({}) exceeds maximum possible ({max_kwh}) for {capacity}kW capacity",
                    record.kwh
                ),
                ViolationCode::ExceedsPhysicalMaximum,
            ));
        }
    }

    if record.error_type == ErrorType::Offline && record.kwh > 10.0 {
        result.warnings.push(Violation::new(
            "$",
            format!(
                "significant production ({} kWh) reported with error_type 'offline'",
                record.kwh
            ),
            ViolationCode::StateProductionMismatch,
        ));
    }

    result
}

/// Validate a JSON document against the wire contract: either a single
/// record object or an array of record objects.
pub fn validate_document(value: &Value) -> ValidationResult {
    match value {
        Value::Object(_) => validate_object(value, "$"),
        Value::Array(items) => {
            let mut result = ValidationResult::default();
            for (idx, item) in items.iter().enumerate() {
                let sub = validate_object(item, &format!("$[{idx}]"));
                result.errors.extend(sub.errors);
                result.warnings.extend(sub.warnings);
            }
            result
        }
        other => {
            let mut result = ValidationResult::default();
            result.errors.push(Violation::new(
                "$",
                format!("expected object or array, got {}", json_type_name(other)),
                ViolationCode::TypeMismatch,
            ));
            result
        }
    }
}

fn validate_object(value: &Value, path: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    let Some(obj) = value.as_object() else {
        result.errors.push(Violation::new(
            path,
            format!("expected object, got {}", json_type_name(value)),
            ViolationCode::TypeMismatch,
        ));
        return result;
    };

    for field in ["timestamp", "kWh", "error_type"] {
        if !obj.contains_key(field) {
            result.errors.push(Violation::new(
                format!("{path}.{field}"),
                format!("required field '{field}' is missing"),
                ViolationCode::RequiredFieldMissing,
            ));
        }
    }
    if !result.errors.is_empty() {
        return result;
    }

    match &obj["timestamp"] {
        Value::String(ts) => {
            if OffsetDateTime::parse(ts, &Rfc3339).is_err() {
                result.errors.push(Violation::new(
                    format!("{path}.timestamp"),
                    format!("'{ts}' is not an RFC 3339 timestamp with UTC offset"),
                    ViolationCode::TypeMismatch,
                ));
            }
        }
        other => {
            result.errors.push(Violation::new(
                format!("{path}.timestamp"),
                format!("expected string, got {}", json_type_name(other)),
                ViolationCode::TypeMismatch,
            ));
        }
    }

    match obj["kWh"].as_f64() {
        Some(kwh) if kwh < 0.0 => {
            result.errors.push(Violation::new(
                format!("{path}.kWh"),
                "kWh must be >= 0",
                ViolationCode::OutOfBounds,
            ));
        }
        Some(_) => {}
        None => {
            result.errors.push(Violation::new(
                format!("{path}.kWh"),
                format!("expected number, got {}", json_type_name(&obj["kWh"])),
                ViolationCode::TypeMismatch,
            ));
        }
    }

    let error_type_ok = obj["error_type"]
        .as_str()
        .map(|s| s.parse::<ErrorType>().is_ok())
        .unwrap_or(false);
    if !error_type_ok {
        result.errors.push(Violation::new(
            format!("{path}.error_type"),
            format!(
                "value {} not in enum {:?}",
                obj["error_type"],
                ErrorType::ALL.map(|e| e.as_str())
            ),
            ViolationCode::EnumMismatch,
        ));
    }

    if let Some(pf) = obj.get("PF").and_then(Value::as_f64) {
        if !(0.0..=1.0).contains(&pf) {
            result.errors.push(Violation::new(
                format!("{path}.PF"),
                "power factor must be between 0 and 1",
                ViolationCode::OutOfBounds,
            ));
        }
    }

    result
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
