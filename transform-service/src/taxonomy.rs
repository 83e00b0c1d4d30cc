//! Vendor status vocabularies and their mapping onto the canonical
//! `error_type` set.
//!
//! The tables are declarative: adding a vendor (or a newly documented
//! token) is an additive edit here, not a logic change. Lookups are
//! total — anything outside the documented vocabulary maps to
//! `unknown`, and the miss is logged and counted rather than dropped.

use odse_schema::ErrorType;

struct Vocabulary {
    source: &'static str,
    /// Token → canonical error type. Tokens are stored in the
    /// vendor-documented canonical casing; lookups uppercase first.
    entries: &'static [(&'static str, ErrorType)],
}

static VOCABULARIES: &[Vocabulary] = &[
    Vocabulary {
        source: "solarman",
        entries: &[
            ("NORMAL", ErrorType::Normal),
            ("OPERATING", ErrorType::Normal),
            ("ONLINE", ErrorType::Normal),
            ("WARNING", ErrorType::Warning),
            ("DEGRADED", ErrorType::Warning),
            ("FAULT", ErrorType::Fault),
            ("ERROR", ErrorType::Fault),
            ("OFFLINE", ErrorType::Offline),
            ("DISCONNECTED", ErrorType::Offline),
            ("NO DATA", ErrorType::Offline),
            ("STANDBY", ErrorType::Standby),
            ("IDLE", ErrorType::Standby),
            ("WAITING", ErrorType::Standby),
            ("1", ErrorType::Normal),
            ("0", ErrorType::Offline),
        ],
    },
    Vocabulary {
        source: "fimer",
        entries: &[
            ("OK", ErrorType::Normal),
            ("ONLINE", ErrorType::Normal),
            ("RUNNING", ErrorType::Normal),
            ("WARNING", ErrorType::Warning),
            ("DEGRADED", ErrorType::Warning),
            ("FAULT", ErrorType::Fault),
            ("ERROR", ErrorType::Fault),
            ("OFFLINE", ErrorType::Offline),
            ("DISCONNECTED", ErrorType::Offline),
            ("STANDBY", ErrorType::Standby),
            ("SLEEP", ErrorType::Standby),
        ],
    },
    Vocabulary {
        // SolarEdge inverter operating modes.
        source: "solaredge",
        entries: &[
            ("MPPT", ErrorType::Normal),
            ("ON", ErrorType::Normal),
            ("PRODUCTION", ErrorType::Normal),
            ("OFF", ErrorType::Offline),
            ("SLEEPING", ErrorType::Standby),
            ("STARTING", ErrorType::Standby),
            ("SHUTTING_DOWN", ErrorType::Standby),
            ("STANDBY", ErrorType::Standby),
            ("NIGHT_MODE", ErrorType::Standby),
            ("FAULT", ErrorType::Fault),
            ("ERROR", ErrorType::Fault),
            ("MAINTENANCE", ErrorType::Warning),
            ("LOCKED_GRID", ErrorType::Warning),
            ("LOCKED_INTERNAL", ErrorType::Warning),
        ],
    },
    Vocabulary {
        // SMA event severities; device status tokens are the fallback
        // vocabulary below.
        source: "sma",
        entries: &[
            ("INFO", ErrorType::Normal),
            ("WARNING", ErrorType::Warning),
            ("MINOR", ErrorType::Warning),
            ("MAJOR", ErrorType::Critical),
            ("CRITICAL", ErrorType::Fault),
            ("FAULT", ErrorType::Fault),
        ],
    },
    Vocabulary {
        source: "sma-status",
        entries: &[
            ("ONLINE", ErrorType::Normal),
            ("RUNNING", ErrorType::Normal),
            ("STANDBY", ErrorType::Standby),
            ("OFFLINE", ErrorType::Offline),
            ("ERROR", ErrorType::Fault),
            ("UNKNOWN", ErrorType::Unknown),
        ],
    },
    Vocabulary {
        source: "solis",
        entries: &[
            ("NORMAL", ErrorType::Normal),
            ("RUNNING", ErrorType::Normal),
            ("WARNING", ErrorType::Warning),
            ("ALARM", ErrorType::Warning),
            ("FAULT", ErrorType::Fault),
            ("ERROR", ErrorType::Fault),
            ("OFFLINE", ErrorType::Offline),
            ("STANDBY", ErrorType::Standby),
            ("SLEEP", ErrorType::Standby),
            ("UNKNOWN", ErrorType::Unknown),
        ],
    },
    Vocabulary {
        // SolaXCloud API v2 numeric inverter status codes.
        source: "solaxcloud",
        entries: &[
            ("100", ErrorType::Standby),
            ("101", ErrorType::Standby),
            ("102", ErrorType::Normal),
            ("103", ErrorType::Warning),
            ("104", ErrorType::Fault),
            ("105", ErrorType::Warning),
            ("106", ErrorType::Standby),
            ("107", ErrorType::Warning),
            ("108", ErrorType::Standby),
            ("109", ErrorType::Standby),
            ("110", ErrorType::Standby),
            ("111", ErrorType::Standby),
            ("112", ErrorType::Standby),
            ("113", ErrorType::Warning),
            ("114", ErrorType::Standby),
            ("130", ErrorType::Warning),
            ("131", ErrorType::Normal),
            ("132", ErrorType::Warning),
            ("133", ErrorType::Warning),
        ],
    },
];

/// Huawei FusionSolar inverter-state code classes.
static HUAWEI_CODES: &[(ErrorType, &[i64])] = &[
    (
        ErrorType::Normal,
        &[
            0, 1, 2, 3, 256, 512, 1025, 1026, 1280, 1281, 1536, 1792, 2048, 2304, 40960, 49152,
        ],
    ),
    (ErrorType::Warning, &[513, 514, 772, 773, 774]),
    (ErrorType::Critical, &[768, 770, 771, 45056]),
    (ErrorType::Fault, &[769, 1024]),
];

/// Fronius Solar API device status codes.
static FRONIUS_CODES: &[(i64, ErrorType)] = &[
    (0, ErrorType::Normal),
    (1, ErrorType::Normal),
    (2, ErrorType::Normal),
    (3, ErrorType::Normal),
    (4, ErrorType::Normal),
    (5, ErrorType::Normal),
    (6, ErrorType::Normal),
    (7, ErrorType::Standby),
    (8, ErrorType::Standby),
    (9, ErrorType::Fault),
    (10, ErrorType::Offline),
    (11, ErrorType::Warning),
    (12, ErrorType::Warning),
];

/// Vocabulary lookup without the unknown-token side effects. Used where
/// a transform consults a secondary vocabulary before giving up.
pub fn try_token(source: &str, token: &str) -> Option<ErrorType> {
    let vocab = VOCABULARIES.iter().find(|v| v.source == source)?;
    let upper = token.trim().to_ascii_uppercase();
    vocab
        .entries
        .iter()
        .find(|(key, _)| *key == upper)
        .map(|(_, et)| *et)
}

/// Map a vendor status token onto the canonical set. Tokens outside the
/// documented vocabulary map to `unknown` and are logged and counted.
pub fn map_token(source: &'static str, token: &str) -> ErrorType {
    match try_token(source, token) {
        Some(et) => et,
        None => unmapped(source, token),
    }
}

/// Record an out-of-vocabulary token and return `unknown`.
pub fn unmapped(source: &'static str, token: &str) -> ErrorType {
    tracing::warn!(source, token, "status token outside documented vocabulary");
    metrics::counter!("status_tokens_unmapped_total").increment(1);
    ErrorType::Unknown
}

/// Huawei state classification: a zero running state means the device
/// is offline regardless of the inverter-state code.
pub fn huawei_state(code: Option<i64>, run_state: Option<i64>) -> ErrorType {
    if run_state == Some(0) {
        return ErrorType::Offline;
    }
    let Some(code) = code else {
        return ErrorType::Unknown;
    };
    for (error_type, codes) in HUAWEI_CODES {
        if codes.contains(&code) {
            return *error_type;
        }
    }
    unmapped("huawei", &code.to_string())
}

pub fn fronius_status(code: Option<i64>) -> ErrorType {
    let Some(code) = code else {
        return ErrorType::Unknown;
    };
    match FRONIUS_CODES.iter().find(|(c, _)| *c == code) {
        Some((_, et)) => *et,
        None => unmapped("fronius", &code.to_string()),
    }
}
