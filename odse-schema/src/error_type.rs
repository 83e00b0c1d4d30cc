use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical device status classification. Closed set: every transform
/// output carries exactly one of these, and unrecognized vendor tokens
/// map to `Unknown` rather than widening the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Normal,
    Warning,
    Critical,
    Fault,
    Offline,
    Standby,
    Unknown,
}

impl ErrorType {
    pub const ALL: [ErrorType; 7] = [
        ErrorType::Normal,
        ErrorType::Warning,
        ErrorType::Critical,
        ErrorType::Fault,
        ErrorType::Offline,
        ErrorType::Standby,
        ErrorType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Normal => "normal",
            ErrorType::Warning => "warning",
            ErrorType::Critical => "critical",
            ErrorType::Fault => "fault",
            ErrorType::Offline => "offline",
            ErrorType::Standby => "standby",
            ErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(ErrorType::Normal),
            "warning" => Ok(ErrorType::Warning),
            "critical" => Ok(ErrorType::Critical),
            "fault" => Ok(ErrorType::Fault),
            "offline" => Ok(ErrorType::Offline),
            "standby" => Ok(ErrorType::Standby),
            "unknown" => Ok(ErrorType::Unknown),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for et in ErrorType::ALL {
            assert_eq!(et.as_str().parse::<ErrorType>(), Ok(et));
        }
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&ErrorType::Standby).unwrap();
        assert_eq!(json, "\"standby\"");
    }

    #[test]
    fn rejects_unlisted_values() {
        assert!("degraded".parse::<ErrorType>().is_err());
        assert!(serde_json::from_str::<ErrorType>("\"broken\"").is_err());
    }
}
