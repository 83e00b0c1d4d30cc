//! Checked-in sample payloads, one per OEM, shape-matching each
//! vendor's documented raw format. These stand in for live vendor
//! responses in fixture mode and in tests.

use crate::transform::TransformOptions;

/// Raw fixture payload for a canonical source identifier.
pub fn payload(source: &str) -> Option<&'static str> {
    let raw = match source {
        "huawei" => include_str!("../fixtures/huawei.csv"),
        "enphase" => include_str!("../fixtures/enphase.json"),
        "solarman" => include_str!("../fixtures/solarman.csv"),
        "solaredge" => include_str!("../fixtures/solaredge.json"),
        "fronius" => include_str!("../fixtures/fronius.json"),
        "switch" => include_str!("../fixtures/switch.csv"),
        "sma" => include_str!("../fixtures/sma.json"),
        "fimer" => include_str!("../fixtures/fimer.json"),
        "solis" => include_str!("../fixtures/solis.json"),
        "solaxcloud" => include_str!("../fixtures/solaxcloud.json"),
        _ => return None,
    };
    Some(raw)
}

/// Per-call parameters that fixture-mode execution supplies alongside
/// the payload. The enphase fixture reports 9 of an expected 10
/// devices, exercising the completeness-ratio status derivation.
pub fn options(source: &str) -> TransformOptions {
    let mut opts = TransformOptions::default();
    if source == "enphase" {
        opts.expected_devices = Some(10);
    }
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::CANONICAL_SOURCES;

    #[test]
    fn every_canonical_source_has_a_fixture() {
        for source in CANONICAL_SOURCES {
            assert!(payload(source).is_some(), "missing fixture for {source}");
        }
    }

    #[test]
    fn unknown_source_has_no_fixture() {
        assert!(payload("tesla").is_none());
    }
}
