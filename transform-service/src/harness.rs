//! Verification harness: resolve an input for each selected OEM,
//! run its transform, validate every emitted record, and report
//! pass/fail per source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use odse_schema::validate_record;

use crate::config::{self, LiveConfig};
use crate::fetch::{self, FetchError};
use crate::fixtures;
use crate::transform::{self, TransformOptions};

/// Where each source's raw payload comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Checked-in fixture payloads only.
    Fixture,
    /// Live endpoints where configured, fixtures otherwise.
    Mixed,
    /// Live endpoints only; unconfigured sources fail.
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Fixture,
    Live,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Fixture => "fixture",
            InputKind::Live => "live",
        }
    }
}

/// Outcome for one source.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: String,
    pub input: InputKind,
    pub passed: bool,
    pub records: usize,
    pub failures: usize,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.sources.iter().all(|s| s.passed)
    }

    pub fn failed_count(&self) -> usize {
        self.sources.iter().filter(|s| !s.passed).count()
    }
}

pub struct Harness {
    mode: Mode,
    sources: Vec<String>,
    concurrency: usize,
    cancel: Arc<AtomicBool>,
}

impl Harness {
    pub fn new(mode: Mode, sources: Vec<String>) -> Self {
        Harness {
            mode,
            sources,
            concurrency: 1,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Flag other tasks can set to stop the run; sources not yet
    /// started when it flips are reported as cancelled.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run every selected source. Reports come back in selection
    /// order regardless of concurrency.
    pub async fn run(&self) -> RunReport {
        let reports = stream::iter(self.sources.iter().cloned())
            .map(|source| {
                let mode = self.mode;
                let cancel = Arc::clone(&self.cancel);
                async move { run_source(&source, mode, &cancel).await }
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;
        RunReport { sources: reports }
    }
}

async fn run_source(source: &str, mode: Mode, cancel: &AtomicBool) -> SourceReport {
    let fail = |input: InputKind, detail: String| SourceReport {
        source: source.to_string(),
        input,
        passed: false,
        records: 0,
        failures: 0,
        detail,
    };

    if cancel.load(Ordering::Relaxed) {
        return fail(InputKind::Fixture, "cancelled".to_string());
    }

    let (raw, opts, input) = match resolve_input(source, mode).await {
        Ok(resolved) => resolved,
        Err(detail) => return fail(input_kind_for(mode), detail),
    };

    if cancel.load(Ordering::Relaxed) {
        return fail(input, "cancelled".to_string());
    }

    let stream = match transform::transform(&raw, source, &opts) {
        Ok(stream) => stream,
        Err(e) => return fail(input, format!("transform failed: {e}")),
    };

    let mut records = 0usize;
    let mut failures = 0usize;
    let mut first_failure = None;
    for item in stream {
        records += 1;
        match item {
            Ok(rec) => {
                let result = validate_record(&rec);
                if !result.is_valid() {
                    failures += 1;
                    if first_failure.is_none() {
                        let v = &result.errors[0];
                        first_failure = Some(format!("{}: {}", v.path, v.message));
                    }
                }
            }
            Err(e) => {
                failures += 1;
                if first_failure.is_none() {
                    first_failure = Some(e.to_string());
                }
            }
        }
    }

    if records == 0 {
        return fail(input, "transform emitted no records".to_string());
    }

    let passed = failures == 0;
    let detail = match first_failure {
        Some(first) => format!("{failures} of {records} record(s) failed, first: {first}"),
        None => format!("{records} record(s) validated"),
    };
    info!(source, input = input.as_str(), passed, records, "source checked");
    SourceReport {
        source: source.to_string(),
        input,
        passed,
        records,
        failures,
        detail,
    }
}

/// Resolve the raw payload and transform options for a source under the
/// given mode. Mixed mode prefers a configured live endpoint and falls
/// back to the fixture.
async fn resolve_input(
    source: &str,
    mode: Mode,
) -> Result<(String, TransformOptions, InputKind), String> {
    let live = if mode == Mode::Fixture {
        None
    } else {
        match config::live_config(source) {
            Ok(cfg) => cfg,
            Err(e) => return Err(e.to_string()),
        }
    };

    match (mode, live) {
        (Mode::Live, None) => Err(FetchError::ConfigMissing(source.to_string()).to_string()),
        (Mode::Live, Some(cfg)) => fetch_live(source, cfg).await,
        (Mode::Mixed, Some(cfg)) => fetch_live(source, cfg).await,
        (Mode::Mixed, None) => {
            info!(source, "live config missing, using fixture");
            fixture_input(source)
        }
        (Mode::Fixture, _) => fixture_input(source),
    }
}

async fn fetch_live(
    source: &str,
    cfg: LiveConfig,
) -> Result<(String, TransformOptions, InputKind), String> {
    match fetch::fetch_payload(&cfg).await {
        Ok(raw) => Ok((raw, cfg.transform_options, InputKind::Live)),
        Err(e) => {
            warn!(source, error = %e, "live fetch failed");
            Err(e.to_string())
        }
    }
}

fn fixture_input(source: &str) -> Result<(String, TransformOptions, InputKind), String> {
    match fixtures::payload(source) {
        Some(raw) => Ok((raw.to_string(), fixtures::options(source), InputKind::Fixture)),
        None => Err(format!("no fixture for '{source}'")),
    }
}

fn input_kind_for(mode: Mode) -> InputKind {
    match mode {
        Mode::Live => InputKind::Live,
        _ => InputKind::Fixture,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::CANONICAL_SOURCES;

    fn all_sources() -> Vec<String> {
        CANONICAL_SOURCES.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn fixture_mode_passes_every_source() {
        let report = Harness::new(Mode::Fixture, all_sources()).run().await;
        assert_eq!(report.sources.len(), CANONICAL_SOURCES.len());
        for s in &report.sources {
            assert!(s.passed, "{}: {}", s.source, s.detail);
            assert_eq!(s.input, InputKind::Fixture);
            assert!(s.records > 0);
        }
        assert!(report.all_passed());
    }

    #[tokio::test]
    async fn report_order_matches_selection_order() {
        let report = Harness::new(Mode::Fixture, all_sources())
            .with_concurrency(4)
            .run()
            .await;
        let order: Vec<&str> = report.sources.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(order, CANONICAL_SOURCES.to_vec());
    }

    #[tokio::test]
    async fn live_mode_without_config_fails() {
        let report = Harness::new(Mode::Live, vec!["huawei".to_string()])
            .run()
            .await;
        let s = &report.sources[0];
        assert!(!s.passed);
        assert!(s.detail.contains("live config missing"), "{}", s.detail);
        assert_eq!(report.failed_count(), 1);
    }

    #[tokio::test]
    async fn mixed_mode_falls_back_to_fixture_without_config() {
        let sources = vec!["solis".to_string(), "sma".to_string()];
        let report = Harness::new(Mode::Mixed, sources).run().await;
        for s in &report.sources {
            assert!(s.passed, "{}: {}", s.source, s.detail);
            assert_eq!(s.input, InputKind::Fixture);
        }
    }

    #[tokio::test]
    async fn mixed_mode_prefers_configured_live_endpoint() {
        // Reserved TEST-NET-1 address: the live fetch must be attempted
        // and fail, rather than silently falling back to the fixture.
        std::env::set_var("ODS_LIVE_HUAWEI_URL", "http://192.0.2.1:9/export");
        std::env::set_var("ODS_LIVE_HUAWEI_TIMEOUT", "1");
        let report = Harness::new(Mode::Mixed, vec!["huawei".to_string()])
            .run()
            .await;
        std::env::remove_var("ODS_LIVE_HUAWEI_URL");
        std::env::remove_var("ODS_LIVE_HUAWEI_TIMEOUT");

        let s = &report.sources[0];
        assert!(!s.passed);
        assert!(s.detail.contains("192.0.2.1"), "{}", s.detail);
    }

    #[tokio::test]
    async fn cancelled_run_reports_cancellation() {
        let harness = Harness::new(Mode::Fixture, all_sources());
        harness.cancel_flag().store(true, Ordering::Relaxed);
        let report = harness.run().await;
        for s in &report.sources {
            assert!(!s.passed);
            assert_eq!(s.detail, "cancelled");
        }
    }

    #[tokio::test]
    async fn fixture_runs_are_deterministic() {
        let harness = Harness::new(Mode::Fixture, all_sources());
        let first = harness.run().await;
        let second = harness.run().await;
        for (a, b) in first.sources.iter().zip(second.sources.iter()) {
            assert_eq!(a.source, b.source);
            assert_eq!(a.passed, b.passed);
            assert_eq!(a.records, b.records);
            assert_eq!(a.detail, b.detail);
        }
    }
}
