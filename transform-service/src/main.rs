use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::Parser;

use transform_service::transform::CANONICAL_SOURCES;
use transform_service::{config, observability, Harness, Mode};

/// Check every OEM transform against fixture or live payloads.
#[derive(Debug, Parser)]
#[command(name = "transform-service", version)]
struct Args {
    /// Input mode: fixture payloads, live endpoints, or mixed.
    #[arg(long, value_enum, default_value = "mixed")]
    mode: Mode,

    /// Comma-separated OEM identifiers, or "all".
    #[arg(long, default_value = "all")]
    oems: String,

    /// How many sources to check concurrently.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Env file with ODS_LIVE_* variables; process env wins.
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

fn select_sources(oems: &str) -> Result<Vec<String>, String> {
    if oems.trim().eq_ignore_ascii_case("all") {
        return Ok(CANONICAL_SOURCES.iter().map(|s| s.to_string()).collect());
    }
    let mut selected = Vec::new();
    for part in oems.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id = transform_service::transform::lookup(part)
            .map_err(|_| format!("unknown OEM '{part}'"))?
            .descriptor()
            .id;
        if !selected.contains(&id.to_string()) {
            selected.push(id.to_string());
        }
    }
    if selected.is_empty() {
        return Err("no OEMs selected".to_string());
    }
    Ok(selected)
}

#[tokio::main]
async fn main() -> ExitCode {
    observability::init_tracing();
    let args = Args::parse();

    if let Err(e) = config::load_env_file(&args.env_file)
        .with_context(|| format!("failed to read {}", args.env_file.display()))
    {
        eprintln!("{e:#}");
        return ExitCode::from(2);
    }

    let sources = match select_sources(&args.oems) {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let harness = Harness::new(args.mode, sources).with_concurrency(args.concurrency);

    let cancel = harness.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let report = harness.run().await;

    for s in &report.sources {
        let tag = if s.passed { "[PASS]" } else { "[FAIL]" };
        println!("{tag} {} ({}): {}", s.source, s.input.as_str(), s.detail);
    }
    let failed = report.failed_count();
    println!(
        "{} source(s) checked, {} failed",
        report.sources.len(),
        failed
    );

    if failed > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_selects_every_canonical_source() {
        let sources = select_sources("all").unwrap();
        assert_eq!(sources.len(), CANONICAL_SOURCES.len());
    }

    #[test]
    fn aliases_and_case_resolve_to_canonical_ids() {
        let sources = select_sources("SolisCloud, fronius").unwrap();
        assert_eq!(sources, vec!["solis".to_string(), "fronius".to_string()]);
    }

    #[test]
    fn duplicate_selection_is_collapsed() {
        let sources = select_sources("huawei,huawei,HUAWEI").unwrap();
        assert_eq!(sources, vec!["huawei".to_string()]);
    }

    #[test]
    fn unknown_oem_is_rejected() {
        assert!(select_sources("tesla").is_err());
        assert!(select_sources("").is_err());
    }
}
