//! Instrument command implementation

use crate::config::DynarunConfig;
use crate::instrument::{BatchReport, InstrumentRequest, InstrumentationDriver, JobOutcome};
use crate::subprocess::SubprocessManager;
use anyhow::Result;
use std::path::PathBuf;

pub struct InstrumentArgs {
    pub directory: PathBuf,
    pub analysis: String,
    pub module: Option<String>,
    pub external_dir: bool,
    pub ignore: Option<PathBuf>,
    pub quiet: bool,
}

impl InstrumentArgs {
    fn into_request(self) -> InstrumentRequest {
        let mut request = InstrumentRequest::new(self.directory, self.analysis)
            .with_external_copy(self.external_dir);
        if let Some(ignore) = self.ignore {
            request = request.with_ignore_file(ignore);
        }
        if let Some(module) = self.module {
            request = request.with_module_paths(module);
        }
        request
    }
}

/// Instrument a source tree; exits non-zero when any file failed
pub async fn run_instrument_command(config: DynarunConfig, args: InstrumentArgs) -> Result<i32> {
    let show_progress = !args.quiet;
    let driver =
        InstrumentationDriver::new(config, SubprocessManager::production()).with_progress(show_progress);
    let report = driver.instrument(args.into_request()).await?;

    print_summary(&report);
    Ok(if report.has_failures() { 1 } else { 0 })
}

fn print_summary(report: &BatchReport) {
    for ignored in &report.ignored {
        println!("Ignored {}", ignored.path().display());
    }
    for outcome in report.failed() {
        if let JobOutcome::Failed {
            source_file,
            reason,
            ..
        } = outcome
        {
            println!("Error at {}: {}", source_file.display(), reason);
        }
    }
    println!(
        "Instrumented {} of {} files in {:.2?}",
        report.succeeded().count(),
        report.outcomes.len(),
        report.duration
    );
}
