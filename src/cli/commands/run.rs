//! Run command implementation

use crate::config::DynarunConfig;
use crate::session::{EntryStatus, SessionManager, SessionReport, SessionRequest};
use anyhow::{Context, Result};
use std::path::PathBuf;

pub struct RunArgs {
    pub entry: String,
    pub analyses: Vec<String>,
    pub name: Option<String>,
    pub coverage: bool,
    pub coverage_dir: Option<PathBuf>,
    pub init: Option<String>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub args: Vec<String>,
}

impl RunArgs {
    fn into_request(self) -> SessionRequest {
        let mut request = SessionRequest::new(self.entry, self.analyses)
            .with_coverage(self.coverage)
            .with_args(self.args);
        if let Some(name) = self.name {
            request = request.with_name(name);
        }
        if let Some(root) = self.coverage_dir {
            request = request.with_coverage_root(root);
        }
        if let Some(root) = self.output {
            request = request.with_output_root(root);
        }
        if let Some(init) = self.init {
            request = request.with_init(init);
        }
        request
    }
}

/// Run one analysis session and return the exit code of the entry
pub async fn run_session_command(config: DynarunConfig, args: RunArgs) -> Result<i32> {
    let json = args.json;
    let manager = SessionManager::from_config(config);
    let report = manager.start(args.into_request()).await?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize session report")?;
        println!("{rendered}");
    } else {
        print_summary(&report);
    }

    Ok(exit_code_for(&report.entry_status))
}

fn print_summary(report: &SessionReport) {
    println!("Session {} finished: {}", report.session_id, report.entry_status);
    println!("   Output: {}", report.output_dir.display());
    if let Some(coverage) = &report.coverage {
        println!(
            "   Coverage: {} files, {} hits",
            coverage.files().count(),
            coverage.total_hits()
        );
    }
}

pub(crate) fn exit_code_for(status: &EntryStatus) -> i32 {
    match status {
        EntryStatus::Succeeded => 0,
        EntryStatus::Failed { exit_code } if *exit_code != 0 => *exit_code,
        _ => 1,
    }
}
