use crate::config::DynarunConfig;
use crate::error::{DynarunError, ErrorCode, Result};
use crate::subprocess::{ProcessCommandBuilder, ProcessRunner, SubprocessManager};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use super::{
    collect_sources, mirror_tree, BatchReport, IgnoreRules, InstrumentRequest, InstrumentationJob,
    JobOutcome, WalkResult, WorkerPool,
};

/// Runs the external instrumenter over a source tree
pub struct InstrumentationDriver {
    config: DynarunConfig,
    subprocess: SubprocessManager,
    show_progress: bool,
}

impl InstrumentationDriver {
    pub fn new(config: DynarunConfig, subprocess: SubprocessManager) -> Self {
        Self {
            config,
            subprocess,
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while jobs run
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub async fn instrument(&self, request: InstrumentRequest) -> Result<BatchReport> {
        let start = Instant::now();

        let rules = match &request.ignore_file {
            Some(path) => IgnoreRules::load(path).await?,
            None => IgnoreRules::default(),
        };

        if request.analysis_spec.trim().is_empty() {
            return Err(DynarunError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "an analysis spec is required for instrumentation",
            ));
        }
        if !request.root_dir.is_dir() {
            return Err(DynarunError::storage_with_code(
                ErrorCode::STORAGE_NOT_FOUND,
                format!("{} is not a directory", request.root_dir.display()),
                Some(request.root_dir.clone()),
            ));
        }

        let root = if request.external_copy {
            mirror_tree(&request.root_dir).await?
        } else {
            request.root_dir.clone()
        };

        let WalkResult { sources, ignored } = {
            let root = root.clone();
            let extension = self.config.source_extension.clone();
            tokio::task::spawn_blocking(move || collect_sources(&root, &rules, &extension))
                .await
                .map_err(|e| {
                    DynarunError::storage_with_code(
                        ErrorCode::STORAGE_IO_ERROR,
                        "Source walk task failed",
                        Some(request.root_dir.clone()),
                    )
                    .with_source(e)
                })??
        };

        let jobs: Vec<InstrumentationJob> = sources
            .into_iter()
            .map(|source| self.build_job(source, &request))
            .collect::<Result<_>>()?;
        info!(
            "Instrumenting {} files under {} ({} ignored)",
            jobs.len(),
            root.display(),
            ignored.len()
        );

        let pool = WorkerPool::new(
            self.config.effective_workers(),
            self.config.max_jobs_per_worker,
        );
        debug!(
            "Worker pool: {} workers, {} jobs per worker",
            pool.workers(),
            pool.max_jobs_per_worker()
        );

        let progress = if self.show_progress {
            create_progress_bar(jobs.len())
        } else {
            ProgressBar::hidden()
        };

        let runner = self.subprocess.runner();
        let bar = progress.clone();
        let (mut outcomes, metrics) = pool
            .run(jobs, move |job| {
                let runner = Arc::clone(&runner);
                let bar = bar.clone();
                async move {
                    let outcome = run_job(runner.as_ref(), job).await;
                    if let JobOutcome::Failed { source_file, .. } = &outcome {
                        print_line(&bar, format!("Error at {}", source_file.display()));
                    }
                    bar.inc(1);
                    outcome
                }
            })
            .await;
        progress.finish_and_clear();

        outcomes.sort_by(|a, b| a.source_file().cmp(b.source_file()));
        let duration = start.elapsed();
        info!("Instrumentation took {:?}", duration);

        Ok(BatchReport {
            root,
            outcomes,
            ignored,
            duration,
            metrics,
        })
    }

    fn build_job(&self, source_file: PathBuf, request: &InstrumentRequest) -> Result<InstrumentationJob> {
        let mut builder = ProcessCommandBuilder::from_argv(self.config.instrumenter.as_slice()).ok_or_else(|| {
            DynarunError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "instrumenter command must not be empty",
            )
        })?;

        builder = builder
            .arg("--files")
            .arg(&source_file.to_string_lossy())
            .arg("--analysis")
            .arg(&request.analysis_spec);
        if let Some(ignore) = &request.ignore_file {
            builder = builder.arg("--ignore").arg(&ignore.to_string_lossy());
        }
        if let Some(modules) = &request.module_paths {
            builder = builder.arg("--module").arg(modules);
        }

        Ok(InstrumentationJob {
            source_file,
            command: builder.build(),
            analysis_spec: request.analysis_spec.clone(),
        })
    }
}

async fn run_job(runner: &dyn ProcessRunner, job: InstrumentationJob) -> JobOutcome {
    let InstrumentationJob {
        source_file,
        command,
        analysis_spec,
    } = job;
    debug!("Instrumenting {} for {}", source_file.display(), analysis_spec);

    match runner.run(command).await {
        Ok(output) if output.status.success() => JobOutcome::Succeeded {
            source_file,
            duration: output.duration,
        },
        Ok(output) => {
            error!("Error at {} ({})", source_file.display(), output.status);
            if !output.stderr.is_empty() {
                debug!("Instrumenter stderr for {}: {}", source_file.display(), output.stderr);
            }
            JobOutcome::Failed {
                exit_code: output.status.code(),
                reason: format!("instrumenter exited with {}", output.status),
                source_file,
            }
        }
        Err(e) => {
            error!("Error at {}: {}", source_file.display(), e);
            JobOutcome::Failed {
                source_file,
                reason: e.to_string(),
                exit_code: None,
            }
        }
    }
}

/// A hidden bar drops `println`, so quiet runs write to stdout directly
fn print_line(bar: &ProgressBar, line: String) {
    if bar.is_hidden() {
        println!("{line}");
    } else {
        bar.println(line);
    }
}

fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
    {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb
}

impl std::fmt::Debug for InstrumentationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentationDriver")
            .field("config", &self.config)
            .field("show_progress", &self.show_progress)
            .finish()
    }
}
