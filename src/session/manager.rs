//! Session manager implementation

use crate::config::DynarunConfig;
use crate::coverage::gather_coverage;
use crate::error::{common, Result};
use crate::plugin::{Analysis, PluginLoader, PluginSpec};
use crate::subprocess::SubprocessManager;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::layout;
use super::{
    EntryResolver, EntryStatus, LifecycleScope, ProcessProgramLoader, ProgramInvocation,
    ProgramLoader, Session, SessionId, SessionReport, SessionRequest,
};

const OUTPUT_DIR_KEY: &str = "output_dir";

/// Filesystem resources owned by one session
struct SessionDirs {
    output_dir: PathBuf,
    coverage_dir: Option<PathBuf>,
    analyses_file: PathBuf,
}

/// Runs analysis sessions end to end
pub struct SessionManager {
    config: DynarunConfig,
    plugins: PluginLoader,
    entries: EntryResolver,
    program_loader: Arc<dyn ProgramLoader>,
}

impl SessionManager {
    pub fn new(
        config: DynarunConfig,
        plugins: PluginLoader,
        program_loader: Arc<dyn ProgramLoader>,
    ) -> Self {
        Self {
            entries: EntryResolver::from_config(&config),
            config,
            plugins,
            program_loader,
        }
    }

    /// Built-in handlers and an interpreter subprocess for the entry
    pub fn from_config(config: DynarunConfig) -> Self {
        let program_loader = Arc::new(ProcessProgramLoader::new(
            SubprocessManager::production(),
            config.interpreter.clone(),
        ));
        Self::new(config, PluginLoader::with_builtins(), program_loader)
    }

    pub fn with_entry_resolver(mut self, entries: EntryResolver) -> Self {
        self.entries = entries;
        self
    }

    pub fn config(&self) -> &DynarunConfig {
        &self.config
    }

    pub fn plugins_mut(&mut self) -> &mut PluginLoader {
        &mut self.plugins
    }

    /// Run one session
    ///
    /// Resolution failures (initial configuration, analyses, entry) are
    /// returned before the entry runs. Once begin hooks have run, end hooks
    /// run on every path. A non-zero entry exit is reported in
    /// [`SessionReport::entry_status`].
    pub async fn start(&self, request: SessionRequest) -> Result<SessionReport> {
        self.start_with_id(SessionId::new(), request).await
    }

    pub(crate) async fn start_with_id(&self, id: SessionId, request: SessionRequest) -> Result<SessionReport> {
        let started_at = Utc::now();
        info!("Starting session {} for {}", id, request.entry);

        let dirs = self
            .prepare_dirs(id, &request)
            .await
            .map_err(|e| e.with_session(id.to_string()))?;

        let specs = self.prepare_specs(&request.analyses, &dirs).await?;

        if let Some(init) = &request.options.init {
            self.run_initial_configuration(init)
                .await
                .map_err(|e| e.with_session(id.to_string()))?;
        }

        let analyses = self.resolve_analyses(&request.analyses, &specs)?;
        let entry = self.entries.resolve(&request.entry)?;
        let session = Session {
            id,
            name: request.options.name,
            output_dir: dirs.output_dir,
            coverage_dir: dirs.coverage_dir,
            analyses_file: dirs.analyses_file,
            entry,
            entry_arg: request.entry,
            entry_args: request.options.entry_args,
            started_at,
        };

        let entry_status = self.execute(&session, analyses).await?;

        let coverage = match &session.coverage_dir {
            Some(dir) => Some(gather_coverage(dir).await?),
            None => None,
        };

        info!("Session {} finished: entry {}", id, entry_status);
        Ok(SessionReport {
            session_id: id,
            name: session.name,
            entry: session.entry.to_string(),
            output_dir: session.output_dir,
            coverage_dir: session.coverage_dir,
            analyses_file: session.analyses_file,
            entry_status,
            coverage,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Create the session's directories, discarding anything already there
    async fn prepare_dirs(&self, id: SessionId, request: &SessionRequest) -> Result<SessionDirs> {
        let temp_dir = &self.config.temp_dir;
        tokio::fs::create_dir_all(temp_dir)
            .await
            .map_err(|e| common::storage_io_error(temp_dir, "create").with_source(e))?;

        let coverage_dir = if request.options.coverage {
            let root = request.options.coverage_root.as_ref().unwrap_or(temp_dir);
            let dir = layout::coverage_dir(root, &id);
            layout::recreate_dir(&dir).await?;
            debug!("Coverage for session {} goes to {}", id, dir.display());
            Some(dir)
        } else {
            None
        };

        let output_root = request.options.output_root.as_ref().unwrap_or(temp_dir);
        let output_dir = layout::output_dir(output_root, &id);
        layout::recreate_dir(&output_dir).await?;

        Ok(SessionDirs {
            output_dir,
            coverage_dir,
            analyses_file: layout::analyses_file(temp_dir, &id),
        })
    }

    /// Parse every analysis spec, point it at the output directory and
    /// persist the result to the analyses file
    async fn prepare_specs(&self, raw: &[String], dirs: &SessionDirs) -> Result<Vec<PluginSpec>> {
        let output_dir = dirs.output_dir.display().to_string();
        let specs = raw
            .iter()
            .map(|spec| {
                PluginSpec::parse(spec).map(|parsed| parsed.with_config_entry(OUTPUT_DIR_KEY, &output_dir))
            })
            .collect::<Result<Vec<_>>>()?;

        layout::write_analyses_file(&dirs.analyses_file, &specs).await?;
        Ok(specs)
    }

    async fn run_initial_configuration(&self, spec: &str) -> Result<()> {
        // Any unusable init reference is a configuration problem
        let handler = self
            .plugins
            .resolve(spec)
            .map_err(|e| common::init_config_not_found(spec).with_source(e))?;
        let mut init = handler.into_initial_configuration(spec)?;

        info!("Running initial configuration {}", init.name());
        init.setup().await
    }

    fn resolve_analyses(&self, raw: &[String], specs: &[PluginSpec]) -> Result<Vec<Box<dyn Analysis>>> {
        raw.iter()
            .zip(specs)
            .map(|(raw, spec)| self.plugins.resolve_spec(spec)?.into_analysis(raw))
            .collect()
    }

    /// Begin hooks, entry, end hooks
    async fn execute(&self, session: &Session, analyses: Vec<Box<dyn Analysis>>) -> Result<EntryStatus> {
        let invocation = ProgramInvocation {
            entry: session.entry.clone(),
            argv: session.argv(),
            context: session.injected_context(),
        };

        let mut scope = LifecycleScope::new(session.id, analyses);
        let outcome = match scope.begin().await {
            Ok(()) => {
                let mut hooks = scope.dispatcher();
                self.program_loader.run(&invocation, &mut hooks).await
            }
            Err(e) => Err(e),
        };
        let finished = scope.finish().await;

        let status = outcome?;
        finished?;

        if !status.success() {
            warn!("Session {}: entry {} {}", session.id, session.entry, status);
        }
        Ok(status)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
