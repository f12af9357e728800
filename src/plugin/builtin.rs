//! Handlers shipped with dynarun

use crate::error::{DynarunError, ErrorCode, ErrorExt, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use super::spec::SINGLE_VALUE_KEY;
use super::{Analysis, HookEvent, InitialConfiguration, PluginConfig};

const OUTPUT_DIR_KEY: &str = "output_dir";

fn output_dir(config: &PluginConfig) -> Option<PathBuf> {
    config.get(OUTPUT_DIR_KEY).map(PathBuf::from)
}

/// Records lifecycle and hook events, one line each
///
/// With an `output_dir`, the trace is written to `trace.log` there when
/// execution ends.
#[derive(Debug, Default)]
pub struct TraceAnalysis {
    output_dir: Option<PathBuf>,
    lines: Vec<String>,
}

impl TraceAnalysis {
    pub const CLASS_PATH: &'static str = "dynarun.analyses.TraceAnalysis";
    pub const TRACE_FILE: &'static str = "trace.log";

    pub fn from_config(config: Option<PluginConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        config.ensure_only(&[OUTPUT_DIR_KEY])?;
        Ok(Self {
            output_dir: output_dir(&config),
            lines: Vec::new(),
        })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn record(&mut self, line: String) {
        info!(analysis = "TraceAnalysis", "{}", line);
        self.lines.push(line);
    }
}

#[async_trait]
impl Analysis for TraceAnalysis {
    fn name(&self) -> &str {
        "TraceAnalysis"
    }

    async fn begin_execution(&mut self) -> Result<()> {
        self.record("begin execution".to_string());
        Ok(())
    }

    async fn end_execution(&mut self) -> Result<()> {
        self.record("end execution".to_string());

        if let Some(dir) = &self.output_dir {
            let path = dir.join(Self::TRACE_FILE);
            let mut content = self.lines.join("\n");
            content.push('\n');
            tokio::fs::write(&path, content)
                .await
                .to_storage_error(format!("Failed to write trace to {}", path.display()))?;
            debug!("Trace written to {}", path.display());
        }
        Ok(())
    }

    async fn on_event(&mut self, event: &HookEvent) -> Result<()> {
        self.record(format!("{}: {}", event.name, event.payload));
        Ok(())
    }
}

/// Counts hook events by name
///
/// With an `output_dir`, counts are written to `call_counts.json` when
/// execution ends.
#[derive(Debug, Default)]
pub struct CallCounter {
    output_dir: Option<PathBuf>,
    counts: BTreeMap<String, u64>,
}

impl CallCounter {
    pub const CLASS_PATH: &'static str = "dynarun.analyses.CallCounter";
    pub const COUNTS_FILE: &'static str = "call_counts.json";

    pub fn from_config(config: Option<PluginConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        config.ensure_only(&[OUTPUT_DIR_KEY])?;
        Ok(Self {
            output_dir: output_dir(&config),
            counts: BTreeMap::new(),
        })
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }
}

#[async_trait]
impl Analysis for CallCounter {
    fn name(&self) -> &str {
        "CallCounter"
    }

    async fn end_execution(&mut self) -> Result<()> {
        let Some(dir) = &self.output_dir else {
            return Ok(());
        };

        let path = dir.join(Self::COUNTS_FILE);
        let json = serde_json::to_vec_pretty(&self.counts).map_err(|e| {
            DynarunError::storage_with_code(
                ErrorCode::STORAGE_SERIALIZATION_ERROR,
                "Failed to serialize call counts",
                Some(path.clone()),
            )
            .with_source(e)
        })?;
        tokio::fs::write(&path, json)
            .await
            .to_storage_error(format!("Failed to write call counts to {}", path.display()))?;
        Ok(())
    }

    async fn on_event(&mut self, event: &HookEvent) -> Result<()> {
        *self.counts.entry(event.name.clone()).or_insert(0) += 1;
        Ok(())
    }
}

/// Requires an environment variable naming an external settings module
///
/// The variable name comes from the `variable` key (or the single-value spec
/// form) and defaults to `DYNARUN_SETTINGS_MODULE`.
#[derive(Debug)]
pub struct SettingsModuleConfiguration {
    variable: String,
    settings_module: Option<String>,
}

impl SettingsModuleConfiguration {
    pub const CLASS_PATH: &'static str = "dynarun.config.SettingsModuleConfiguration";
    pub const DEFAULT_VARIABLE: &'static str = "DYNARUN_SETTINGS_MODULE";

    pub fn from_config(config: Option<PluginConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        config.ensure_only(&["variable", SINGLE_VALUE_KEY, OUTPUT_DIR_KEY])?;
        let variable = config
            .get("variable")
            .or_else(|| config.get(SINGLE_VALUE_KEY))
            .unwrap_or(Self::DEFAULT_VARIABLE)
            .to_string();
        Ok(Self {
            variable,
            settings_module: None,
        })
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// The settings module found by the last successful `setup`
    pub fn settings_module(&self) -> Option<&str> {
        self.settings_module.as_deref()
    }
}

#[async_trait]
impl InitialConfiguration for SettingsModuleConfiguration {
    fn name(&self) -> &str {
        "SettingsModuleConfiguration"
    }

    async fn setup(&mut self) -> Result<()> {
        let module = std::env::var(&self.variable)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                DynarunError::session_with_code(
                    ErrorCode::SESSION_SETUP_FAILED,
                    format!("The {} environment variable is not defined", self.variable),
                    None,
                )
            })?;

        info!("Using settings module {} from {}", module, self.variable);
        self.settings_module = Some(module);
        Ok(())
    }
}
