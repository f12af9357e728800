use crate::error::{DynarunError, ErrorCode, Result};
use tracing::debug;

use super::registry::HandlerRegistry;
use super::{Analysis, Handler, InitialConfiguration, PluginSpec};

/// Resolves plugin spec strings into fresh handler instances
#[derive(Debug, Clone)]
pub struct PluginLoader {
    registry: HandlerRegistry,
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PluginLoader {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn with_builtins() -> Self {
        Self::new(HandlerRegistry::with_builtins())
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Parse `spec` and construct the handler it names
    ///
    /// Every call constructs a new instance, so resolving the same spec twice
    /// yields two independent handlers.
    pub fn resolve(&self, spec: &str) -> Result<Handler> {
        let parsed = PluginSpec::parse(spec)?;
        self.resolve_spec(&parsed)
    }

    pub fn resolve_spec(&self, spec: &PluginSpec) -> Result<Handler> {
        let factory = self.registry.lookup(spec.module_path(), spec.class_name())?;

        let handler = factory(spec.config().cloned()).map_err(|e| match e {
            DynarunError::Load { .. } => e,
            other => DynarunError::load(
                ErrorCode::LOAD_CONSTRUCTION_FAILED,
                spec.to_string(),
                "handler construction failed",
            )
            .with_source(other),
        })?;

        debug!("Resolved {} as {:?}", spec.class_path(), handler.capability());
        Ok(handler)
    }

    pub fn resolve_analysis(&self, spec: &str) -> Result<Box<dyn Analysis>> {
        self.resolve(spec)?.into_analysis(spec)
    }

    pub fn resolve_initial_configuration(&self, spec: &str) -> Result<Box<dyn InitialConfiguration>> {
        self.resolve(spec)?.into_initial_configuration(spec)
    }
}
