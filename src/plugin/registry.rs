use crate::error::{DynarunError, ErrorCode, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::builtin::{CallCounter, SettingsModuleConfiguration, TraceAnalysis};
use super::{Analysis, Handler, InitialConfiguration, PluginConfig};

/// Builds a fresh handler from the spec's inline configuration
pub type HandlerFactory = Arc<dyn Fn(Option<PluginConfig>) -> Result<Handler> + Send + Sync>;

/// Registry of handler classes keyed by dotted class path
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
    modules: BTreeSet<String>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the handlers shipped with dynarun
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert(
            TraceAnalysis::CLASS_PATH,
            analysis_factory(TraceAnalysis::from_config),
        );
        registry.insert(
            CallCounter::CLASS_PATH,
            analysis_factory(CallCounter::from_config),
        );
        registry.insert(
            SettingsModuleConfiguration::CLASS_PATH,
            initial_configuration_factory(SettingsModuleConfiguration::from_config),
        );
        registry
    }

    /// Register a factory under a dotted class path
    pub fn register(&mut self, class_path: &str, factory: HandlerFactory) -> Result<&mut Self> {
        if !class_path.contains('.') {
            return Err(DynarunError::load(
                ErrorCode::LOAD_INVALID_SPEC,
                class_path,
                "class path must be of the form <module>.<Class>",
            ));
        }

        if self.factories.contains_key(class_path) {
            return Err(DynarunError::load(
                ErrorCode::LOAD_GENERIC,
                class_path,
                "a handler is already registered under this class path",
            ));
        }

        self.insert(class_path, factory);
        Ok(self)
    }

    pub fn register_analysis<A, F>(&mut self, class_path: &str, build: F) -> Result<&mut Self>
    where
        A: Analysis + 'static,
        F: Fn(Option<PluginConfig>) -> Result<A> + Send + Sync + 'static,
    {
        self.register(class_path, analysis_factory(build))
    }

    pub fn register_initial_configuration<I, F>(
        &mut self,
        class_path: &str,
        build: F,
    ) -> Result<&mut Self>
    where
        I: InitialConfiguration + 'static,
        F: Fn(Option<PluginConfig>) -> Result<I> + Send + Sync + 'static,
    {
        self.register(class_path, initial_configuration_factory(build))
    }

    fn insert(&mut self, class_path: &str, factory: HandlerFactory) {
        if let Some((module, _)) = class_path.rsplit_once('.') {
            self.modules.insert(module.to_string());
        }
        self.factories.insert(class_path.to_string(), factory);
    }

    /// Look up a factory, distinguishing an unknown module from an unknown class
    pub fn lookup(&self, module_path: &str, class_name: &str) -> Result<&HandlerFactory> {
        let class_path = format!("{module_path}.{class_name}");

        if !self.modules.contains(module_path) {
            return Err(DynarunError::load(
                ErrorCode::LOAD_MODULE_NOT_FOUND,
                &class_path,
                format!("no module named '{module_path}'"),
            ));
        }

        self.factories.get(&class_path).ok_or_else(|| {
            DynarunError::load(
                ErrorCode::LOAD_CLASS_NOT_FOUND,
                &class_path,
                format!("module '{module_path}' has no attribute '{class_name}'"),
            )
        })
    }

    pub fn contains(&self, class_path: &str) -> bool {
        self.factories.contains_key(class_path)
    }

    /// All registered class paths, sorted
    pub fn class_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

fn analysis_factory<A, F>(build: F) -> HandlerFactory
where
    A: Analysis + 'static,
    F: Fn(Option<PluginConfig>) -> Result<A> + Send + Sync + 'static,
{
    Arc::new(move |config| Ok(Handler::Analysis(Box::new(build(config)?))))
}

fn initial_configuration_factory<I, F>(build: F) -> HandlerFactory
where
    I: InitialConfiguration + 'static,
    F: Fn(Option<PluginConfig>) -> Result<I> + Send + Sync + 'static,
{
    Arc::new(move |config| Ok(Handler::InitialConfiguration(Box::new(build(config)?))))
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("class_paths", &self.class_paths())
            .finish()
    }
}
