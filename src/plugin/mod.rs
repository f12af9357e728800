//! Analysis plugins
//!
//! A plugin spec names a handler class by dotted path. The [`PluginLoader`]
//! resolves it against a [`HandlerRegistry`] of known handler factories and
//! hands back a [`Handler`], which is one of two capabilities: an
//! [`Analysis`] observing the target program, or an [`InitialConfiguration`]
//! run once before the program starts.

use crate::error::{DynarunError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod builtin;
pub mod loader;
pub mod registry;
pub mod spec;

pub use builtin::{CallCounter, SettingsModuleConfiguration, TraceAnalysis};
pub use loader::PluginLoader;
pub use registry::{HandlerFactory, HandlerRegistry};
pub use spec::{PluginConfig, PluginSpec};

/// A named event raised by instrumented code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    pub name: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl HookEvent {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Analysis capability
///
/// Lifecycle hooks bracket the execution of the entry program. Everything
/// else an analysis observes arrives through [`Analysis::on_event`]; the
/// orchestrator forwards events without interpreting them.
#[async_trait]
pub trait Analysis: Send + Sync {
    fn name(&self) -> &str;

    async fn begin_execution(&mut self) -> Result<()> {
        Ok(())
    }

    async fn end_execution(&mut self) -> Result<()> {
        Ok(())
    }

    async fn on_event(&mut self, _event: &HookEvent) -> Result<()> {
        Ok(())
    }
}

/// Initial configuration capability, run once before the entry executes
#[async_trait]
pub trait InitialConfiguration: Send + Sync {
    fn name(&self) -> &str;

    async fn setup(&mut self) -> Result<()>;
}

/// Capability tags used in type-mismatch reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Analysis,
    InitialConfiguration,
}

impl Capability {
    pub fn describe(self) -> &'static str {
        match self {
            Capability::Analysis => "an analysis",
            Capability::InitialConfiguration => "an initial configuration",
        }
    }
}

/// An instantiated plugin
pub enum Handler {
    Analysis(Box<dyn Analysis>),
    InitialConfiguration(Box<dyn InitialConfiguration>),
}

impl Handler {
    pub fn capability(&self) -> Capability {
        match self {
            Handler::Analysis(_) => Capability::Analysis,
            Handler::InitialConfiguration(_) => Capability::InitialConfiguration,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Handler::Analysis(analysis) => analysis.name(),
            Handler::InitialConfiguration(init) => init.name(),
        }
    }

    pub fn into_analysis(self, spec: &str) -> Result<Box<dyn Analysis>> {
        match self {
            Handler::Analysis(analysis) => Ok(analysis),
            other => Err(DynarunError::type_mismatch(
                spec,
                Capability::Analysis.describe(),
                other.capability().describe(),
            )),
        }
    }

    pub fn into_initial_configuration(self, spec: &str) -> Result<Box<dyn InitialConfiguration>> {
        match self {
            Handler::InitialConfiguration(init) => Ok(init),
            other => Err(DynarunError::type_mismatch(
                spec,
                Capability::InitialConfiguration.describe(),
                other.capability().describe(),
            )),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handler")
            .field(&self.capability())
            .field(&self.name())
            .finish()
    }
}

/// Forwards hook events to every active analysis
pub struct HookDispatcher<'a> {
    analyses: &'a mut [Box<dyn Analysis>],
}

impl<'a> HookDispatcher<'a> {
    pub fn new(analyses: &'a mut [Box<dyn Analysis>]) -> Self {
        Self { analyses }
    }

    pub async fn dispatch(&mut self, event: &HookEvent) -> Result<()> {
        for analysis in self.analyses.iter_mut() {
            analysis.on_event(event).await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.analyses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recording {
        events: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Analysis for Recording {
        fn name(&self) -> &str {
            "Recording"
        }

        async fn on_event(&mut self, event: &HookEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.name.clone());
            Ok(())
        }
    }

    #[test]
    fn test_into_initial_configuration_rejects_analysis() {
        let handler = Handler::Analysis(Box::new(Recording::default()));
        let err = handler
            .into_initial_configuration("tests.Recording")
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::CONFIG_TYPE_MISMATCH);
        assert!(err.to_string().contains("an analysis"));
    }

    #[tokio::test]
    async fn test_dispatcher_reaches_every_analysis() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut analyses: Vec<Box<dyn Analysis>> = vec![
            Box::new(Recording {
                events: Arc::clone(&events),
            }),
            Box::new(Recording {
                events: Arc::clone(&events),
            }),
        ];
        let mut dispatcher = HookDispatcher::new(&mut analyses);
        assert_eq!(dispatcher.len(), 2);
        dispatcher
            .dispatch(&HookEvent::new("add_assign", serde_json::json!({"right": 1})))
            .await
            .unwrap();

        assert_eq!(*events.lock().unwrap(), vec!["add_assign", "add_assign"]);
    }
}
