// modules/mod.rs - Plugin Contract
// Declares the capability interface every cog implements, the immutable
// registration info, and the context a factory receives when the loader
// constructs a plugin.
//
// Key Features:
// - `Pluggable` trait with optional async init and mandatory unload
// - Factory registry keyed by resource locator instead of dynamic paths
// - Explicit services context (localizer, lifecycle flags, data directory)

pub mod lifecycle;
pub mod loader;
pub mod record;

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::commands::{CommandSpec, Invocation};
use crate::error::ModuleError;
use crate::localizer::Localizer;

pub use lifecycle::Lifecycle;
pub use loader::{Lookup, ModuleLoader};
pub use record::ModuleState;

/// A feature unit the loader can drive through its lifecycle.
#[async_trait]
pub trait Pluggable: Send + Sync {
    /// Process-wide identifier, read once right after construction.
    fn signature(&self) -> Option<String> {
        None
    }

    /// Whether `init` must run before the plugin counts as initialized.
    fn requires_init(&self) -> bool {
        false
    }

    async fn init(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Tear the plugin down. `Ok(false)` refuses the unload.
    async fn unload(&mut self, reason: &UnloadReason) -> Result<bool, ModuleError>;

    /// Commands this plugin answers to.
    fn commands(&self) -> &[CommandSpec] {
        &[]
    }

    /// Run one of the plugin's commands, returning the reply text if any.
    async fn execute(&self, _invocation: &Invocation) -> Result<Option<String>, ModuleError> {
        Ok(None)
    }

    fn as_any(&self) -> &dyn Any;
}

/// Registration entry for a module. Immutable once registered.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: String,
    /// Resource locator naming the factory that builds this module.
    pub path: String,
    pub options: Value,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, path: impl Into<String>, options: Value) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            options,
        }
    }
}

/// Shared collaborators handed to every plugin.
#[derive(Clone)]
pub struct ModuleServices {
    pub localizer: Arc<Localizer>,
    pub lifecycle: Lifecycle,
    pub data_dir: PathBuf,
}

/// What a factory receives when the loader constructs a plugin.
#[derive(Clone)]
pub struct ModuleContext {
    pub name: String,
    pub options: Value,
    pub services: ModuleServices,
}

impl ModuleContext {
    /// Fetch a required string option.
    pub fn require_str(&self, option: &str) -> Result<&str, ModuleError> {
        self.options
            .get(option)
            .and_then(Value::as_str)
            .ok_or_else(|| ModuleError::MissingOption {
                module: self.name.clone(),
                option: option.to_string(),
            })
    }
}

pub type ModuleFactory =
    Arc<dyn Fn(ModuleContext) -> Result<Box<dyn Pluggable>, ModuleError> + Send + Sync>;

/// Why a module is being unloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnloadReason {
    Requested,
    Reload,
    Shutdown,
    InitFailed,
    SignatureCollision,
    Custom(String),
}

impl fmt::Display for UnloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "unload requested"),
            Self::Reload => write!(f, "reloading"),
            Self::Shutdown => write!(f, "bot shutting down"),
            Self::InitFailed => write!(f, "initialization failed"),
            Self::SignatureCollision => write!(f, "signature already in use"),
            Self::Custom(reason) => write!(f, "{}", reason),
        }
    }
}
