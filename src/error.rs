// error.rs - Error Types
// Domain error enums for the module loader, the localizer, the row store and
// the bot configuration. Everything that can fail in the core returns one of
// these through `?`.

use std::path::PathBuf;

use thiserror::Error;

use crate::modules::record::ModuleState;

/// Failures of the module lifecycle, both loader-level and plugin-level.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// No `ModuleInfo` was registered under this name.
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    /// A record for this name already sits in the loaded registry.
    #[error("Module '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// The module is not loaded, or its record is not in a state that allows
    /// the requested operation (initialize outside `Loaded`, unload outside
    /// `Loaded`/`Initialized`).
    #[error("Module '{module}' is not loaded (state: {state})")]
    NotLoaded {
        module: String,
        state: ModuleState,
    },

    /// A lifecycle operation was requested from a state that forbids it.
    #[error("Cannot {operation} module '{module}' while it is {state}")]
    InvalidState {
        module: String,
        operation: &'static str,
        state: ModuleState,
    },

    /// The constructed plugin does not satisfy the plugin contract.
    #[error("Module '{module}' has an invalid shape: {reason}")]
    InvalidModuleShape { module: String, reason: String },

    /// No factory was provided for the module's resource locator.
    #[error("No factory provided for module '{module}' at '{path}'")]
    MissingFactory { module: String, path: String },

    /// A required plugin option is absent or has the wrong type.
    #[error("Module '{module}' requires option '{option}'")]
    MissingOption { module: String, option: String },

    /// The plugin refused to unload.
    #[error("Module '{0}' rejected the unload request")]
    UnloadRejected(String),

    /// A lifecycle-guarded operation ran without the loader's permission flag.
    #[error("'{signature}' attempted to {operation} outside of the loader")]
    LifecycleViolation {
        signature: String,
        operation: &'static str,
    },

    /// The plugin's init hook failed.
    #[error("Module '{module}' failed to initialize: {reason}")]
    Init { module: String, reason: String },

    #[error(transparent)]
    Localizer(#[from] LocalizerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of key assignation, parsing and language loading.
#[derive(Error, Debug)]
pub enum LocalizerError {
    /// The owner already holds this key.
    #[error("Key '{key}' is already assigned to '{owner}'")]
    AlreadyAssigned { key: String, owner: String },

    /// A parsed language map held a value that is neither a string nor a scalar.
    #[error("Value of '{key}' must be a string or a scalar, found {kind}")]
    InvalidMapShape { key: String, kind: &'static str },

    /// Strict parser registration hit an extension owned by another parser.
    #[error("Extension '{extension}' is already claimed by parser '{claimed_by}'")]
    ExtensionConflict {
        extension: String,
        claimed_by: String,
    },

    /// No parser is registered for the file's extension.
    #[error("No parser registered for extension '{0}'")]
    NoParser(String),

    /// A single language file failed to load.
    #[error("Failed to load language file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<LocalizerError>,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Glob(#[from] globset::Error),
}

/// Failures of the JSON row store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store file {} is corrupt: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while assembling the bot configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No botconfig.txt was found in any search location.
    #[error("No botconfig.txt file found in any expected location ({0})")]
    NotFound(String),

    #[error("DISCORD_TOKEN not found in botconfig.txt or the environment")]
    MissingToken,

    #[error("DISCORD_TOKEN is set to the placeholder value")]
    PlaceholderToken,

    /// A configuration value could not be parsed.
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}
