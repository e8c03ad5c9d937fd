// record.rs - Module Record
// Owns a single plugin instance through its life:
// Ready -> Initializing -> Loaded -> Initialized -> Unloading -> Unloaded/Destroyed.
//
// Transitions are reported back to the loader as return values rather than
// broadcast events; every transition is logged.

use std::fmt;

use log::{debug, error, info, warn};

use crate::error::ModuleError;
use crate::modules::{ModuleContext, ModuleFactory, ModuleInfo, Pluggable, UnloadReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Ready,
    Initializing,
    Loaded,
    Initialized,
    Unloading,
    Unloaded,
    Destroyed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ready => "ready",
            Self::Initializing => "initializing",
            Self::Loaded => "loaded",
            Self::Initialized => "initialized",
            Self::Unloading => "unloading",
            Self::Unloaded => "unloaded",
            Self::Destroyed => "destroyed",
        };
        f.write_str(label)
    }
}

/// Lifecycle wrapper ("keeper") around one plugin instance.
pub struct ModuleRecord {
    info: ModuleInfo,
    state: ModuleState,
    signature: Option<String>,
    instance: Option<Box<dyn Pluggable>>,
}

impl ModuleRecord {
    pub fn new(info: ModuleInfo) -> Self {
        Self {
            info,
            state: ModuleState::Ready,
            signature: None,
            instance: None,
        }
    }

    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Swap in a fresh registration, e.g. when a retired record is reused
    /// after the module was re-registered.
    pub fn set_info(&mut self, info: ModuleInfo) {
        self.info = info;
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn instance(&self) -> Option<&dyn Pluggable> {
        self.instance.as_deref()
    }

    /// Construct the plugin and capture its signature.
    ///
    /// Plugins without an init step are promoted straight to `Initialized`.
    pub fn load(
        &mut self,
        factory: &ModuleFactory,
        ctx: ModuleContext,
    ) -> Result<ModuleState, ModuleError> {
        if !matches!(
            self.state,
            ModuleState::Ready | ModuleState::Unloaded | ModuleState::Destroyed
        ) {
            return Err(ModuleError::InvalidState {
                module: self.info.name.clone(),
                operation: "load",
                state: self.state,
            });
        }

        let previous = self.state;
        self.state = ModuleState::Initializing;
        debug!("[RECORD] {} -> {}", self.info.name, self.state);

        let instance = match factory(ctx) {
            Ok(instance) => instance,
            Err(e) => {
                self.state = previous;
                return Err(e);
            }
        };

        let signature = match instance.signature() {
            Some(sig) if sig.trim().is_empty() => {
                self.state = previous;
                return Err(ModuleError::InvalidModuleShape {
                    module: self.info.name.clone(),
                    reason: "declared signature is blank".to_string(),
                });
            }
            Some(sig) => sig,
            None => self.info.name.clone(),
        };

        let requires_init = instance.requires_init();
        self.instance = Some(instance);
        self.signature = Some(signature);
        self.state = ModuleState::Loaded;
        info!("[RECORD] 📦 {} loaded as '{}'", self.info.name, self.signature().unwrap_or_default());

        if !requires_init {
            self.state = ModuleState::Initialized;
            info!("[RECORD] ✅ {} initialized (no init step)", self.info.name);
        }

        Ok(self.state)
    }

    /// Run the plugin's async init hook. Only valid from `Loaded`.
    pub async fn initialize(&mut self) -> Result<ModuleState, ModuleError> {
        let instance = match (self.state, self.instance.as_mut()) {
            (ModuleState::Loaded, Some(instance)) => instance,
            _ => {
                return Err(ModuleError::NotLoaded {
                    module: self.info.name.clone(),
                    state: self.state,
                })
            }
        };

        instance.init().await?;
        self.state = ModuleState::Initialized;
        info!("[RECORD] ✅ {} initialized", self.info.name);
        Ok(self.state)
    }

    /// Ask the plugin to tear itself down.
    ///
    /// A refusal restores the previous state and yields `UnloadRejected`; a
    /// failing teardown force-drops the instance and leaves the record
    /// `Destroyed`.
    pub async fn unload(&mut self, reason: &UnloadReason) -> Result<ModuleState, ModuleError> {
        if !matches!(self.state, ModuleState::Loaded | ModuleState::Initialized) {
            return Err(ModuleError::NotLoaded {
                module: self.info.name.clone(),
                state: self.state,
            });
        }
        let Some(instance) = self.instance.as_mut() else {
            return Err(ModuleError::NotLoaded {
                module: self.info.name.clone(),
                state: self.state,
            });
        };

        let previous = self.state;
        self.state = ModuleState::Unloading;
        debug!("[RECORD] {} -> {} ({})", self.info.name, self.state, reason);

        match instance.unload(reason).await {
            Ok(true) => {
                self.instance = None;
                self.signature = None;
                self.state = ModuleState::Unloaded;
                info!("[RECORD] 📤 {} unloaded ({})", self.info.name, reason);
                Ok(self.state)
            }
            Ok(false) => {
                self.state = previous;
                warn!("[RECORD] ⚠️ {} rejected unload ({})", self.info.name, reason);
                Err(ModuleError::UnloadRejected(self.info.name.clone()))
            }
            Err(e) => {
                error!(
                    "[RECORD] ❌ {} failed to unload, destroying instance: {}",
                    self.info.name, e
                );
                self.instance = None;
                self.signature = None;
                self.state = ModuleState::Destroyed;
                Ok(self.state)
            }
        }
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("name", &self.info.name)
            .field("state", &self.state)
            .field("signature", &self.signature)
            .finish()
    }
}
