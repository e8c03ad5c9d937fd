// loader.rs - Module Loader
// Registry of known modules and orchestration of their load/unload.
//
// Key Features:
// - Name -> ModuleInfo registry plus path -> factory table supplied at startup
// - Sequential multi-name load/unload (later modules may look up earlier ones)
// - Signature directory that only exposes fully loaded modules
// - Retired record cache, discarded when `clear_cache` is requested
// - Batch startup that initializes pending modules and unloads failures
//
// Used by: main.rs (bootstrap and shutdown), commands/admin.rs, commands/help.rs

use std::collections::HashMap;

use log::{debug, error, info, warn};

use crate::error::ModuleError;
use crate::modules::record::{ModuleRecord, ModuleState};
use crate::modules::{
    ModuleContext, ModuleFactory, ModuleInfo, ModuleServices, Pluggable, UnloadReason,
};

/// Which key a lookup is made by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookup {
    #[default]
    Signature,
    Name,
}

pub struct ModuleLoader {
    registry: HashMap<String, ModuleInfo>,
    factories: HashMap<String, ModuleFactory>,
    loaded: HashMap<String, ModuleRecord>,
    signatures: HashMap<String, String>,
    load_order: Vec<String>,
    retired: HashMap<String, ModuleRecord>,
    default_set: Vec<String>,
    services: ModuleServices,
}

impl ModuleLoader {
    pub fn new(services: ModuleServices, default_set: Vec<String>) -> Self {
        Self {
            registry: HashMap::new(),
            factories: HashMap::new(),
            loaded: HashMap::new(),
            signatures: HashMap::new(),
            load_order: Vec::new(),
            retired: HashMap::new(),
            default_set,
            services,
        }
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    /// Insert or overwrite a module registration.
    pub fn register(&mut self, info: ModuleInfo) {
        debug!("[LOADER] Registered module '{}' ({})", info.name, info.path);
        self.registry.insert(info.name.clone(), info);
    }

    /// Supply the constructor for a resource locator.
    pub fn provide(&mut self, path: impl Into<String>, factory: ModuleFactory) {
        self.factories.insert(path.into(), factory);
    }

    pub fn registered(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Load the named modules one after another.
    ///
    /// A newcomer whose signature is already taken is unloaded on the spot and
    /// the call still succeeds; the existing module stays authoritative.
    pub async fn load(&mut self, names: &[&str], clear_cache: bool) -> Result<(), ModuleError> {
        for name in names {
            self.load_one(name, clear_cache).await?;
        }
        Ok(())
    }

    async fn load_one(&mut self, name: &str, clear_cache: bool) -> Result<(), ModuleError> {
        let info = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))?;

        if self.loaded.contains_key(name) {
            return Err(ModuleError::AlreadyLoaded(name.to_string()));
        }

        let factory = self
            .factories
            .get(&info.path)
            .cloned()
            .ok_or_else(|| ModuleError::MissingFactory {
                module: name.to_string(),
                path: info.path.clone(),
            })?;

        let cached = self.retired.remove(name);
        let mut record = match cached {
            Some(mut record) if !clear_cache => {
                debug!("[LOADER] Reusing cached record for '{}'", name);
                record.set_info(info);
                record
            }
            _ => ModuleRecord::new(info),
        };

        let ctx = ModuleContext {
            name: name.to_string(),
            options: record.info().options.clone(),
            services: self.services.clone(),
        };
        record.load(&factory, ctx)?;

        let signature = record
            .signature()
            .map(str::to_string)
            .unwrap_or_else(|| name.to_string());

        // a record stuck after a refused unload still holds its signature
        let holder = self.signatures.get(&signature).cloned().or_else(|| {
            self.loaded
                .values()
                .find(|loaded| loaded.signature() == Some(signature.as_str()))
                .map(|loaded| loaded.name().to_string())
        });
        if let Some(owner) = holder {
            error!(
                "[LOADER] ❌ Signature '{}' of module '{}' is already held by '{}', dropping the newcomer",
                signature, name, owner
            );
            self.services.lifecycle.set_pending_unload(&signature, true);
            let result = record.unload(&UnloadReason::SignatureCollision).await;
            self.services.lifecycle.set_pending_unload(&signature, false);
            if let Err(e) = result {
                error!("[LOADER] ❌ Colliding module '{}' did not unload cleanly: {}", name, e);
            }
            return Ok(());
        }

        self.signatures.insert(signature.clone(), name.to_string());
        self.loaded.insert(name.to_string(), record);
        self.load_order.push(name.to_string());
        info!("[LOADER] 📦 Loaded '{}' (signature '{}')", name, signature);
        Ok(())
    }

    /// Initialize every record still waiting on its async init, in load order.
    ///
    /// A failed init unloads that one module and the batch carries on.
    pub async fn initialize_pending(&mut self) -> Vec<String> {
        let pending: Vec<String> = self
            .load_order
            .iter()
            .filter(|name| {
                self.loaded
                    .get(name.as_str())
                    .map_or(false, |record| record.state() == ModuleState::Loaded)
            })
            .cloned()
            .collect();

        let mut initialized = Vec::new();
        for name in pending {
            let Some(record) = self.loaded.get_mut(&name) else {
                continue;
            };
            let signature = record.signature().unwrap_or(&name).to_string();

            self.services.lifecycle.set_pending_initialization(&signature, true);
            let result = record.initialize().await;
            self.services.lifecycle.set_pending_initialization(&signature, false);

            match result {
                Ok(_) => initialized.push(name),
                Err(e) => {
                    error!("[LOADER] ❌ Module '{}' failed to initialize: {}", name, e);
                    if let Err(e) = self.unload(&[name.as_str()], UnloadReason::InitFailed, true).await {
                        error!("[LOADER] ❌ Could not unload '{}' after failed init: {}", name, e);
                    }
                }
            }
        }
        initialized
    }

    /// Bulk startup: load the default set (or every registered module) and
    /// run the pending init steps.
    pub async fn load_modules(&mut self, force_all: bool) -> Result<Vec<String>, ModuleError> {
        let working_set: Vec<String> = if force_all {
            self.registered().into_iter().map(str::to_string).collect()
        } else {
            self.default_set.clone()
        };
        info!("[LOADER] 🚀 Loading {} module(s): {}", working_set.len(), working_set.join(", "));

        for name in &working_set {
            self.load(&[name.as_str()], true).await?;
        }

        Ok(self.initialize_pending().await)
    }

    // ========================================================================
    // UNLOADING
    // ========================================================================

    /// Unload the named modules one after another.
    ///
    /// The signature mapping is removed before the plugin's unload runs and is
    /// not restored if the plugin refuses.
    pub async fn unload(
        &mut self,
        names: &[&str],
        reason: UnloadReason,
        clear_cache: bool,
    ) -> Result<(), ModuleError> {
        for name in names {
            self.unload_one(name, &reason, clear_cache).await?;
        }
        Ok(())
    }

    async fn unload_one(
        &mut self,
        name: &str,
        reason: &UnloadReason,
        clear_cache: bool,
    ) -> Result<(), ModuleError> {
        let Some(record) = self.loaded.get_mut(name) else {
            let state = self
                .retired
                .get(name)
                .map_or(ModuleState::Ready, ModuleRecord::state);
            return Err(ModuleError::NotLoaded {
                module: name.to_string(),
                state,
            });
        };

        // only touch the signature bookkeeping this module actually owns
        let signature = record.signature().map(str::to_string).filter(|signature| {
            self.signatures
                .get(signature)
                .map_or(true, |owner| owner.as_str() == name)
        });
        if let Some(signature) = &signature {
            self.signatures.remove(signature);
            self.services.lifecycle.set_pending_unload(signature, true);
        }

        let result = record.unload(reason).await;

        if let Some(signature) = &signature {
            self.services.lifecycle.set_pending_unload(signature, false);
        }

        let state = result?;
        debug!("[LOADER] '{}' settled as {}", name, state);

        if let Some(record) = self.loaded.remove(name) {
            self.load_order.retain(|loaded| loaded != name);
            if !clear_cache {
                self.retired.insert(name.to_string(), record);
            }
        }
        info!("[LOADER] 📤 Unloaded '{}' ({})", name, reason);
        Ok(())
    }

    /// Tear everything down in reverse load order, logging failures.
    pub async fn unload_all(&mut self, reason: UnloadReason) -> usize {
        let names: Vec<String> = self.load_order.iter().rev().cloned().collect();
        let mut unloaded = 0;
        for name in names {
            match self.unload(&[name.as_str()], reason.clone(), true).await {
                Ok(()) => unloaded += 1,
                Err(e) => warn!("[LOADER] ⚠️ Failed to unload '{}': {}", name, e),
            }
        }
        unloaded
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    /// Find a lifecycle record. Never fails; a miss is `None`.
    pub fn find_keeper(&self, key: &str, by: Lookup) -> Option<&ModuleRecord> {
        match by {
            Lookup::Signature => self
                .signatures
                .get(key)
                .and_then(|name| self.loaded.get(name)),
            Lookup::Name => self.loaded.get(key),
        }
    }

    /// Find a plugin instance.
    pub fn find_base(&self, key: &str, by: Lookup) -> Option<&dyn Pluggable> {
        self.find_keeper(key, by).and_then(ModuleRecord::instance)
    }

    /// Find a plugin instance of a concrete type.
    pub fn find_base_as<T: 'static>(&self, key: &str, by: Lookup) -> Option<&T> {
        self.find_base(key, by)
            .and_then(|base| base.as_any().downcast_ref::<T>())
    }

    pub fn is_pending_initialization(&self, signature: &str) -> bool {
        self.services.lifecycle.is_pending_initialization(signature)
    }

    pub fn is_pending_unload(&self, signature: &str) -> bool {
        self.services.lifecycle.is_pending_unload(signature)
    }

    /// Loaded module names in load order.
    pub fn loaded_names(&self) -> &[String] {
        &self.load_order
    }

    pub fn state_of(&self, name: &str) -> Option<ModuleState> {
        self.loaded
            .get(name)
            .or_else(|| self.retired.get(name))
            .map(ModuleRecord::state)
    }

    /// Initialized plugin instances in load order.
    pub fn active(&self) -> impl Iterator<Item = &dyn Pluggable> {
        self.load_order.iter().filter_map(|name| {
            self.loaded
                .get(name)
                .filter(|record| record.state() == ModuleState::Initialized)
                .and_then(ModuleRecord::instance)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::record::tests::{factory, services, TestPlugin};
    use crate::modules::Lifecycle;
    use async_trait::async_trait;
    use serde_json::json;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn loader_with(modules: &[(&str, Option<&str>, bool)]) -> ModuleLoader {
        let mut loader = ModuleLoader::new(services(), Vec::new());
        for (name, signature, requires_init) in modules {
            let path = format!("test/{}", name);
            loader.register(ModuleInfo::new(*name, path.clone(), json!({})));
            loader.provide(path, factory(*signature, *requires_init, Ok(true)));
        }
        loader
    }

    #[tokio::test]
    async fn test_load_then_unload_forgets_signature() {
        let mut loader = loader_with(&[("alpha", Some("sig.alpha"), false)]);

        loader.load(&["alpha"], false).await.unwrap();
        assert!(loader.find_keeper("sig.alpha", Lookup::Signature).is_some());
        assert!(loader.find_keeper("alpha", Lookup::Name).is_some());

        loader.unload(&["alpha"], UnloadReason::Requested, false).await.unwrap();
        assert!(loader.find_keeper("sig.alpha", Lookup::Signature).is_none());
        assert!(loader.find_base("sig.alpha", Lookup::Signature).is_none());
        assert!(loader.loaded_names().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_loads() {
        let mut loader = loader_with(&[("alpha", Some("sig.alpha"), false)]);

        let err = loader.load(&["ghost"], false).await.unwrap_err();
        assert!(matches!(err, ModuleError::UnknownModule(name) if name == "ghost"));

        loader.load(&["alpha"], false).await.unwrap();
        let err = loader.load(&["alpha"], false).await.unwrap_err();
        assert!(matches!(err, ModuleError::AlreadyLoaded(_)));
    }

    #[tokio::test]
    async fn test_missing_factory() {
        let mut loader = ModuleLoader::new(services(), Vec::new());
        loader.register(ModuleInfo::new("alpha", "nowhere", json!({})));
        let err = loader.load(&["alpha"], false).await.unwrap_err();
        assert!(matches!(err, ModuleError::MissingFactory { .. }));
    }

    #[tokio::test]
    async fn test_signature_collision_keeps_older_entry() {
        let mut loader = loader_with(&[
            ("alpha", Some("sig.shared"), false),
            ("beta", Some("sig.shared"), false),
        ]);

        loader.load(&["alpha", "beta"], false).await.unwrap();

        let keeper = loader.find_keeper("sig.shared", Lookup::Signature).unwrap();
        assert_eq!(keeper.name(), "alpha");
        assert_eq!(loader.loaded_names(), ["alpha".to_string()]);
        assert!(loader.find_keeper("beta", Lookup::Name).is_none());
    }

    #[tokio::test]
    async fn test_unload_unknown_is_not_loaded() {
        let mut loader = loader_with(&[("alpha", None, false)]);
        let err = loader
            .unload(&["alpha"], UnloadReason::Requested, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::NotLoaded { .. }));
    }

    #[tokio::test]
    async fn test_rejected_unload_keeps_name_but_drops_signature() {
        let mut loader = ModuleLoader::new(services(), Vec::new());
        loader.register(ModuleInfo::new("stubborn", "test/stubborn", json!({})));
        loader.provide("test/stubborn", factory(Some("sig.stubborn"), false, Ok(false)));

        loader.load(&["stubborn"], false).await.unwrap();
        let err = loader
            .unload(&["stubborn"], UnloadReason::Requested, false)
            .await
            .unwrap_err();

        assert!(matches!(err, ModuleError::UnloadRejected(_)));
        assert!(loader.find_keeper("sig.stubborn", Lookup::Signature).is_none());
        assert!(loader.find_keeper("stubborn", Lookup::Name).is_some());
        assert!(!loader.is_pending_unload("sig.stubborn"));
    }

    #[tokio::test]
    async fn test_stuck_module_keeps_its_signature_taken() {
        let mut loader = ModuleLoader::new(services(), Vec::new());
        loader.register(ModuleInfo::new("stubborn", "test/stubborn", json!({})));
        loader.provide("test/stubborn", factory(Some("sig.x"), false, Ok(false)));
        loader.register(ModuleInfo::new("fresh", "test/fresh", json!({})));
        loader.provide("test/fresh", factory(Some("sig.x"), false, Ok(true)));

        loader.load(&["stubborn"], false).await.unwrap();
        assert!(loader
            .unload(&["stubborn"], UnloadReason::Requested, false)
            .await
            .is_err());

        // the newcomer collides with the record that refused to unload
        loader.load(&["fresh"], false).await.unwrap();
        assert!(loader.find_keeper("fresh", Lookup::Name).is_none());
        assert_eq!(loader.loaded_names(), ["stubborn".to_string()]);

        let err = loader
            .unload(&["stubborn"], UnloadReason::Requested, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::UnloadRejected(_)));
        assert!(!loader.is_pending_unload("sig.x"));
    }

    #[tokio::test]
    async fn test_unload_leaves_foreign_signature_mapping_alone() {
        let mut loader = ModuleLoader::new(services(), Vec::new());
        loader.register(ModuleInfo::new("stubborn", "test/stubborn", json!({})));
        loader.provide("test/stubborn", factory(Some("sig.x"), false, Ok(false)));
        loader.register(ModuleInfo::new("fresh", "test/fresh", json!({})));
        loader.provide("test/fresh", factory(Some("sig.x"), false, Ok(true)));

        loader.load(&["fresh"], false).await.unwrap();
        // a stale record holding the same signature, as left by an older loader state
        let mut stale = ModuleRecord::new(ModuleInfo::new("stubborn", "test/stubborn", json!({})));
        stale
            .load(
                &factory(Some("sig.x"), false, Ok(false)),
                crate::modules::record::tests::context("stubborn"),
            )
            .unwrap();
        loader.loaded.insert("stubborn".to_string(), stale);
        loader.load_order.push("stubborn".to_string());

        assert!(loader
            .unload(&["stubborn"], UnloadReason::Requested, false)
            .await
            .is_err());
        let keeper = loader.find_keeper("sig.x", Lookup::Signature).unwrap();
        assert_eq!(keeper.name(), "fresh");
        assert_eq!(keeper.state(), ModuleState::Initialized);
    }

    #[tokio::test]
    async fn test_reused_record_picks_up_new_registration() {
        let mut loader = loader_with(&[("alpha", Some("sig.alpha"), false)]);

        loader.load(&["alpha"], false).await.unwrap();
        loader.unload(&["alpha"], UnloadReason::Reload, false).await.unwrap();

        loader.register(ModuleInfo::new("alpha", "test/alpha", json!({ "mode": "new" })));
        loader.load(&["alpha"], false).await.unwrap();

        let keeper = loader.find_keeper("alpha", Lookup::Name).unwrap();
        assert_eq!(keeper.info().options["mode"], "new");
    }

    #[tokio::test]
    async fn test_retired_record_cache() {
        let mut loader = loader_with(&[("alpha", Some("sig.alpha"), false)]);

        loader.load(&["alpha"], false).await.unwrap();
        loader.unload(&["alpha"], UnloadReason::Reload, false).await.unwrap();
        assert_eq!(loader.state_of("alpha"), Some(ModuleState::Unloaded));

        loader.load(&["alpha"], false).await.unwrap();
        loader.unload(&["alpha"], UnloadReason::Requested, true).await.unwrap();
        assert_eq!(loader.state_of("alpha"), None);
    }

    #[tokio::test]
    async fn test_load_modules_uses_default_set_or_everything() {
        let mut loader = loader_with(&[
            ("alpha", Some("sig.alpha"), true),
            ("beta", Some("sig.beta"), false),
        ]);
        loader.default_set = vec!["alpha".to_string()];

        let initialized = loader.load_modules(false).await.unwrap();
        assert_eq!(initialized, vec!["alpha".to_string()]);
        assert_eq!(loader.state_of("alpha"), Some(ModuleState::Initialized));
        assert_eq!(loader.state_of("beta"), None);

        loader.unload_all(UnloadReason::Shutdown).await;
        loader.load_modules(true).await.unwrap();
        assert_eq!(loader.loaded_names().len(), 2);
        assert_eq!(loader.active().count(), 2);
    }

    struct GuardedPlugin {
        lifecycle: Lifecycle,
        saw_init_flag: Arc<AtomicUsize>,
        fail_init: bool,
    }

    #[async_trait]
    impl Pluggable for GuardedPlugin {
        fn signature(&self) -> Option<String> {
            Some("sig.guarded".to_string())
        }

        fn requires_init(&self) -> bool {
            true
        }

        async fn init(&mut self) -> Result<(), ModuleError> {
            if self.lifecycle.is_pending_initialization("sig.guarded") {
                self.saw_init_flag.fetch_add(1, Ordering::SeqCst);
            }
            if self.fail_init {
                return Err(ModuleError::Init {
                    module: "guarded".to_string(),
                    reason: "nope".to_string(),
                });
            }
            Ok(())
        }

        async fn unload(&mut self, _reason: &UnloadReason) -> Result<bool, ModuleError> {
            Ok(self.lifecycle.is_pending_unload("sig.guarded"))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn guarded_loader(fail_init: bool, seen: Arc<AtomicUsize>) -> ModuleLoader {
        let mut loader = ModuleLoader::new(services(), vec!["guarded".to_string()]);
        loader.register(ModuleInfo::new("guarded", "test/guarded", json!({})));
        loader.provide(
            "test/guarded",
            Arc::new(move |ctx: ModuleContext| {
                Ok(Box::new(GuardedPlugin {
                    lifecycle: ctx.services.lifecycle.clone(),
                    saw_init_flag: seen.clone(),
                    fail_init,
                }) as Box<dyn Pluggable>)
            }),
        );
        loader
    }

    #[tokio::test]
    async fn test_pending_flags_are_visible_inside_hooks() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut loader = guarded_loader(false, seen.clone());

        loader.load_modules(false).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!loader.is_pending_initialization("sig.guarded"));

        // the plugin only agrees to unload when the loader drives it
        loader.unload(&["guarded"], UnloadReason::Requested, true).await.unwrap();
        assert!(loader.find_keeper("guarded", Lookup::Name).is_none());
    }

    #[tokio::test]
    async fn test_failed_init_is_unloaded_without_aborting_batch() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut loader = guarded_loader(true, seen);
        loader.register(ModuleInfo::new("beta", "test/beta", json!({})));
        loader.provide("test/beta", factory(Some("sig.beta"), true, Ok(true)));
        loader.default_set.push("beta".to_string());

        let initialized = loader.load_modules(false).await.unwrap();
        assert_eq!(initialized, vec!["beta".to_string()]);
        assert!(loader.find_keeper("guarded", Lookup::Name).is_none());
        assert!(loader.find_keeper("sig.guarded", Lookup::Signature).is_none());
    }

    #[tokio::test]
    async fn test_find_base_as_downcasts() {
        let mut loader = ModuleLoader::new(services(), Vec::new());
        loader.register(ModuleInfo::new("alpha", "test/alpha", json!({})));
        loader.provide("test/alpha", factory(Some("sig.alpha"), false, Ok(true)));
        loader.load(&["alpha"], false).await.unwrap();

        assert!(loader.find_base_as::<TestPlugin>("sig.alpha", Lookup::Signature).is_some());
        assert!(loader.find_base_as::<GuardedPlugin>("sig.alpha", Lookup::Signature).is_none());
    }
}
