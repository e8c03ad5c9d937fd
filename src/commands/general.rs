// general.rs - General Cog
// Basic commands every deployment wants: ping, echo and uptime.
//
// Key Features:
// - Registers its strings with the localizer on init, divests them on unload
// - Uptime rendered through the localizer's humanizer
// - Refuses init/unload calls that do not come from the module loader
//
// Used by: main.rs (factory registration), ModuleLoader

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::Value;

use crate::commands::{CommandSpec, Invocation};
use crate::error::ModuleError;
use crate::localizer::humanizer::HumanizerOverrides;
use crate::localizer::Localizer;
use crate::modules::{Lifecycle, ModuleContext, ModuleFactory, Pluggable, UnloadReason};

pub const SIGNATURE: &str = "cog.general";

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "ping",
        aliases: &[],
        description_key: "general.ping.description",
    },
    CommandSpec {
        name: "echo",
        aliases: &["say"],
        description_key: "general.echo.description",
    },
    CommandSpec {
        name: "uptime",
        aliases: &["up"],
        description_key: "general.uptime.description",
    },
];

pub struct GeneralCog {
    localizer: Arc<Localizer>,
    lifecycle: Lifecycle,
    languages_dir: PathBuf,
    keys: Vec<String>,
    started: DateTime<Utc>,
}

impl GeneralCog {
    pub fn new(ctx: ModuleContext) -> Self {
        let languages_dir = ctx
            .options
            .get("languages")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("languages/cogs/general"));

        Self {
            localizer: ctx.services.localizer,
            lifecycle: ctx.services.lifecycle,
            languages_dir,
            keys: Vec::new(),
            started: Utc::now(),
        }
    }

    async fn uptime(&self, invocation: &Invocation) -> String {
        let elapsed = (Utc::now() - self.started).num_milliseconds().max(0) as f64;
        let overrides = HumanizerOverrides {
            largest: Some(3),
            round: Some(true),
            ..Default::default()
        };
        let duration = self
            .localizer
            .humanize_with(&invocation.language, elapsed, &overrides);
        self.localizer
            .translate(&invocation.language, "general.uptime.reply", &[("duration", duration.as_str())])
            .await
    }
}

pub fn factory() -> ModuleFactory {
    Arc::new(|ctx: ModuleContext| Ok(Box::new(GeneralCog::new(ctx)) as Box<dyn Pluggable>))
}

#[async_trait]
impl Pluggable for GeneralCog {
    fn signature(&self) -> Option<String> {
        Some(SIGNATURE.to_string())
    }

    fn requires_init(&self) -> bool {
        true
    }

    async fn init(&mut self) -> Result<(), ModuleError> {
        if !self.lifecycle.is_pending_initialization(SIGNATURE) {
            return Err(ModuleError::LifecycleViolation {
                signature: SIGNATURE.to_string(),
                operation: "initialize",
            });
        }

        self.keys = self.localizer.extend(SIGNATURE, &self.languages_dir).await?;
        self.started = Utc::now();
        info!("[GENERAL] ✅ Ready with {} localized string key(s)", self.keys.len());
        Ok(())
    }

    async fn unload(&mut self, reason: &UnloadReason) -> Result<bool, ModuleError> {
        if !self.lifecycle.is_pending_unload(SIGNATURE) {
            return Err(ModuleError::LifecycleViolation {
                signature: SIGNATURE.to_string(),
                operation: "unload",
            });
        }

        let keys = std::mem::take(&mut self.keys);
        self.localizer.divest(SIGNATURE, &keys).await;
        info!("[GENERAL] 📤 Unloaded ({})", reason);
        Ok(true)
    }

    fn commands(&self) -> &[CommandSpec] {
        COMMANDS
    }

    async fn execute(&self, invocation: &Invocation) -> Result<Option<String>, ModuleError> {
        debug!("[GENERAL] [{}] {} by {}", invocation.id, invocation.command, invocation.author_name);
        let lang = invocation.language.as_str();

        let reply = match invocation.command.as_str() {
            "ping" => self.localizer.translate(lang, "general.pong", &[]).await,
            "echo" | "say" if invocation.rest.is_empty() => {
                self.localizer.translate(lang, "general.echo.usage", &[]).await
            }
            "echo" | "say" => invocation.rest.clone(),
            "uptime" | "up" => self.uptime(invocation).await,
            _ => return Ok(None),
        };
        Ok(Some(reply))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
