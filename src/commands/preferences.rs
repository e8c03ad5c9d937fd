// preferences.rs - Guild Preferences Cog
// Per-guild language and timezone settings, persisted in a JSON row store
// under the data directory. The message handler asks this cog which language
// to answer a guild in.
//
// Key Features:
// - `language [code]` / `timezone [offset]` to show or change a setting
// - `time` prints the current time in the guild's timezone
// - Optional enforcement of the bot-wide default timezone
//
// Used by: main.rs (factory registration, language resolution)

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, Offset, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::{CommandSpec, Invocation};
use crate::config::parse_utc_offset;
use crate::error::ModuleError;
use crate::localizer::Localizer;
use crate::modules::{Lifecycle, ModuleContext, ModuleFactory, Pluggable, UnloadReason};
use crate::store::JsonStore;

pub const SIGNATURE: &str = "cog.preferences";

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "language",
        aliases: &["lang"],
        description_key: "preferences.language.description",
    },
    CommandSpec {
        name: "timezone",
        aliases: &["tz"],
        description_key: "preferences.timezone.description",
    },
    CommandSpec {
        name: "time",
        aliases: &[],
        description_key: "preferences.time.description",
    },
];

/// One row of the preferences table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildPreferences {
    pub language: Option<String>,
    pub timezone: Option<String>,
}

pub struct PreferencesCog {
    name: String,
    localizer: Arc<Localizer>,
    lifecycle: Lifecycle,
    languages_dir: PathBuf,
    data_dir: PathBuf,
    table: String,
    default_timezone: FixedOffset,
    enforce_default_timezone: bool,
    keys: Vec<String>,
    store: Option<JsonStore<GuildPreferences>>,
}

impl PreferencesCog {
    pub fn new(ctx: ModuleContext) -> Result<Self, ModuleError> {
        let table = ctx.require_str("table")?.to_string();

        let default_timezone = match ctx.options.get("default_timezone").and_then(Value::as_str) {
            Some(value) => parse_utc_offset(value).ok_or_else(|| ModuleError::InvalidModuleShape {
                module: ctx.name.clone(),
                reason: format!("invalid default_timezone '{}'", value),
            })?,
            None => Utc.fix(),
        };

        let languages_dir = ctx
            .options
            .get("languages")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("languages/cogs/preferences"));

        Ok(Self {
            enforce_default_timezone: ctx
                .options
                .get("enforce_default_timezone")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            name: ctx.name,
            localizer: ctx.services.localizer,
            lifecycle: ctx.services.lifecycle,
            languages_dir,
            data_dir: ctx.services.data_dir,
            table,
            default_timezone,
            keys: Vec::new(),
            store: None,
        })
    }

    fn store(&self) -> Result<&JsonStore<GuildPreferences>, ModuleError> {
        self.store.as_ref().ok_or_else(|| ModuleError::Init {
            module: self.name.clone(),
            reason: "preferences table is not open".to_string(),
        })
    }

    async fn row(&self, guild_id: u64) -> Result<GuildPreferences, ModuleError> {
        Ok(self
            .store()?
            .get(&guild_id.to_string())
            .await
            .unwrap_or_default())
    }

    /// Language chosen for a guild, if any.
    pub async fn language_for(&self, guild_id: u64) -> Option<String> {
        self.row(guild_id).await.ok().and_then(|row| row.language)
    }

    /// Effective timezone of a guild.
    pub async fn timezone_for(&self, guild_id: Option<u64>) -> FixedOffset {
        if self.enforce_default_timezone {
            return self.default_timezone;
        }
        let Some(guild_id) = guild_id else {
            return self.default_timezone;
        };
        self.row(guild_id)
            .await
            .ok()
            .and_then(|row| row.timezone)
            .and_then(|tz| parse_utc_offset(&tz))
            .unwrap_or(self.default_timezone)
    }

    async fn language(&self, invocation: &Invocation) -> Result<String, ModuleError> {
        let lang = invocation.language.as_str();
        let Some(guild_id) = invocation.guild_id else {
            return Ok(self.localizer.translate(lang, "preferences.guild_only", &[]).await);
        };

        let Some(code) = invocation.arg(0).map(str::to_lowercase) else {
            return Ok(self
                .localizer
                .translate(lang, "preferences.language.current", &[("language", lang)])
                .await);
        };

        if !self.localizer.has_language(&code).await {
            let available = self.localizer.languages().await.join(", ");
            return Ok(self
                .localizer
                .translate(
                    lang,
                    "preferences.language.unknown",
                    &[("language", code.as_str()), ("available", available.as_str())],
                )
                .await);
        }

        let mut row = self.row(guild_id).await?;
        row.language = Some(code.clone());
        self.store()?.set(&guild_id.to_string(), row).await?;
        info!("[PREFERENCES] [{}] Guild {} language -> {}", invocation.id, guild_id, code);

        Ok(self
            .localizer
            .translate(&code, "preferences.language.set", &[("language", code.as_str())])
            .await)
    }

    async fn timezone(&self, invocation: &Invocation) -> Result<String, ModuleError> {
        let lang = invocation.language.as_str();
        let Some(guild_id) = invocation.guild_id else {
            return Ok(self.localizer.translate(lang, "preferences.guild_only", &[]).await);
        };

        let Some(value) = invocation.arg(0) else {
            let current = self.timezone_for(Some(guild_id)).await.to_string();
            return Ok(self
                .localizer
                .translate(lang, "preferences.timezone.current", &[("timezone", current.as_str())])
                .await);
        };

        if self.enforce_default_timezone {
            let enforced = self.default_timezone.to_string();
            return Ok(self
                .localizer
                .translate(lang, "preferences.timezone.enforced", &[("timezone", enforced.as_str())])
                .await);
        }

        let Some(offset) = parse_utc_offset(value) else {
            return Ok(self
                .localizer
                .translate(lang, "preferences.timezone.invalid", &[("timezone", value)])
                .await);
        };

        let offset = offset.to_string();
        let mut row = self.row(guild_id).await?;
        row.timezone = Some(offset.clone());
        self.store()?.set(&guild_id.to_string(), row).await?;
        info!("[PREFERENCES] [{}] Guild {} timezone -> {}", invocation.id, guild_id, offset);

        Ok(self
            .localizer
            .translate(lang, "preferences.timezone.set", &[("timezone", offset.as_str())])
            .await)
    }

    async fn time(&self, invocation: &Invocation) -> String {
        let timezone = self.timezone_for(invocation.guild_id).await;
        let now = Utc::now().with_timezone(&timezone);
        let time = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let timezone = timezone.to_string();
        self.localizer
            .translate(
                &invocation.language,
                "preferences.time.reply",
                &[("time", time.as_str()), ("timezone", timezone.as_str())],
            )
            .await
    }
}

pub fn factory() -> ModuleFactory {
    Arc::new(|ctx: ModuleContext| Ok(Box::new(PreferencesCog::new(ctx)?) as Box<dyn Pluggable>))
}

#[async_trait]
impl Pluggable for PreferencesCog {
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

        let store = JsonStore::open(&self.data_dir, &self.table).await?;
        info!("[PREFERENCES] 📂 {} guild(s) with stored preferences", store.len().await);
        self.store = Some(store);
        self.keys = self.localizer.extend(SIGNATURE, &self.languages_dir).await?;
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
        if self.store.take().is_none() {
            warn!("[PREFERENCES] ⚠️ Unloading without an open table");
        }
        info!("[PREFERENCES] 📤 Unloaded ({})", reason);
        Ok(true)
    }

    fn commands(&self) -> &[CommandSpec] {
        COMMANDS
    }

    async fn execute(&self, invocation: &Invocation) -> Result<Option<String>, ModuleError> {
        debug!("[PREFERENCES] [{}] {} by {}", invocation.id, invocation.command, invocation.author_name);
        let reply = match invocation.command.as_str() {
            "language" | "lang" => self.language(invocation).await?,
            "timezone" | "tz" => self.timezone(invocation).await?,
            "time" => self.time(invocation).await,
            _ => return Ok(None),
        };
        Ok(Some(reply))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
