// admin.rs - Administrative commands for bot management
// Owner-only commands that drive the module loader at runtime: list the
// registered modules, load, unload and reload them without restarting.
//
// Used by: commands/mod.rs (dispatch)

use log::{info, warn};
use tokio::sync::RwLock;

use crate::commands::{CommandSpec, Invocation};
use crate::localizer::Localizer;
use crate::modules::{ModuleLoader, ModuleState, UnloadReason};

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "modules",
        aliases: &["mods"],
        description_key: "admin.modules.description",
    },
    CommandSpec {
        name: "load",
        aliases: &[],
        description_key: "admin.load.description",
    },
    CommandSpec {
        name: "unload",
        aliases: &[],
        description_key: "admin.unload.description",
    },
    CommandSpec {
        name: "reload",
        aliases: &[],
        description_key: "admin.reload.description",
    },
];

pub fn is_admin_command(command: &str) -> bool {
    COMMANDS.iter().any(|spec| spec.matches(command))
}

/// Run an admin command. Returns `None` when `invocation` is not one.
pub async fn execute(
    loader: &RwLock<ModuleLoader>,
    localizer: &Localizer,
    invocation: &Invocation,
    is_owner: bool,
) -> Option<String> {
    if !is_admin_command(&invocation.command) {
        return None;
    }
    let lang = invocation.language.as_str();

    if !is_owner {
        warn!(
            "[ADMIN] [{}] Denied '{}' for {} ({})",
            invocation.id, invocation.command, invocation.author_name, invocation.author_id
        );
        return Some(localizer.translate(lang, "admin.denied", &[]).await);
    }

    if matches!(invocation.command.as_str(), "modules" | "mods") {
        return Some(list_modules(&*loader.read().await, localizer, lang).await);
    }

    let Some(name) = invocation.arg(0) else {
        return Some(
            localizer
                .translate(lang, "admin.usage", &[("command", invocation.command.as_str())])
                .await,
        );
    };

    info!(
        "[ADMIN] [{}] {} requested '{} {}'",
        invocation.id, invocation.author_name, invocation.command, name
    );

    let mut loader = loader.write().await;
    let result = match invocation.command.as_str() {
        "load" => load(&mut loader, name).await,
        "unload" => loader
            .unload(&[name], UnloadReason::Requested, false)
            .await
            .map(|_| "admin.unload.ok"),
        "reload" => reload(&mut loader, name).await,
        _ => return None,
    };

    let reply = match result {
        Ok(key) => localizer.translate(lang, key, &[("module", name)]).await,
        Err(e) => {
            warn!("[ADMIN] [{}] '{} {}' failed: {}", invocation.id, invocation.command, name, e);
            let error = e.to_string();
            localizer
                .translate(
                    lang,
                    "admin.failed",
                    &[("module", name), ("error", error.as_str())],
                )
                .await
        }
    };
    Some(reply)
}

async fn load(
    loader: &mut ModuleLoader,
    name: &str,
) -> Result<&'static str, crate::error::ModuleError> {
    loader.load(&[name], false).await?;
    loader.initialize_pending().await;
    Ok(match loader.state_of(name) {
        Some(ModuleState::Initialized) if loader.loaded_names().iter().any(|n| n == name) => {
            "admin.load.ok"
        }
        _ => "admin.load.dropped",
    })
}

async fn reload(
    loader: &mut ModuleLoader,
    name: &str,
) -> Result<&'static str, crate::error::ModuleError> {
    loader.unload(&[name], UnloadReason::Reload, true).await?;
    loader.load(&[name], true).await?;
    loader.initialize_pending().await;
    Ok(match loader.state_of(name) {
        Some(ModuleState::Initialized) if loader.loaded_names().iter().any(|n| n == name) => {
            "admin.reload.ok"
        }
        _ => "admin.load.dropped",
    })
}

async fn list_modules(loader: &ModuleLoader, localizer: &Localizer, lang: &str) -> String {
    let not_loaded = localizer.translate(lang, "admin.modules.not_loaded", &[]).await;
    let mut lines = vec![localizer.translate(lang, "admin.modules.header", &[]).await];
    for name in loader.registered() {
        let state = match loader.state_of(name) {
            Some(state) if loader.loaded_names().iter().any(|n| n == name) => state.to_string(),
            _ => not_loaded.clone(),
        };
        lines.push(format!("• `{}` - {}", name, state));
    }
    lines.join("\n")
}
