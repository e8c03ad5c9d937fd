// help.rs - Help Command Module
// Builds the help message from whatever cogs are currently active, so the
// listing always matches the loaded modules.

use crate::commands::{admin, CommandSpec};
use crate::localizer::Localizer;
use crate::modules::ModuleLoader;

pub const COMMAND: CommandSpec = CommandSpec {
    name: "help",
    aliases: &["h", "commands"],
    description_key: "help.description",
};

pub fn is_help_command(command: &str) -> bool {
    COMMAND.matches(command)
}

async fn describe(localizer: &Localizer, language: &str, prefix: &str, spec: &CommandSpec) -> String {
    let description = localizer.translate(language, spec.description_key, &[]).await;
    if spec.aliases.is_empty() {
        format!("• `{}{}` - {}", prefix, spec.name, description)
    } else {
        format!(
            "• `{}{}` ({}) - {}",
            prefix,
            spec.name,
            spec.aliases.join(", "),
            description
        )
    }
}

/// Help text for the active cogs, plus the admin commands for the owner.
pub async fn build_help(
    loader: &ModuleLoader,
    localizer: &Localizer,
    language: &str,
    prefix: &str,
    is_owner: bool,
) -> String {
    let mut lines = vec![localizer.translate(language, "help.header", &[]).await];

    for cog in loader.active() {
        for spec in cog.commands() {
            lines.push(describe(localizer, language, prefix, spec).await);
        }
    }
    lines.push(describe(localizer, language, prefix, &COMMAND).await);

    if is_owner {
        lines.push(String::new());
        lines.push(localizer.translate(language, "help.admin_header", &[]).await);
        for spec in admin::COMMANDS {
            lines.push(describe(localizer, language, prefix, spec).await);
        }
    }

    lines.join("\n")
}
