// commands/mod.rs - Command Module Registry
// Declares the command modules and the types shared between the message
// handler and the cogs: command descriptions, parsed invocations and the
// Discord-friendly message splitter.

pub mod admin;          // Module management commands (owner only)
pub mod general;        // ping / echo / uptime cog
pub mod help;           // Help text assembled from the active cogs
pub mod preferences;    // Per-guild language and timezone cog

use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ModuleError;
use crate::localizer::Localizer;
use crate::modules::ModuleLoader;

/// Discord refuses messages longer than this.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// A command a cog answers to.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Localization key of the one-line description shown by help.
    pub description_key: &'static str,
}

impl CommandSpec {
    pub fn matches(&self, command: &str) -> bool {
        self.name == command || self.aliases.iter().any(|alias| *alias == command)
    }
}

/// Command name and arguments split off a prefixed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
    /// Everything after the command name, untouched.
    pub rest: String,
}

/// Parse `content` as a prefixed command. Command names are case-insensitive.
pub fn parse_invocation(prefix: &str, content: &str) -> Option<ParsedCommand> {
    let body = content.trim_start().strip_prefix(prefix)?;
    let body = body.trim_start();
    let (name, rest) = match body.find(char::is_whitespace) {
        Some(split) => (&body[..split], body[split..].trim()),
        None => (body, ""),
    };
    if name.is_empty() {
        return None;
    }

    Some(ParsedCommand {
        name: name.to_lowercase(),
        args: rest.split_whitespace().map(str::to_string).collect(),
        rest: rest.to_string(),
    })
}

/// One command call as handed to a cog.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Correlation id for the log lines of this call.
    pub id: Uuid,
    pub command: String,
    pub args: Vec<String>,
    pub rest: String,
    pub author_id: u64,
    pub author_name: String,
    pub guild_id: Option<u64>,
    /// Language the reply should be written in.
    pub language: String,
}

impl Invocation {
    pub fn new(
        parsed: ParsedCommand,
        author_id: u64,
        author_name: impl Into<String>,
        guild_id: Option<u64>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: parsed.name,
            args: parsed.args,
            rest: parsed.rest,
            author_id,
            author_name: author_name.into(),
            guild_id,
            language: language.into(),
        }
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Route an invocation to help, the admin commands or the first active cog
/// that answers to it. `None` means nobody handles the command.
pub async fn dispatch(
    loader: &RwLock<ModuleLoader>,
    localizer: &Localizer,
    invocation: &Invocation,
    prefix: &str,
    is_owner: bool,
) -> Result<Option<String>, ModuleError> {
    if help::is_help_command(&invocation.command) {
        let loader = loader.read().await;
        let text = help::build_help(&loader, localizer, &invocation.language, prefix, is_owner).await;
        return Ok(Some(text));
    }

    if let Some(reply) = admin::execute(loader, localizer, invocation, is_owner).await {
        return Ok(Some(reply));
    }

    let loader = loader.read().await;
    for cog in loader.active() {
        if cog.commands().iter().any(|spec| spec.matches(&invocation.command)) {
            return cog.execute(invocation).await;
        }
    }

    debug!("[COMMANDS] [{}] No cog answers to '{}'", invocation.id, invocation.command);
    Ok(None)
}

/// Split message content into Discord-friendly chunks.
///
/// Splits on line boundaries; a single line longer than `max_len` is cut at
/// character boundaries.
pub fn split_message(content: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for line in content.lines() {
        let potential_len = if current_chunk.is_empty() {
            line.len()
        } else {
            current_chunk.len() + 1 + line.len()
        };

        if potential_len <= max_len {
            if !current_chunk.is_empty() {
                current_chunk.push('\n');
            }
            current_chunk.push_str(line);
            continue;
        }

        if !current_chunk.is_empty() {
            chunks.push(std::mem::take(&mut current_chunk));
        }

        if line.len() <= max_len {
            current_chunk.push_str(line);
            continue;
        }

        // overlong line
        for c in line.chars() {
            if current_chunk.len() + c.len_utf8() > max_len && !current_chunk.is_empty() {
                chunks.push(std::mem::take(&mut current_chunk));
            }
            current_chunk.push(c);
        }
    }

    if !current_chunk.is_empty() {
        chunks.push(current_chunk);
    }

    chunks
}
