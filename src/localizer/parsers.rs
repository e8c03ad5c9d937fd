// parsers.rs - Language File Parsers
// Pluggable per-extension parsers turning raw file content into a flat
// key -> string map, plus the collection that maps extensions to parsers.
//
// Key Features:
// - JSON and YAML parsers out of the box
// - Scalars coerced to strings, nested values rejected
// - Strict and lenient extension claiming, forced override when needed

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use crate::error::LocalizerError;

/// Flat key -> string map produced from one language file.
pub type StringMap = HashMap<String, String>;

pub trait Parser: Send + Sync {
    fn name(&self) -> &str;

    /// Extensions this parser claims, with or without the leading dot.
    fn extensions(&self) -> &[&'static str];

    fn parse(&self, content: &str) -> Result<StringMap, LocalizerError>;
}

/// Flatten a decoded document into a string map.
///
/// Strings are kept as-is, numbers and booleans are stringified and anything
/// else is an `InvalidMapShape`.
pub fn value_to_string_map(value: Value) -> Result<StringMap, LocalizerError> {
    let entries = match value {
        Value::Object(entries) => entries,
        other => {
            return Err(LocalizerError::InvalidMapShape {
                key: "<root>".to_string(),
                kind: kind_of(&other),
            })
        }
    };

    let mut map = StringMap::with_capacity(entries.len());
    for (key, value) in entries {
        let text = match value {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            other => {
                return Err(LocalizerError::InvalidMapShape {
                    key,
                    kind: kind_of(&other),
                })
            }
        };
        map.insert(key, text);
    }
    Ok(map)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub struct JsonParser;

impl Parser for JsonParser {
    fn name(&self) -> &str {
        "json"
    }

    fn extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn parse(&self, content: &str) -> Result<StringMap, LocalizerError> {
        let value: Value = serde_json::from_str(content)?;
        value_to_string_map(value)
    }
}

pub struct YamlParser;

impl Parser for YamlParser {
    fn name(&self) -> &str {
        "yaml"
    }

    fn extensions(&self) -> &[&'static str] {
        &["yaml", "yml"]
    }

    fn parse(&self, content: &str) -> Result<StringMap, LocalizerError> {
        let value: Value = serde_yaml::from_str(content)?;
        value_to_string_map(value)
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

/// Extension -> parser registry. Each extension maps to exactly one parser.
#[derive(Default)]
pub struct ParserCollection {
    parsers: HashMap<String, Arc<dyn Parser>>,
}

impl ParserCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection with the JSON and YAML parsers registered.
    pub fn with_defaults() -> Self {
        let mut collection = Self::new();
        collection.set_parser(Arc::new(JsonParser));
        collection.set_parser(Arc::new(YamlParser));
        collection
    }

    /// Claim every extension the parser declares.
    ///
    /// Extensions held by a different parser are skipped with a warning, or
    /// fail the whole call when `strict` is set. Returns the claimed extensions.
    pub fn add_parser(
        &mut self,
        parser: Arc<dyn Parser>,
        strict: bool,
    ) -> Result<Vec<String>, LocalizerError> {
        let extensions: Vec<String> = parser
            .extensions()
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect();

        if strict {
            if let Some((extension, existing)) = extensions.iter().find_map(|ext| {
                self.parsers
                    .get(ext)
                    .filter(|existing| existing.name() != parser.name())
                    .map(|existing| (ext, existing))
            }) {
                return Err(LocalizerError::ExtensionConflict {
                    extension: extension.clone(),
                    claimed_by: existing.name().to_string(),
                });
            }
        }

        let mut claimed = Vec::new();
        for extension in extensions {
            if let Some(existing) = self.parsers.get(&extension) {
                if existing.name() != parser.name() {
                    warn!(
                        "[LOCALIZER] ⚠️ Extension '{}' already handled by '{}', ignoring claim by '{}'",
                        extension,
                        existing.name(),
                        parser.name()
                    );
                    continue;
                }
            }
            debug!("[LOCALIZER] Parser '{}' handles .{}", parser.name(), extension);
            self.parsers.insert(extension.clone(), parser.clone());
            claimed.push(extension);
        }
        Ok(claimed)
    }

    /// Register a parser for all its extensions, replacing current claims.
    pub fn set_parser(&mut self, parser: Arc<dyn Parser>) {
        for extension in parser.extensions() {
            self.parsers
                .insert(normalize_extension(extension), parser.clone());
        }
    }

    pub fn parser_for_extension(&self, extension: &str) -> Option<&Arc<dyn Parser>> {
        self.parsers.get(&normalize_extension(extension))
    }

    pub fn parser_for(&self, path: &Path) -> Option<&Arc<dyn Parser>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.parser_for_extension(ext))
    }

    /// Parse content according to the file's extension.
    pub fn parse_file(&self, path: &Path, content: &str) -> Result<StringMap, LocalizerError> {
        let parser = self.parser_for(path).ok_or_else(|| {
            LocalizerError::NoParser(
                path.extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
        })?;
        parser.parse(content)
    }

    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}
