// localizer/mod.rs - Localizer
// Process-wide string registry. Holds the per-language string maps, tracks
// which module owns which keys, and exposes translation and duration
// humanizing to the cogs.
//
// Key Features:
// - Base strings loaded at startup, module strings layered on top
// - Key ownership so unloading one cog never purges a string another uses
// - Default-language fallback and {placeholder} substitution
// - Per-language duration humanizing
//
// Used by: main.rs (bootstrap), every cog through ModuleServices

pub mod assignation;
pub mod dictionary;
pub mod files;
pub mod humanizer;
pub mod parsers;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tokio::sync::RwLock;

use crate::error::LocalizerError;
use assignation::KeyAssignation;
use files::{directory_to_languages_tree, LanguagesTree, TreeOptions};
use humanizer::{Humanizer, HumanizerOptions, HumanizerOverrides};
use parsers::{Parser, ParserCollection};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("Invalid placeholder regex pattern"));

#[derive(Debug, Clone)]
pub struct LocalizerOptions {
    pub default_language: String,
    pub humanizer: HumanizerOptions,
}

impl Default for LocalizerOptions {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            humanizer: HumanizerOptions::default(),
        }
    }
}

#[derive(Default)]
struct Strings {
    tree: LanguagesTree,
    keys: KeyAssignation,
    /// Keys loaded from the base directory; never purged by a divest.
    base: HashSet<String>,
}

pub struct Localizer {
    default_language: String,
    humanizer: Humanizer,
    strings: RwLock<Strings>,
    parsers: RwLock<ParserCollection>,
}

impl Localizer {
    pub fn new(options: LocalizerOptions) -> Self {
        Self {
            default_language: options.default_language,
            humanizer: Humanizer::new(options.humanizer),
            strings: RwLock::new(Strings::default()),
            parsers: RwLock::new(ParserCollection::with_defaults()),
        }
    }

    /// Register another language file parser for later loads.
    pub async fn add_parser(
        &self,
        parser: Arc<dyn Parser>,
        strict: bool,
    ) -> Result<Vec<String>, LocalizerError> {
        self.parsers.write().await.add_parser(parser, strict)
    }

    async fn read_tree(&self, directory: &Path) -> Result<LanguagesTree, LocalizerError> {
        let parsers = self.parsers.read().await;
        directory_to_languages_tree(&parsers, directory, &TreeOptions::default()).await
    }

    /// Load unowned base strings. Later loads overwrite earlier values.
    pub async fn load_base(&self, directory: &Path) -> Result<usize, LocalizerError> {
        let tree = self.read_tree(directory).await?;

        let mut strings = self.strings.write().await;
        let mut count = 0;
        for (language, map) in tree {
            count += map.len();
            strings.base.extend(map.keys().cloned());
            strings.tree.entry(language).or_default().extend(map);
        }
        info!(
            "[LOCALIZER] 📚 Loaded {} base string(s) from {}",
            count,
            directory.display()
        );
        Ok(count)
    }

    /// Merge a module's language directory and assign its keys to `owner`.
    ///
    /// Nothing is merged when any key is already owned by `owner`. Existing
    /// strings always win over the module's values. Returns the assigned keys.
    pub async fn extend(&self, owner: &str, directory: &Path) -> Result<Vec<String>, LocalizerError> {
        let tree = self.read_tree(directory).await?;

        let mut keys: Vec<&String> = tree.values().flat_map(|map| map.keys()).collect();
        keys.sort();
        keys.dedup();

        let mut strings = self.strings.write().await;
        let assigned = strings.keys.assign_keys(&keys, owner)?;

        for (language, map) in &tree {
            let target = strings.tree.entry(language.clone()).or_default();
            for (key, value) in map {
                match target.get(key) {
                    Some(existing) if existing != value => {
                        warn!(
                            "[LOCALIZER] ⚠️ '{}' tried to override {}:{}, keeping existing value",
                            owner, language, key
                        );
                    }
                    Some(_) => {}
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        info!(
            "[LOCALIZER] ➕ '{}' registered {} key(s) in {} language(s)",
            owner,
            assigned.len(),
            tree.len()
        );
        Ok(assigned)
    }

    /// Drop `owner` from the keys and purge keys nobody owns anymore.
    /// Returns the purged keys.
    pub async fn divest<S: AsRef<str>>(&self, owner: &str, keys: &[S]) -> Vec<String> {
        let mut strings = self.strings.write().await;
        let divested = strings.keys.divest_keys(keys, owner);
        let free = strings.keys.prune();

        let Strings { tree, base, .. } = &mut *strings;
        let purged: Vec<String> = free.into_iter().filter(|key| !base.contains(key)).collect();
        for map in tree.values_mut() {
            for key in &purged {
                map.remove(key);
            }
        }

        debug!(
            "[LOCALIZER] '{}' divested {} key(s), {} purged",
            owner,
            divested.len(),
            purged.len()
        );
        purged
    }

    /// Raw lookup without fallback.
    pub async fn get(&self, language: &str, key: &str) -> Option<String> {
        let strings = self.strings.read().await;
        strings.tree.get(language).and_then(|map| map.get(key)).cloned()
    }

    /// Translate `key`, falling back to the default language and then to the
    /// key itself. `{name}` placeholders are replaced from `vars`.
    pub async fn translate(&self, language: &str, key: &str, vars: &[(&str, &str)]) -> String {
        let template = {
            let strings = self.strings.read().await;
            strings
                .tree
                .get(language)
                .and_then(|map| map.get(key))
                .or_else(|| {
                    strings
                        .tree
                        .get(&self.default_language)
                        .and_then(|map| map.get(key))
                })
                .cloned()
        };

        match template {
            Some(template) => substitute(&template, vars),
            None => {
                debug!("[LOCALIZER] Missing key '{}' for '{}'", key, language);
                key.to_string()
            }
        }
    }

    pub fn humanize(&self, language: &str, ms: f64) -> String {
        self.humanize_with(language, ms, &HumanizerOverrides::default())
    }

    pub fn humanize_with(&self, language: &str, ms: f64, overrides: &HumanizerOverrides) -> String {
        let overrides = HumanizerOverrides {
            language: Some(
                overrides
                    .language
                    .clone()
                    .unwrap_or_else(|| language.to_string()),
            ),
            ..overrides.clone()
        };
        self.humanizer.humanize_with(ms, &overrides)
    }

    pub async fn is_assigned(&self, key: &str) -> bool {
        self.strings.read().await.keys.is_assigned(key)
    }

    pub async fn languages(&self) -> Vec<String> {
        let strings = self.strings.read().await;
        let mut languages: Vec<String> = strings.tree.keys().cloned().collect();
        languages.sort();
        languages
    }

    pub async fn has_language(&self, language: &str) -> bool {
        self.strings.read().await.tree.contains_key(language)
    }
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let lookup: HashMap<&str, &str> = vars.iter().copied().collect();
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            lookup
                .get(&caps[1])
                .map(|value| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    async fn localizer_with_base() -> (Localizer, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base");
        fs::create_dir(&base).unwrap();
        fs::write(
            base.join("en.json"),
            r#"{"greeting": "Hello, {name}!", "error.generic": "Something went wrong"}"#,
        )
        .unwrap();
        fs::write(base.join("ru.json"), r#"{"greeting": "Привет, {name}!"}"#).unwrap();

        let cog = dir.path().join("cog");
        fs::create_dir(&cog).unwrap();
        fs::write(
            cog.join("en.json"),
            r#"{"cog.pong": "Pong!", "greeting": "Hi there"}"#,
        )
        .unwrap();

        let localizer = Localizer::new(LocalizerOptions::default());
        localizer.load_base(&base).await.unwrap();
        (localizer, dir)
    }

    #[tokio::test]
    async fn test_translate_with_fallbacks() {
        let (localizer, _dir) = localizer_with_base().await;

        assert_eq!(
            localizer.translate("ru", "greeting", &[("name", "Мир")]).await,
            "Привет, Мир!"
        );
        assert_eq!(
            localizer.translate("ru", "error.generic", &[]).await,
            "Something went wrong"
        );
        assert_eq!(localizer.translate("de", "missing.key", &[]).await, "missing.key");
        assert_eq!(
            localizer.translate("en", "greeting", &[]).await,
            "Hello, {name}!"
        );
    }

    #[tokio::test]
    async fn test_extend_never_overrides_and_divest_purges() {
        let (localizer, dir) = localizer_with_base().await;
        let cog = dir.path().join("cog");

        let keys = localizer.extend("cog.test", &cog).await.unwrap();
        assert_eq!(keys, vec!["cog.pong".to_string(), "greeting".to_string()]);
        assert_eq!(localizer.get("en", "cog.pong").await.as_deref(), Some("Pong!"));
        assert_eq!(
            localizer.get("en", "greeting").await.as_deref(),
            Some("Hello, {name}!")
        );

        let purged = localizer.divest("cog.test", &keys).await;
        assert_eq!(purged, vec!["cog.pong".to_string()]);
        assert!(localizer.get("en", "cog.pong").await.is_none());
        // base strings outlive the module that also declared them
        assert!(localizer.get("en", "greeting").await.is_some());
    }

    #[tokio::test]
    async fn test_extend_twice_fails_without_changes() {
        let (localizer, dir) = localizer_with_base().await;
        let cog = dir.path().join("cog");

        localizer.extend("cog.test", &cog).await.unwrap();
        let err = localizer.extend("cog.test", &cog).await.unwrap_err();
        assert!(matches!(err, LocalizerError::AlreadyAssigned { .. }));
        assert!(localizer.is_assigned("cog.pong").await);
    }

    #[tokio::test]
    async fn test_shared_keys_survive_partial_divest() {
        let (localizer, dir) = localizer_with_base().await;
        let cog = dir.path().join("cog");

        let keys = localizer.extend("cog.a", &cog).await.unwrap();
        localizer.extend("cog.b", &cog).await.unwrap();

        assert!(localizer.divest("cog.a", &keys).await.is_empty());
        assert_eq!(localizer.get("en", "cog.pong").await.as_deref(), Some("Pong!"));
    }

    #[tokio::test]
    async fn test_languages_listing() {
        let (localizer, _dir) = localizer_with_base().await;
        assert_eq!(localizer.languages().await, vec!["en", "ru"]);
        assert!(localizer.has_language("ru").await);
        assert!(!localizer.has_language("de").await);
    }

    struct PropertiesParser;

    impl Parser for PropertiesParser {
        fn name(&self) -> &str {
            "properties"
        }

        fn extensions(&self) -> &[&'static str] {
            &["properties"]
        }

        fn parse(&self, content: &str) -> Result<parsers::StringMap, LocalizerError> {
            Ok(content
                .lines()
                .filter_map(|line| line.split_once('='))
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_added_parser_is_used_by_later_loads() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("de.properties"), "greeting = Hallo
").unwrap();

        let localizer = Localizer::new(LocalizerOptions::default());
        assert_eq!(localizer.load_base(dir.path()).await.unwrap(), 0);

        let claimed = localizer
            .add_parser(Arc::new(PropertiesParser), true)
            .await
            .unwrap();
        assert_eq!(claimed, vec!["properties".to_string()]);
        assert_eq!(localizer.load_base(dir.path()).await.unwrap(), 1);
        assert_eq!(localizer.get("de", "greeting").await.as_deref(), Some("Hallo"));

        // re-adding the same parser is harmless even in strict mode
        assert!(localizer
            .add_parser(Arc::new(PropertiesParser), true)
            .await
            .is_ok());
    }

    #[test]
    fn test_humanize_per_language() {
        let localizer = Localizer::new(LocalizerOptions::default());
        assert_eq!(localizer.humanize("en", 90_000.0), "1 minute, 30 seconds");
        assert_eq!(localizer.humanize("ru", 90_000.0), "1 минута, 30 секунд");
    }

    #[test]
    fn test_unknown_placeholders_are_kept() {
        assert_eq!(substitute("{a} and {b}", &[("a", "1")]), "1 and {b}");
    }
}
