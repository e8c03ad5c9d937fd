// files.rs - Language Tree Loader
// Walks a directory of language files and builds language code -> string map
// through the registered parsers. One broken file never takes the rest down
// unless the caller asks for strict loading.

use std::collections::HashMap;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{debug, error, info};
use walkdir::WalkDir;

use crate::error::LocalizerError;
use crate::localizer::parsers::{ParserCollection, StringMap};

/// Language code -> flat string map.
pub type LanguagesTree = HashMap<String, StringMap>;

/// Derives a language code from a file path.
pub type LangCodeFn = dyn Fn(&Path) -> String + Send + Sync;

/// Restricts which files of a directory are loaded.
pub enum FileFilter {
    /// Glob patterns matched against the path relative to the walked directory.
    Glob(GlobSet),
    Predicate(Box<dyn Fn(&Path) -> bool + Send + Sync>),
}

impl FileFilter {
    pub fn globs(patterns: &[&str]) -> Result<Self, LocalizerError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self::Glob(builder.build()?))
    }

    fn matches(&self, relative: &Path) -> bool {
        match self {
            Self::Glob(set) => set.is_match(relative),
            Self::Predicate(predicate) => predicate(relative),
        }
    }
}

#[derive(Default)]
pub struct TreeOptions<'a> {
    pub to_lang_code: Option<&'a LangCodeFn>,
    pub filter: Option<&'a FileFilter>,
    pub throw_on_error: bool,
}

/// Default language code: the file name without its extension.
pub fn file_stem_code(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Recursively load every parsable file under `directory`.
pub async fn directory_to_languages_tree(
    parsers: &ParserCollection,
    directory: &Path,
    options: &TreeOptions<'_>,
) -> Result<LanguagesTree, LocalizerError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 || options.throw_on_error => return Err(e.into()),
            Err(e) => {
                error!("[FILES] ❌ Skipping unreadable entry under {}: {}", directory.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let relative = path.strip_prefix(directory).unwrap_or(&path).to_path_buf();
        if let Some(filter) = options.filter {
            if !filter.matches(&relative) {
                debug!("[FILES] Filtered out {}", relative.display());
                continue;
            }
        }
        if parsers.parser_for(&path).is_none() {
            debug!("[FILES] No parser for {}, skipping", relative.display());
            continue;
        }
        files.push(path);
    }

    let mut tree = LanguagesTree::new();
    for path in files {
        let map = match load_file(parsers, &path).await {
            Ok(map) => map,
            Err(e) => {
                let e = LocalizerError::File {
                    path: path.clone(),
                    source: Box::new(e),
                };
                if options.throw_on_error {
                    return Err(e);
                }
                error!("[FILES] ❌ {}", e);
                continue;
            }
        };

        let code = match options.to_lang_code {
            Some(to_lang_code) => to_lang_code(&path),
            None => file_stem_code(&path),
        };
        debug!("[FILES] {} -> '{}' ({} strings)", path.display(), code, map.len());
        tree.entry(code).or_default().extend(map);
    }

    info!(
        "[FILES] 📂 Loaded {} language(s) from {}",
        tree.len(),
        directory.display()
    );
    Ok(tree)
}

async fn load_file(parsers: &ParserCollection, path: &Path) -> Result<StringMap, LocalizerError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LocalizerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parsers.parse_file(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("en.json"), r#"{"hello": "Hello"}"#).unwrap();
        fs::write(dir.path().join("de.json"), r#"{"hello": "#).unwrap();
        fs::create_dir(dir.path().join("extra")).unwrap();
        fs::write(dir.path().join("extra").join("ru.yaml"), "hello: Привет\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a language").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_malformed_file_is_skipped() {
        let dir = fixture();
        let parsers = ParserCollection::with_defaults();

        let tree = directory_to_languages_tree(&parsers, dir.path(), &TreeOptions::default())
            .await
            .unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree["en"]["hello"], "Hello");
        assert_eq!(tree["ru"]["hello"], "Привет");
        assert!(!tree.contains_key("de"));
    }

    #[tokio::test]
    async fn test_throw_on_error_propagates() {
        let dir = fixture();
        let parsers = ParserCollection::with_defaults();
        let options = TreeOptions {
            throw_on_error: true,
            ..Default::default()
        };

        let err = directory_to_languages_tree(&parsers, dir.path(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, LocalizerError::File { ref path, .. } if path.ends_with("de.json")));
    }

    #[tokio::test]
    async fn test_glob_filter_and_custom_codes() {
        let dir = fixture();
        let parsers = ParserCollection::with_defaults();
        let filter = FileFilter::globs(&["extra/*"]).unwrap();
        let to_code = |path: &Path| format!("x-{}", file_stem_code(path));
        let options = TreeOptions {
            to_lang_code: Some(&to_code as &LangCodeFn),
            filter: Some(&filter),
            throw_on_error: true,
        };

        let tree = directory_to_languages_tree(&parsers, dir.path(), &options)
            .await
            .unwrap();
        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["x-ru"]);
    }

    #[tokio::test]
    async fn test_predicate_filter() {
        let dir = fixture();
        let parsers = ParserCollection::with_defaults();
        let filter = FileFilter::Predicate(Box::new(|path: &Path| path.starts_with("en.json")));
        let options = TreeOptions {
            filter: Some(&filter),
            ..Default::default()
        };

        let tree = directory_to_languages_tree(&parsers, dir.path(), &options)
            .await
            .unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.contains_key("en"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let parsers = ParserCollection::with_defaults();
        let result = directory_to_languages_tree(
            &parsers,
            &dir.path().join("absent"),
            &TreeOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(LocalizerError::Walk(_))));
    }
}
