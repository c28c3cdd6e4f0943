//! Language registry
//!
//! All per-language behaviour lives in [`LanguageProfile`] records: which image
//! to start, which file name the source is staged under, and how to syntax
//! check and run it. The engine only ever looks a profile up; it never matches
//! on a language name. Supporting a new language means registering a profile
//! (here or in the `languages:` section of the configuration) and publishing an
//! image that ships the toolchain.

use crate::errors::ExecutionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder replaced by the in-sandbox path of the staged source file.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Base name of the staged source file, completed by the profile's extension.
pub const SOURCE_FILE_STEM: &str = "code";

/// Argument vector with `{file}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<String>);

impl CommandTemplate {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Substitute the staged file path into every argument.
    pub fn render(&self, file_path: &str) -> Vec<String> {
        self.0
            .iter()
            .map(|arg| arg.replace(FILE_PLACEHOLDER, file_path))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub image: String,
    pub file_extension: String,
    pub syntax_check: CommandTemplate,
    pub run: CommandTemplate,
}

impl LanguageProfile {
    /// Canonical name of the staged source, e.g. `code.py`.
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}",
            SOURCE_FILE_STEM,
            self.file_extension.trim_start_matches('.')
        )
    }

    pub fn python() -> Self {
        Self {
            id: "python".to_string(),
            aliases: vec!["python3".to_string(), "py".to_string()],
            image: "python:3.11-alpine".to_string(),
            file_extension: "py".to_string(),
            syntax_check: CommandTemplate::new([
                "python",
                "-c",
                "import ast, sys; ast.parse(open(sys.argv[1]).read(), sys.argv[1])",
                FILE_PLACEHOLDER,
            ]),
            run: CommandTemplate::new(["python", FILE_PLACEHOLDER]),
        }
    }

    pub fn javascript() -> Self {
        Self {
            id: "javascript".to_string(),
            aliases: vec!["js".to_string(), "node".to_string(), "nodejs".to_string()],
            image: "node:20-alpine".to_string(),
            file_extension: "js".to_string(),
            syntax_check: CommandTemplate::new(["node", "--check", FILE_PLACEHOLDER]),
            run: CommandTemplate::new(["node", FILE_PLACEHOLDER]),
        }
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Immutable lookup table from language name (or alias) to profile.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    profiles: Vec<LanguageProfile>,
    index: HashMap<String, usize>,
}

impl LanguageRegistry {
    /// Empty registry; every lookup fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the built-in python and javascript profiles.
    pub fn with_defaults() -> Self {
        Self::from_profiles([LanguageProfile::python(), LanguageProfile::javascript()])
    }

    /// Build a registry; a later profile replaces an earlier one with the same id.
    pub fn from_profiles<I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = LanguageProfile>,
    {
        let mut registry = Self::default();
        for profile in profiles {
            registry.insert(profile);
        }
        registry
    }

    /// Built-in profiles, overridden or extended by `extra`.
    pub fn with_overrides<I>(extra: I) -> Self
    where
        I: IntoIterator<Item = LanguageProfile>,
    {
        Self::from_profiles(
            [LanguageProfile::python(), LanguageProfile::javascript()]
                .into_iter()
                .chain(extra),
        )
    }

    fn insert(&mut self, profile: LanguageProfile) {
        let id = profile.id.to_lowercase();
        let slot = match self
            .profiles
            .iter()
            .position(|existing| existing.id.eq_ignore_ascii_case(&id))
        {
            Some(pos) => {
                log::debug!("Replacing language profile '{}'", id);
                self.profiles[pos] = profile;
                pos
            }
            None => {
                self.profiles.push(profile);
                self.profiles.len() - 1
            }
        };

        self.index.retain(|_, pos| *pos != slot);
        for name in self.profiles[slot].names() {
            self.index.insert(name.to_lowercase(), slot);
        }
    }

    /// Look a language up by id or alias, ignoring case and surrounding whitespace.
    pub fn resolve(&self, language: &str) -> Result<&LanguageProfile, ExecutionError> {
        let key = language.trim().to_lowercase();
        self.index
            .get(&key)
            .map(|pos| &self.profiles[*pos])
            .ok_or_else(|| ExecutionError::UnsupportedLanguage(language.to_string()))
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.resolve(language).is_ok()
    }

    /// Registered profiles in registration order.
    pub fn languages(&self) -> &[LanguageProfile] {
        &self.profiles
    }

    /// Distinct images referenced by the registered profiles.
    pub fn images(&self) -> Vec<&str> {
        let mut images: Vec<&str> = self.profiles.iter().map(|p| p.image.as_str()).collect();
        images.sort_unstable();
        images.dedup();
        images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_resolves_builtin_languages_and_aliases() {
        let registry = LanguageRegistry::with_defaults();
        assert_eq!(registry.resolve("python").unwrap().id, "python");
        assert_eq!(registry.resolve("Python3").unwrap().id, "python");
        assert_eq!(registry.resolve(" node ").unwrap().id, "javascript");
        assert_eq!(registry.resolve("javascript").unwrap().file_name(), "code.js");
    }

    #[test]
    fn test_unknown_language_is_unsupported() {
        let registry = LanguageRegistry::with_defaults();
        let err = registry.resolve("ruby").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
        assert_eq!(err.to_string(), "unsupported language: ruby");
    }

    #[test]
    fn test_render_substitutes_file_path() {
        let profile = LanguageProfile::python();
        assert_eq!(profile.run.render("/app/code.py"), vec!["python", "/app/code.py"]);
        let check = profile.syntax_check.render("/app/code.py");
        assert_eq!(check.last().map(String::as_str), Some("/app/code.py"));
        assert!(check[2].contains("ast.parse"));
    }

    #[test]
    fn test_override_replaces_profile_and_its_aliases() {
        let custom = LanguageProfile {
            id: "python".to_string(),
            aliases: vec!["cpython".to_string()],
            image: "python-exec".to_string(),
            file_extension: ".py".to_string(),
            syntax_check: CommandTemplate::new(["python", "-m", "py_compile", "{file}"]),
            run: CommandTemplate::new(["python", "-u", "{file}"]),
        };
        let registry = LanguageRegistry::with_overrides([custom]);

        assert_eq!(registry.languages().len(), 2);
        assert_eq!(registry.resolve("cpython").unwrap().image, "python-exec");
        assert_eq!(registry.resolve("python").unwrap().file_name(), "code.py");
        assert!(!registry.is_supported("python3"));
    }

    #[test]
    fn test_extra_language_is_appended() {
        let ruby = LanguageProfile {
            id: "ruby".to_string(),
            aliases: vec![],
            image: "ruby:3.3-alpine".to_string(),
            file_extension: "rb".to_string(),
            syntax_check: CommandTemplate::new(["ruby", "-c", "{file}"]),
            run: CommandTemplate::new(["ruby", "{file}"]),
        };
        let registry = LanguageRegistry::with_overrides([ruby]);
        assert!(registry.is_supported("ruby"));
        assert_eq!(
            registry.images(),
            vec!["node:20-alpine", "python:3.11-alpine", "ruby:3.3-alpine"]
        );
    }

    #[test]
    fn test_empty_registry_supports_nothing() {
        assert!(!LanguageRegistry::empty().is_supported("python"));
    }
}
