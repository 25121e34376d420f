//! Pattern registry -- named detection rules compiled once at startup
//!
//! A [`PatternRegistry`] holds an ordered sequence of [`LogPattern`]s with their
//! regular expressions compiled case-insensitively. Evaluation is
//! first-match-wins in registry order, and a single bad expression fails
//! construction of the whole registry.
//!
//! # Composition
//! The registry is built from any `Vec<LogPattern>`. [`compose`] combines the
//! built-in library with patterns loaded from a YAML file according to a
//! [`PatternsMode`].
//!
//! ```ignore
//! let custom = PatternLoader::load_file("patterns.yml").await?;
//! let registry = PatternRegistry::new(compose(default_patterns(), custom, PatternsMode::Prepend))?;
//! ```

pub mod defaults;
pub mod loader;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use tailwarden_core::types::Severity;

use crate::error::WatcherError;

pub use defaults::default_patterns;
pub use loader::PatternLoader;

/// Compiled expression size limit (bytes)
const REGEX_SIZE_LIMIT: usize = 1024 * 1024;

/// A named detection rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPattern {
    /// Unique identifier, also reported as `pattern_name`
    pub name: String,
    /// Regular expression, matched case-insensitively anywhere in the line
    pub pattern: String,
    /// Severity assigned to matching incidents
    pub severity: Severity,
    /// Free-form classification (database, memory, disk, ...)
    pub category: String,
    /// Remediation hint
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

impl LogPattern {
    /// Creates a pattern without a remediation hint.
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            severity,
            category: category.into(),
            suggested_fix: None,
        }
    }

    /// Attaches a remediation hint.
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    /// Checks the fields that do not need compilation.
    pub fn validate(&self) -> Result<(), WatcherError> {
        if self.name.trim().is_empty() {
            return Err(WatcherError::PatternValidation {
                name: self.name.clone(),
                reason: "name must not be empty".to_owned(),
            });
        }
        if self.pattern.is_empty() {
            return Err(WatcherError::PatternValidation {
                name: self.name.clone(),
                reason: "pattern must not be empty".to_owned(),
            });
        }
        if self.category.trim().is_empty() {
            return Err(WatcherError::PatternValidation {
                name: self.name.clone(),
                reason: "category must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    /// Compiles the expression, case-insensitive and unanchored.
    fn compile(&self) -> Result<Regex, WatcherError> {
        RegexBuilder::new(&self.pattern)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| WatcherError::PatternCompile {
                name: self.name.clone(),
                reason: e.to_string(),
            })
    }
}

/// How custom patterns combine with the built-in library
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatternsMode {
    /// Custom patterns only
    Replace,
    /// Custom patterns first, so they win on overlap
    Prepend,
    /// Built-ins first
    #[default]
    Append,
}

impl FromStr for PatternsMode {
    type Err = WatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "prepend" => Ok(Self::Prepend),
            "append" => Ok(Self::Append),
            other => Err(WatcherError::Config {
                field: "watch.patterns_mode".to_owned(),
                reason: format!("unknown mode '{other}', expected replace, prepend or append"),
            }),
        }
    }
}

impl fmt::Display for PatternsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replace => "replace",
            Self::Prepend => "prepend",
            Self::Append => "append",
        })
    }
}

/// Combines built-in and custom patterns according to `mode`.
pub fn compose(
    builtin: Vec<LogPattern>,
    custom: Vec<LogPattern>,
    mode: PatternsMode,
) -> Vec<LogPattern> {
    match mode {
        PatternsMode::Replace => custom,
        PatternsMode::Prepend => custom.into_iter().chain(builtin).collect(),
        PatternsMode::Append => builtin.into_iter().chain(custom).collect(),
    }
}

struct CompiledPattern {
    pattern: LogPattern,
    regex: Regex,
}

/// Ordered, read-only pattern set
///
/// Shared between watchers behind an `Arc`; nothing mutates it after
/// construction.
pub struct PatternRegistry {
    patterns: Vec<CompiledPattern>,
}

impl PatternRegistry {
    /// Validates and compiles `patterns`, keeping their order.
    ///
    /// # Errors
    /// - `PatternValidation` for an empty field or a duplicate name
    /// - `PatternCompile` for the first expression that fails to compile
    pub fn new(patterns: Vec<LogPattern>) -> Result<Self, WatcherError> {
        let mut seen = HashSet::with_capacity(patterns.len());
        let mut compiled = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            pattern.validate()?;
            if !seen.insert(pattern.name.clone()) {
                return Err(WatcherError::PatternValidation {
                    name: pattern.name,
                    reason: "duplicate pattern name".to_owned(),
                });
            }
            let regex = pattern.compile()?;
            compiled.push(CompiledPattern { pattern, regex });
        }

        Ok(Self { patterns: compiled })
    }

    /// Registry holding only the built-in library.
    pub fn with_defaults() -> Result<Self, WatcherError> {
        Self::new(default_patterns())
    }

    /// Builds the registry from the built-ins plus an optional pattern file.
    ///
    /// Without a file the built-ins are used as-is and `mode` is ignored.
    pub async fn load(
        patterns_file: Option<&Path>,
        mode: PatternsMode,
    ) -> Result<Self, WatcherError> {
        let registry = match patterns_file {
            Some(path) => {
                let custom = PatternLoader::load_file(path).await?;
                Self::new(compose(default_patterns(), custom, mode))?
            }
            None => Self::with_defaults()?,
        };

        tracing::info!(
            patterns = registry.len(),
            file = ?patterns_file,
            mode = %mode,
            "pattern registry ready"
        );
        Ok(registry)
    }

    /// Returns the first pattern whose expression matches anywhere in `line`.
    pub fn first_match(&self, line: &str) -> Option<&LogPattern> {
        self.patterns
            .iter()
            .find(|c| c.regex.is_match(line))
            .map(|c| &c.pattern)
    }

    /// Patterns in evaluation order.
    pub fn patterns(&self) -> impl Iterator<Item = &LogPattern> {
        self.patterns.iter().map(|c| &c.pattern)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl fmt::Debug for PatternRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternRegistry")
            .field("patterns", &self.patterns().map(|p| &p.name).collect::<Vec<_>>())
            .finish()
    }
}
