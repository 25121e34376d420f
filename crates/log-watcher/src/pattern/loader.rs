//! Pattern file loader -- custom patterns from YAML
//!
//! A pattern file is either a bare list or a mapping with a `patterns` key:
//!
//! ```yaml
//! patterns:
//!   - name: redis_oom
//!     pattern: "OOM command not allowed"
//!     severity: critical
//!     category: database
//!     suggested_fix: Raise maxmemory or enable eviction
//! ```
//!
//! Unlike a directory of rule files, a pattern file is all or nothing: any
//! parse or validation failure rejects the file.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::LogPattern;
use crate::error::WatcherError;

const MAX_PATTERN_FILE_SIZE: u64 = 1024 * 1024; // 1MB
const MAX_PATTERNS_COUNT: usize = 1_000;

#[derive(Deserialize)]
#[serde(untagged)]
enum PatternFile {
    List(Vec<LogPattern>),
    Document { patterns: Vec<LogPattern> },
}

/// Custom pattern file loader
pub struct PatternLoader;

impl PatternLoader {
    /// Loads patterns from a YAML file.
    ///
    /// # Errors
    /// - `PatternLoad` when the file is missing, too large or not valid YAML
    /// - `PatternValidation` for empty fields or duplicate names within the file
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<LogPattern>, WatcherError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| WatcherError::PatternLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_PATTERN_FILE_SIZE {
            return Err(WatcherError::PatternLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_PATTERN_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| WatcherError::PatternLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let patterns = Self::parse_yaml(&content, &path.display().to_string())?;

        tracing::info!(
            path = %path.display(),
            count = patterns.len(),
            "loaded custom patterns"
        );

        Ok(patterns)
    }

    /// Parses a YAML document into patterns, keeping file order.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<Vec<LogPattern>, WatcherError> {
        let file: PatternFile =
            serde_yaml::from_str(yaml_str).map_err(|e| WatcherError::PatternLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        let patterns = match file {
            PatternFile::List(patterns) | PatternFile::Document { patterns } => patterns,
        };

        if patterns.len() > MAX_PATTERNS_COUNT {
            return Err(WatcherError::PatternLoad {
                path: source.to_owned(),
                reason: format!("too many patterns: max {MAX_PATTERNS_COUNT}"),
            });
        }

        let mut seen = HashSet::new();
        for pattern in &patterns {
            pattern.validate()?;
            if !seen.insert(pattern.name.as_str()) {
                return Err(WatcherError::PatternValidation {
                    name: pattern.name.clone(),
                    reason: format!("duplicate pattern name in {source}"),
                });
            }
        }

        Ok(patterns)
    }
}
