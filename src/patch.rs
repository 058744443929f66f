//! Source patching for files inside the cloned application.
//!
//! Two kinds of rules are supported:
//!
//! - [`PatchRule::Line`] overwrites a 1-based line number. The previous content
//!   is irrelevant unless an `expect` pattern is given, but the file must be
//!   long enough: a short file is an error, never a silent corruption.
//! - [`PatchRule::Pattern`] rewrites every line matching a regex. A pattern that
//!   matches nothing is an error.
//!
//! All rules are applied to an in-memory copy first. The file is written only
//! when every rule succeeded.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// A single edit applied to a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatchRule {
    /// Overwrite line `line` (1-based) with `content`.
    Line {
        line: usize,
        content: String,
        /// Optional regex the current line must match before it is overwritten.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<String>,
    },
    /// Replace matches of `pattern` on every line with `replacement`.
    ///
    /// `replacement` supports `$1` / `${name}` capture references.
    Pattern { pattern: String, replacement: String },
}

impl PatchRule {
    /// Overwrite a line regardless of its current content.
    pub fn line(line: usize, content: impl Into<String>) -> Self {
        Self::Line {
            line,
            content: content.into(),
            expect: None,
        }
    }

    /// Regex substitution rule.
    pub fn pattern(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Static checks that do not need the target file.
    pub fn validate(&self) -> Result<(), PatchError> {
        match self {
            Self::Line { line, content, expect } => {
                if *line == 0 {
                    return Err(PatchError::InvalidLineNumber);
                }
                if content.contains('\n') {
                    return Err(PatchError::MultilineContent { line: *line });
                }
                if let Some(expect) = expect {
                    compile(expect)?;
                }
                Ok(())
            }
            Self::Pattern { pattern, .. } => compile(pattern).map(|_| ()),
        }
    }
}

/// Errors raised while patching. Any of these leaves the file untouched.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("line numbers are 1-based, got 0")]
    InvalidLineNumber,

    #[error("replacement for line {line} contains a newline")]
    MultilineContent { line: usize },

    #[error("line {line} does not exist (file has {available} lines)")]
    LineOutOfRange { line: usize, available: usize },

    #[error("line {line} does not match expected pattern '{expected}' (found '{found}')")]
    UnexpectedContent {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("pattern '{pattern}' matched no lines")]
    PatternNotFound { pattern: String },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A line that a patch rewrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedLine {
    /// 1-based line number
    pub line: usize,
    pub before: String,
    pub after: String,
}

/// Outcome of a successful patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSummary {
    pub path: PathBuf,
    pub changes: Vec<ChangedLine>,
}

impl PatchSummary {
    /// True if the patch altered at least one line's content.
    pub fn modified(&self) -> bool {
        self.changes.iter().any(|c| c.before != c.after)
    }
}

/// One line of a file, kept with its original terminator (`\n`, `\r\n` or none).
#[derive(Debug, Clone)]
struct SourceLine {
    body: String,
    terminator: &'static str,
}

fn split_lines(text: &str) -> Vec<SourceLine> {
    text.split_inclusive('\n')
        .map(|raw| {
            if let Some(body) = raw.strip_suffix("\r\n") {
                SourceLine { body: body.to_string(), terminator: "\r\n" }
            } else if let Some(body) = raw.strip_suffix('\n') {
                SourceLine { body: body.to_string(), terminator: "\n" }
            } else {
                SourceLine { body: raw.to_string(), terminator: "" }
            }
        })
        .collect()
}

fn join_lines(lines: &[SourceLine]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.body.len() + 2).sum());
    for line in lines {
        out.push_str(&line.body);
        out.push_str(line.terminator);
    }
    out
}

fn compile(pattern: &str) -> Result<Regex, PatchError> {
    Regex::new(pattern).map_err(|source| PatchError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn record(changes: &mut Vec<ChangedLine>, line: usize, before: String, after: &str) {
    // Later rules touching the same line keep the original "before".
    if let Some(existing) = changes.iter_mut().find(|c| c.line == line) {
        existing.after = after.to_string();
    } else {
        changes.push(ChangedLine {
            line,
            before,
            after: after.to_string(),
        });
    }
}

/// Apply `rules` in order to `text` and return the new text plus the lines touched.
pub fn apply_rules(text: &str, rules: &[PatchRule]) -> Result<(String, Vec<ChangedLine>), PatchError> {
    let mut lines = split_lines(text);
    let mut changes = Vec::new();

    for rule in rules {
        rule.validate()?;
        match rule {
            PatchRule::Line { line, content, expect } => {
                let available = lines.len();
                let target = lines
                    .get_mut(line - 1)
                    .ok_or(PatchError::LineOutOfRange { line: *line, available })?;

                if let Some(expect) = expect {
                    if !compile(expect)?.is_match(&target.body) {
                        return Err(PatchError::UnexpectedContent {
                            line: *line,
                            expected: expect.clone(),
                            found: target.body.clone(),
                        });
                    }
                }

                let before = std::mem::replace(&mut target.body, content.clone());
                record(&mut changes, *line, before, content);
            }
            PatchRule::Pattern { pattern, replacement } => {
                let re = compile(pattern)?;
                let mut matched = 0usize;
                for (idx, target) in lines.iter_mut().enumerate() {
                    if !re.is_match(&target.body) {
                        continue;
                    }
                    matched += 1;
                    let after = re.replace_all(&target.body, replacement.as_str()).into_owned();
                    let before = std::mem::replace(&mut target.body, after);
                    record(&mut changes, idx + 1, before, &target.body);
                }
                if matched == 0 {
                    return Err(PatchError::PatternNotFound {
                        pattern: pattern.clone(),
                    });
                }
            }
        }
    }

    changes.sort_by_key(|c| c.line);
    Ok((join_lines(&lines), changes))
}

/// Patch the file at `path` in place.
pub fn apply_patch(path: &Path, rules: &[PatchRule]) -> Result<PatchSummary, PatchError> {
    let io_err = |source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    };

    let original = fs::read_to_string(path).map_err(io_err)?;
    let (patched, changes) = apply_rules(&original, rules)?;

    for change in &changes {
        debug!(line = change.line, before = %change.before, after = %change.after, "patched line");
    }

    if patched != original {
        fs::write(path, patched).map_err(io_err)?;
    }
    info!("Patched {} ({} line(s) touched)", path.display(), changes.len());

    Ok(PatchSummary {
        path: path.to_path_buf(),
        changes,
    })
}
