// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of `comanda.toml` load failures as miette diagnostics.
//!
//! Unknown keys are checked against [`SECTION_KEYS`]. A typo gets the closest
//! key of the same section, and a key written under the wrong section points
//! at the section that owns it. Spans are resolved in the file (or inline
//! string) the offending value came from.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::model::{SECTION_KEYS, section_keys};

/// Name under which an inline TOML string is registered as a source.
pub const INLINE_SOURCE: &str = "<inline>";

/// Jaro-Winkler score a candidate needs before it is offered as a fix.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key not accepted by its section.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(comanda::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), owner.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The unrecognized key name.
        key: String,
        /// Closest key of the same section, if any is close enough.
        suggestion: Option<String>,
        /// Section that does accept this exact key, if it was misplaced.
        owner: Option<String>,
        /// Keys the section accepts, comma separated.
        valid_keys: String,
        #[label("not a key of this section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A top-level table that is not a comanda section.
    #[error("unknown configuration section `[{section}]`")]
    #[diagnostic(
        code(comanda::config::unknown_section),
        help("{}", unknown_section_help(suggestion.as_deref()))
    )]
    UnknownSection {
        section: String,
        /// Closest known section name.
        suggestion: Option<String>,
        #[label("unknown section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong type, e.g. a string for `gateway.port`.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(comanda::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path of the key, e.g. `gateway.port`.
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed but breaks a cross-field or range rule.
    #[error("validation error: {message}")]
    #[diagnostic(code(comanda::config::validation))]
    Validation { message: String },

    /// Anything else figment reports, such as TOML syntax errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(comanda::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, owner: Option<&str>, valid_keys: &str) -> String {
    match (owner, suggestion) {
        (Some(section), _) => format!("this key belongs in [{section}]; valid keys here: {valid_keys}"),
        (None, Some(key)) => format!("did you mean `{key}`? Valid keys: {valid_keys}"),
        (None, None) => format!("valid keys: {valid_keys}"),
    }
}

fn unknown_section_help(suggestion: Option<&str>) -> String {
    let known: Vec<&str> = SECTION_KEYS.iter().map(|(name, _)| *name).collect();
    match suggestion {
        Some(s) => format!("did you mean [{s}]? Sections: {}", known.join(", ")),
        None => format!("sections: {}", known.join(", ")),
    }
}

/// Convert a figment extraction error into one diagnostic per failure.
///
/// `sources` pairs a source name (file path or [`INLINE_SOURCE`]) with its
/// content, for span lookup.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let path: Vec<&str> = error.path.iter().map(String::as_str).collect();
            let source = source_of(&error, sources);
            match &error.kind {
                // The path ends with the unknown field itself.
                Kind::UnknownField(field, _) => match path.as_slice() {
                    [section, _, ..] => unknown_key(section, field, source),
                    _ => unknown_section(field, source),
                },
                Kind::InvalidType(actual, expected) => {
                    let (span, src) = match path.as_slice() {
                        [section, .., key] => locate(source, Some(*section), key),
                        _ => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: path.join("."),
                        detail: format!("found {actual}, expected {expected}"),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn unknown_key(section: &str, key: &str, source: Option<(&str, &str)>) -> ConfigError {
    let valid = section_keys(section).unwrap_or_default();
    let owner = SECTION_KEYS
        .iter()
        .find(|(name, keys)| *name != section && keys.contains(&key))
        .map(|(name, _)| name.to_string());
    let (span, src) = locate(source, Some(section), key);
    ConfigError::UnknownKey {
        key: key.to_string(),
        suggestion: suggest_key(key, valid),
        owner,
        valid_keys: valid.join(", "),
        span,
        src,
    }
}

fn unknown_section(section: &str, source: Option<(&str, &str)>) -> ConfigError {
    let known: Vec<&str> = SECTION_KEYS.iter().map(|(name, _)| *name).collect();
    let header = format!("[{section}]");
    let (span, src) = match source {
        Some((name, content)) => match content.find(&header) {
            Some(offset) => (
                Some(SourceSpan::new(offset.into(), header.len())),
                Some(NamedSource::new(name, content.to_string())),
            ),
            None => (None, None),
        },
        None => (None, None),
    };
    ConfigError::UnknownSection {
        section: section.to_string(),
        suggestion: suggest_key(section, &known),
        span,
        src,
    }
}

/// The loaded text the failing value came from, as `(name, content)`.
fn source_of<'a>(
    error: &figment::Error,
    sources: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    let metadata = error.metadata.as_ref()?;
    let wanted = match &metadata.source {
        Some(figment::Source::File(path)) => path.display().to_string(),
        None if metadata.name.ends_with("source string") => INLINE_SOURCE.to_string(),
        _ => return None,
    };
    sources
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(name, content)| (name.as_str(), content.as_str()))
}

fn locate(
    source: Option<(&str, &str)>,
    section: Option<&str>,
    key: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some((name, content)) = source else {
        return (None, None);
    };
    match key_offset(content, section, key) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), key.len())),
            Some(NamedSource::new(name, content.to_string())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `key = ...` inside `[section]` (or before any header when
/// `section` is `None`). Keys under other sections never match.
fn key_offset(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if let Some(header) = trimmed.strip_prefix('[') {
            current = header.split(']').next().map(str::trim);
        } else if current == section {
            let is_key = trimmed
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='));
            if is_key {
                return Some(offset + indent);
            }
        }
        offset += line.len();
    }
    None
}

/// Closest candidate to `unknown` by Jaro-Winkler similarity, if any scores
/// above the threshold.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|candidate| (strsim::jaro_winkler(unknown, candidate), *candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// Print every error to stderr through miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
    if errors.len() > 1 {
        eprintln!("{} configuration errors", errors.len());
    }
}
