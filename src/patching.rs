//! In-place text edits for generated build files
//!
//! Every edit must find what it is looking for. A Makefile that no longer
//! contains the expected line means the source tree changed under us, and
//! carrying on would install to the wrong place.

use crate::error::{ForgeError, Result};
use regex::{NoExpand, Regex};
use tracing::{debug, warn};

/// Replace one exact substring. Fails if `from` does not occur in `text`.
pub fn replace_literal(text: &str, from: &str, to: &str, file: &str) -> Result<String> {
    if !text.contains(from) {
        return Err(ForgeError::patch(format!(
            "{}: expected text not found: {}",
            file,
            truncate(from)
        )));
    }
    Ok(text.replacen(from, to, 1))
}

/// Append `extra` to the value of make variable `var`.
///
/// `EXTRA_LIBS = -lz -lm` becomes `EXTRA_LIBS = -lz -lm -lstdc++`.
pub fn append_make_var(text: &str, var: &str, extra: &str, file: &str) -> Result<String> {
    let pattern = format!(r"(?m)^({}[ \t]*=[ \t]*.*?)[ \t]*$", regex::escape(var));
    let re = Regex::new(&pattern).map_err(|e| ForgeError::patch(e.to_string()))?;

    if !re.is_match(text) {
        return Err(ForgeError::patch(format!(
            "{}: make variable {} not found",
            file, var
        )));
    }
    Ok(re
        .replace(text, |caps: &regex::Captures| format!("{} {}", &caps[1], extra))
        .into_owned())
}

/// One line substitution: the first line matching `pattern` becomes `replacement`
#[derive(Debug, Clone)]
pub struct LineRule {
    pattern: Regex,
    replacement: String,
}

impl LineRule {
    /// `pattern` is anchored to whole lines
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(&format!("(?m){}", pattern))
            .map_err(|e| ForgeError::patch(e.to_string()))?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }
}

/// Apply each rule to its first matching line.
///
/// A rule without a match is logged and skipped, but the edit as a whole
/// must change something.
pub fn substitute_lines(text: &str, rules: &[LineRule], file: &str) -> Result<String> {
    let mut out = text.to_string();
    for rule in rules {
        if rule.pattern.is_match(&out) {
            out = rule
                .pattern
                .replace(&out, NoExpand(&rule.replacement))
                .into_owned();
            debug!("{}: set {}", file, rule.replacement);
        } else {
            warn!("{}: no line matches {}", file, rule.pattern.as_str());
        }
    }

    if out == text {
        return Err(ForgeError::patch(format!("{}: no substitutions applied", file)));
    }
    Ok(out)
}

fn truncate(s: &str) -> String {
    const MAX: usize = 60;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
