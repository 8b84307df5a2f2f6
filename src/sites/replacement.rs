//! Ordered text substitution over response bodies.
//!
//! # Design Decisions
//! - Literal rules compile to an escaped pattern so both modes share the same
//!   leftmost-first, non-overlapping matcher
//! - Patterns compile once at load time; the lazy path is compile-once via
//!   `OnceLock` and never compiles twice under contention
//! - Bodies are raw bytes, so `regex::bytes` is used throughout
//! - A literal rule with an empty `from` is rejected when a site loads; one
//!   built in code leaves the body unchanged

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::bytes::{NoExpand, Regex};
use serde::Deserialize;

/// How `from` is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ReplaceKind {
    #[default]
    #[serde(rename = "literal", alias = "", alias = "simple")]
    Literal,
    #[serde(rename = "regex")]
    Regex,
}

/// One substitution rule from a route descriptor.
#[derive(Debug, Deserialize)]
pub struct Replacement {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    /// Maximum literal replacements, 0 = unlimited. Ignored for regex rules.
    #[serde(default)]
    pub count: usize,
    #[serde(default, rename = "type")]
    pub kind: ReplaceKind,

    #[serde(skip)]
    compiled: OnceLock<Regex>,
}

impl Clone for Replacement {
    fn clone(&self) -> Self {
        let compiled = OnceLock::new();
        if let Some(re) = self.compiled.get() {
            let _ = compiled.set(re.clone());
        }
        Self {
            from: self.from.clone(),
            to: self.to.clone(),
            count: self.count,
            kind: self.kind,
            compiled,
        }
    }
}

impl Replacement {
    pub fn literal(from: impl Into<String>, to: impl Into<String>, count: usize) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            count,
            kind: ReplaceKind::Literal,
            compiled: OnceLock::new(),
        }
    }

    pub fn regex(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            count: 0,
            kind: ReplaceKind::Regex,
            compiled: OnceLock::new(),
        }
    }

    /// Compile the pattern now so a bad rule fails the load, not a request.
    pub fn compile(&self) -> Result<(), regex::Error> {
        self.pattern().map(|_| ())
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    fn pattern(&self) -> Result<&Regex, regex::Error> {
        if let Some(re) = self.compiled.get() {
            return Ok(re);
        }
        let source = match self.kind {
            ReplaceKind::Literal => regex::escape(&self.from),
            ReplaceKind::Regex => self.from.clone(),
        };
        let re = Regex::new(&source)?;
        // A racing initializer may win; both compiled the same source.
        Ok(self.compiled.get_or_init(|| re))
    }

    /// Apply this rule to `body`.
    pub fn apply<'a>(&self, body: &'a [u8]) -> Cow<'a, [u8]> {
        if self.kind == ReplaceKind::Literal && self.from.is_empty() {
            return Cow::Borrowed(body);
        }
        let re = match self.pattern() {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(pattern = %self.from, error = %e, "Skipping uncompilable replacement");
                return Cow::Borrowed(body);
            }
        };
        match self.kind {
            ReplaceKind::Literal => re.replacen(body, self.count, NoExpand(self.to.as_bytes())),
            ReplaceKind::Regex => re.replace_all(body, self.to.as_bytes()),
        }
    }
}

/// Run every rule in order, each seeing the previous rule's output.
pub fn apply_all(replacements: &[Replacement], body: &[u8]) -> Vec<u8> {
    let mut current: Cow<'_, [u8]> = Cow::Borrowed(body);
    for replacement in replacements {
        let next = match replacement.apply(&current) {
            Cow::Owned(next) => Some(next),
            Cow::Borrowed(_) => None,
        };
        if let Some(next) = next {
            current = Cow::Owned(next);
        }
    }
    current.into_owned()
}
