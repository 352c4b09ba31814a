//! Branch operand resolvers and the dialect that configures them

use std::fmt;
use regex::Regex;
use serde::Deserialize;
use crate::{Address, RebaseError};
use crate::index::AddressIndex;

pub mod label;
pub mod relative;

/// Textual conventions of the disassembler that produced a listing.
///
/// The default is the IDA convention: branch mnemonics start with `j`,
/// local labels are `loc_<hex>` / `locret_<hex>`, and self-relative
/// operands are written `$+<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Dialect {
    /// Mnemonic prefixes marking a branch instruction
    pub branch_prefixes: Vec<String>,
    /// Label kinds written as `<kind>_<hex-address>`
    pub label_kinds: Vec<String>,
    /// Marker preceding a self-relative hexadecimal offset
    pub relative_marker: String,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            branch_prefixes: vec!["j".to_string()],
            label_kinds: vec!["loc".to_string(), "locret".to_string()],
            relative_marker: "$+".to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "branches [{}], labels [{}], relative '{}'",
            self.branch_prefixes.join(", "),
            self.label_kinds.join(", "),
            self.relative_marker
        )
    }
}

impl Dialect {
    /// Check the dialect and build its matchers.
    pub fn compile(&self) -> Result<CompiledDialect, RebaseError> {
        if self.branch_prefixes.is_empty() || self.branch_prefixes.iter().any(String::is_empty) {
            return Err(RebaseError::InvalidDialect(
                "branch prefixes must be non-empty".into(),
            ));
        }
        if self.label_kinds.is_empty() || self.label_kinds.iter().any(String::is_empty) {
            return Err(RebaseError::InvalidDialect(
                "label kinds must be non-empty".into(),
            ));
        }
        if self.relative_marker.is_empty() {
            return Err(RebaseError::InvalidDialect(
                "relative marker must be non-empty".into(),
            ));
        }

        // Longest kind first so that overlapping kinds prefer the full word
        let mut kinds: Vec<&str> = self.label_kinds.iter().map(String::as_str).collect();
        kinds.sort_by_key(|k| std::cmp::Reverse(k.len()));
        let kinds = kinds
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        let label = Regex::new(&format!(r" (?P<kind>{})_(?P<target>\w+)", kinds))?;
        let relative = Regex::new(&format!(
            r"{}(?P<offset>\w+)",
            regex::escape(&self.relative_marker)
        ))?;

        Ok(CompiledDialect {
            branch_prefixes: self.branch_prefixes.clone(),
            label,
            relative,
        })
    }
}

/// A dialect with its matchers compiled, ready to rewrite instructions.
#[derive(Debug, Clone)]
pub struct CompiledDialect {
    branch_prefixes: Vec<String>,
    label: Regex,
    relative: Regex,
}

impl CompiledDialect {
    /// Returns true if `text` starts with one of the branch mnemonic prefixes
    pub fn is_branch(&self, text: &str) -> bool {
        self.branch_prefixes.iter().any(|p| text.starts_with(p.as_str()))
    }

    /// Rewrite the branch operands of one instruction.
    ///
    /// Labels are resolved first, then self-relative offsets on the
    /// already-rewritten text. Non-branch instructions come back verbatim.
    pub fn resolve(&self, text: &str, address: Address, index: &AddressIndex) -> String {
        if !self.is_branch(text) {
            return text.to_string();
        }

        let labelled = label::resolve(text, &self.label, index);
        relative::resolve(&labelled, address, &self.relative, index).into_owned()
    }

    pub fn label_pattern(&self) -> &Regex {
        &self.label
    }

    pub fn relative_pattern(&self) -> &Regex {
        &self.relative
    }
}

impl Default for CompiledDialect {
    fn default() -> Self {
        // The default dialect contains only literal, escaped pieces
        Dialect::default()
            .compile()
            .expect("default dialect compiles")
    }
}
