//! Core IR, traits, and error types for the asm_rebase normalizer.
//!
//! This library rewrites the control-flow targets of a disassembled function
//! into positions within that same function, so the resulting listing no
//! longer depends on where the function was loaded. Label operands such as
//! `loc_401020` and self-relative operands such as `$+5` become `INSTR<n>`,
//! where `n` is the 1-based rank of the target in address order.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use asm_rebase::{
//!     batch::BatchNormalizer,
//!     format::{FileSink, OutputFormat},
//!     source::ListingSource,
//! };
//!
//! // Load a listing exported from a disassembler
//! let source = ListingSource::from_path("listing.json").unwrap();
//!
//! // Normalize every function and write the dataset in one go
//! let mut sink = FileSink::new("listing.rebased.json", OutputFormat::Json);
//! BatchNormalizer::new().run_into(&source, &mut sink).unwrap();
//! ```

pub mod index;
pub mod resolve;
pub mod rebase;
pub mod batch;
pub mod source;
pub mod format;
#[cfg(feature = "extension-module")]
pub mod python;

/// Represents an address in memory
pub type Address = u64;

/// Identifies a function inside a [`DisassemblySource`] (its entry address).
pub type FunctionId = Address;

use std::fmt;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One disassembled instruction, as handed over by a source.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Instruction {
    /// Address of the instruction
    #[serde(deserialize_with = "source::deserialize_address")]
    pub address: Address,
    /// Disassembly text (mnemonic, operands, comments)
    pub text: String,
}

impl Instruction {
    /// Create a new instruction
    pub fn new(address: Address, text: impl Into<String>) -> Self {
        Self {
            address,
            text: text.into(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}\t{}", self.address, self.text)
    }
}

/// All instructions of one function, in the order the source discovered them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct FunctionListing {
    /// Entry address of the function
    #[serde(deserialize_with = "source::deserialize_address")]
    pub entry: Address,
    /// Instructions belonging to the function
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl FunctionListing {
    /// Create a new function listing
    pub fn new(entry: Address, instructions: Vec<Instruction>) -> Self {
        Self { entry, instructions }
    }
}

/// A function whose branch targets have been rewritten to positions.
///
/// Position `n` (1-based) holds the text of the `n`-th instruction in
/// ascending address order. Serializes as `{"1": ..., "2": ..., ...}` with
/// keys in numeric order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFunction {
    texts: Vec<String>,
}

impl NormalizedFunction {
    /// Build from texts already in position order
    pub fn from_texts(texts: Vec<String>) -> Self {
        Self { texts }
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// True for a function without instructions
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Text at 1-based `position`
    pub fn get(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.texts.get(i))
            .map(String::as_str)
    }

    /// Iterate `(position, text)` pairs in position order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.texts.iter().enumerate().map(|(i, t)| (i + 1, t.as_str()))
    }

    /// Texts in position order
    pub fn texts(&self) -> &[String] {
        &self.texts
    }
}

impl Serialize for NormalizedFunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.texts.len()))?;
        for (position, text) in self.iter() {
            map.serialize_entry(&position.to_string(), text)?;
        }
        map.end()
    }
}

/// Every normalized function of one run, in source enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct NormalizedDataset {
    functions: Vec<NormalizedFunction>,
}

impl NormalizedDataset {
    /// Wrap functions already in enumeration order
    pub fn new(functions: Vec<NormalizedFunction>) -> Self {
        Self { functions }
    }

    /// Number of functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True when no function was produced
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Functions in enumeration order
    pub fn functions(&self) -> &[NormalizedFunction] {
        &self.functions
    }

    /// Total number of instructions across all functions
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(NormalizedFunction::len).sum()
    }
}

/// Source trait: supplies functions and their raw instructions.
pub trait DisassemblySource: Send + Sync {
    /// Enumerate function identifiers in a stable order
    fn functions(&self) -> Result<Vec<FunctionId>, RebaseError>;

    /// Fetch the instructions of one function
    ///
    /// # Arguments
    /// * `function` - An identifier previously returned by `functions()`
    ///
    /// # Returns
    /// The function's `(address, text)` pairs in discovery order
    fn instructions(&self, function: FunctionId) -> Result<Vec<Instruction>, RebaseError>;
}

/// Sink trait: persists a complete dataset in a single step.
pub trait DatasetSink {
    /// Persist the whole dataset
    fn persist(&mut self, dataset: &NormalizedDataset) -> Result<(), RebaseError>;
}

/// Error type for normalization operations
#[derive(Debug, thiserror::Error)]
pub enum RebaseError {
    /// The disassembly source could not supply data
    #[error("Disassembly source error: {0}")]
    Source(String),

    /// Two instructions of one function share an address
    #[error("Duplicate instruction address 0x{0:x}")]
    DuplicateAddress(Address),

    /// Dialect configuration is unusable
    #[error("Invalid dialect: {0}")]
    InvalidDialect(String),

    /// A matcher pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Dataset could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_function_positions() {
        let func = NormalizedFunction::from_texts(vec![
            "push rbp".to_string(),
            "ret".to_string(),
        ]);

        assert_eq!(func.len(), 2);
        assert_eq!(func.get(0), None);
        assert_eq!(func.get(1), Some("push rbp"));
        assert_eq!(func.get(2), Some("ret"));
        assert_eq!(func.get(3), None);
    }

    #[test]
    fn test_normalized_function_keys_in_numeric_order() {
        let texts: Vec<String> = (1..=11).map(|i| format!("nop ; {}", i)).collect();
        let func = NormalizedFunction::from_texts(texts);

        let json = serde_json::to_string(&func).unwrap();

        // "10" and "11" must follow "9", not "1"
        let pos9 = json.find("\"9\"").unwrap();
        let pos10 = json.find("\"10\"").unwrap();
        let pos2 = json.find("\"2\"").unwrap();
        assert!(pos2 < pos9);
        assert!(pos9 < pos10);
    }

    #[test]
    fn test_dataset_serializes_as_array() {
        let dataset = NormalizedDataset::new(vec![
            NormalizedFunction::from_texts(vec!["ret".to_string()]),
            NormalizedFunction::default(),
        ]);

        let json = serde_json::to_string(&dataset).unwrap();
        assert_eq!(json, r#"[{"1":"ret"},{}]"#);
        assert_eq!(dataset.instruction_count(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = RebaseError::DuplicateAddress(0x401000);
        assert_eq!(err.to_string(), "Duplicate instruction address 0x401000");
    }
}
