//! Disassembly sources backed by exported function listings

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::{Address, DisassemblySource, FunctionId, FunctionListing, Instruction, RebaseError};

/// On-disk listing document: either `{"functions": [...]}` or a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum ListingDocument {
    Wrapped { functions: Vec<FunctionListing> },
    Bare(Vec<FunctionListing>),
}

/// Address as written in a listing: a JSON integer or a string
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Number(Address),
    Text(String),
}

/// Parse `0x`-prefixed hexadecimal or plain decimal
fn parse_address(text: &str) -> Option<Address> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => Address::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Serde helper accepting `4096`, `"4096"` or `"0x1000"`
pub(crate) fn deserialize_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    match RawAddress::deserialize(deserializer)? {
        RawAddress::Number(addr) => Ok(addr),
        RawAddress::Text(text) => parse_address(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid address '{}'", text))),
    }
}

/// An in-memory source over function listings, in listing order.
#[derive(Debug, Clone, Default)]
pub struct ListingSource {
    functions: Vec<FunctionListing>,
    by_entry: HashMap<FunctionId, usize>,
}

impl ListingSource {
    /// Create a source; function entries must be unique
    pub fn new(functions: Vec<FunctionListing>) -> Result<Self, RebaseError> {
        let mut by_entry = HashMap::with_capacity(functions.len());
        for (i, func) in functions.iter().enumerate() {
            if by_entry.insert(func.entry, i).is_some() {
                return Err(RebaseError::Source(format!(
                    "function 0x{:x} listed twice",
                    func.entry
                )));
            }
        }

        Ok(Self { functions, by_entry })
    }

    /// Load a listing document from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RebaseError> {
        let document: ListingDocument = serde_json::from_reader(reader)
            .map_err(|e| RebaseError::Source(format!("malformed listing: {}", e)))?;
        Self::from_document(document)
    }

    /// Load a listing document from a file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RebaseError> {
        let path = path.as_ref();
        log::debug!("Reading listing {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    fn from_document(document: ListingDocument) -> Result<Self, RebaseError> {
        let functions = match document {
            ListingDocument::Wrapped { functions } => functions,
            ListingDocument::Bare(functions) => functions,
        };
        log::debug!("Listing holds {} functions", functions.len());
        Self::new(functions)
    }

    /// Number of functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FromStr for ListingSource {
    type Err = RebaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let document: ListingDocument = serde_json::from_str(s)
            .map_err(|e| RebaseError::Source(format!("malformed listing: {}", e)))?;
        Self::from_document(document)
    }
}

impl DisassemblySource for ListingSource {
    fn functions(&self) -> Result<Vec<FunctionId>, RebaseError> {
        Ok(self.functions.iter().map(|f| f.entry).collect())
    }

    fn instructions(&self, function: FunctionId) -> Result<Vec<Instruction>, RebaseError> {
        self.by_entry
            .get(&function)
            .map(|&i| self.functions[i].instructions.clone())
            .ok_or_else(|| RebaseError::Source(format!("unknown function 0x{:x}", function)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LISTING: &str = r#"{
        "functions": [
            {
                "entry": "0x401000",
                "instructions": [
                    {"address": "0x401000", "text": "push    ebp"},
                    {"address": 4198401, "text": "retn"}
                ]
            },
            {"entry": 8192}
        ]
    }"#;

    #[test]
    fn test_parse_wrapped_listing() {
        let source: ListingSource = LISTING.parse().unwrap();

        assert_eq!(source.functions().unwrap(), vec![0x401000, 0x2000]);
        let insns = source.instructions(0x401000).unwrap();
        assert_eq!(insns.len(), 2);
        assert_eq!(insns[1], Instruction::new(0x401001, "retn"));
        // Missing instruction list is an empty function
        assert!(source.instructions(0x2000).unwrap().is_empty());
    }

    #[test]
    fn test_parse_bare_array() {
        let source: ListingSource =
            r#"[{"entry": "16", "instructions": [{"address": "0X10", "text": "ret"}]}]"#
                .parse()
                .unwrap();

        assert_eq!(source.functions().unwrap(), vec![16]);
        assert_eq!(source.instructions(16).unwrap()[0].address, 0x10);
    }

    #[test]
    fn test_invalid_address_rejected() {
        let result: Result<ListingSource, _> =
            r#"[{"entry": "0xZZ", "instructions": []}]"#.parse();
        assert!(matches!(result, Err(RebaseError::Source(_))));
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let result = ListingSource::new(vec![
            FunctionListing::new(0x10, vec![]),
            FunctionListing::new(0x10, vec![]),
        ]);
        assert!(matches!(result, Err(RebaseError::Source(_))));
    }

    #[test]
    fn test_unknown_function() {
        let source = ListingSource::new(vec![]).unwrap();
        assert!(matches!(source.instructions(0x10), Err(RebaseError::Source(_))));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LISTING.as_bytes()).unwrap();

        let source = ListingSource::from_path(file.path()).unwrap();
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ListingSource::from_path("/nonexistent/listing.json");
        assert!(matches!(result, Err(RebaseError::IoError(_))));
    }
}
