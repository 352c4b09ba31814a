//! JSON and JSON Lines output formatters

use crate::{NormalizedDataset, RebaseError};
use super::DatasetFormatter;

impl DatasetFormatter for super::JsonFormatter {
    fn format(&self, dataset: &NormalizedDataset) -> Result<String, RebaseError> {
        serde_json::to_string(dataset)
            .map_err(|e| RebaseError::Serialization(format!("JSON serialization error: {}", e)))
    }
}

impl DatasetFormatter for super::JsonLinesFormatter {
    fn format(&self, dataset: &NormalizedDataset) -> Result<String, RebaseError> {
        let mut output = String::new();

        for func in dataset.functions() {
            output.push_str(&serde_json::to_string(func)
                .map_err(|e| RebaseError::Serialization(format!("JSON serialization error: {}", e)))?);
            output.push('\n');
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use crate::format::{DatasetFormatter, JsonFormatter, JsonLinesFormatter};
    use crate::format::tests::create_test_dataset;
    use crate::NormalizedDataset;

    #[test]
    fn test_json_document() {
        let output = JsonFormatter.format(&create_test_dataset()).unwrap();
        assert_eq!(
            output,
            r#"[{"1":"mov eax, 1","2":"jz INSTR2","3":"ret"},{"1":"retn"}]"#
        );
    }

    #[test]
    fn test_json_lines() {
        let output = JsonLinesFormatter.format(&create_test_dataset()).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], r#"{"1":"retn"}"#);
    }

    #[test]
    fn test_empty_dataset() {
        let empty = NormalizedDataset::default();
        assert_eq!(JsonFormatter.format(&empty).unwrap(), "[]");
        assert_eq!(JsonLinesFormatter.format(&empty).unwrap(), "");
    }
}
