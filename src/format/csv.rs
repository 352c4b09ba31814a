//! CSV output formatter

use crate::{NormalizedDataset, RebaseError};
use super::DatasetFormatter;

impl DatasetFormatter for super::CsvFormatter {
    fn format(&self, dataset: &NormalizedDataset) -> Result<String, RebaseError> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        writer.write_record(["function", "position", "text"])
            .map_err(csv_error)?;

        for (i, func) in dataset.functions().iter().enumerate() {
            let function = (i + 1).to_string();
            for (position, text) in func.iter() {
                let position = position.to_string();
                writer.write_record([function.as_str(), position.as_str(), text])
                    .map_err(csv_error)?;
            }
        }

        let bytes = writer.into_inner()
            .map_err(|e| RebaseError::Serialization(format!("CSV flush error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| RebaseError::Serialization(format!("CSV encoding error: {}", e)))
    }
}

fn csv_error(e: csv::Error) -> RebaseError {
    RebaseError::Serialization(format!("CSV serialization error: {}", e))
}
