//! Output formats and dataset sinks

mod json;
mod csv;

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use clap::ValueEnum;

use crate::{DatasetSink, NormalizedDataset, RebaseError};

/// Supported output formats for normalized datasets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON document: an array of position maps (default)
    #[default]
    Json,
    /// JSON Lines format (one function object per line)
    #[value(name = "jsonl")]
    JsonLines,
    /// CSV rows of function, position and text
    Csv,
    /// Plain text listing
    Text,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonLines => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "jsonl" | "jsonlines" => Ok(OutputFormat::JsonLines),
            "csv" => Ok(OutputFormat::Csv),
            "text" | "txt" => Ok(OutputFormat::Text),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl OutputFormat {
    /// Get all available output formats
    pub fn available_formats() -> &'static [Self] {
        &[
            OutputFormat::Json,
            OutputFormat::JsonLines,
            OutputFormat::Csv,
            OutputFormat::Text,
        ]
    }

    /// File extension conventionally used for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::JsonLines => "jsonl",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }

    /// Get a formatter for this output format
    pub fn get_formatter(&self) -> Box<dyn DatasetFormatter> {
        match self {
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::JsonLines => Box::new(JsonLinesFormatter),
            OutputFormat::Csv => Box::new(CsvFormatter),
            OutputFormat::Text => Box::new(TextFormatter),
        }
    }
}

/// Formatter trait for dataset output
pub trait DatasetFormatter {
    /// Render a whole dataset
    fn format(&self, dataset: &NormalizedDataset) -> Result<String, RebaseError>;
}

/// Format a dataset as one JSON document
pub struct JsonFormatter;

/// Format a dataset as JSON Lines
pub struct JsonLinesFormatter;

/// Format a dataset as CSV
pub struct CsvFormatter;

/// Format a dataset as plain text
pub struct TextFormatter;

impl DatasetFormatter for TextFormatter {
    fn format(&self, dataset: &NormalizedDataset) -> Result<String, RebaseError> {
        let mut output = String::new();

        for (i, func) in dataset.functions().iter().enumerate() {
            output.push_str(&format!("Function {} ({} instructions):\n", i + 1, func.len()));
            for (position, text) in func.iter() {
                output.push_str(&format!("  {:>5}: {}\n", position, text));
            }
            output.push('\n');
        }

        Ok(output)
    }
}

/// Sink writing the whole dataset to a file in one write.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    format: OutputFormat,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(path: P, format: OutputFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
        }
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSink for FileSink {
    fn persist(&mut self, dataset: &NormalizedDataset) -> Result<(), RebaseError> {
        let output = self.format.get_formatter().format(dataset)?;
        fs::write(&self.path, output)?;
        log::info!(
            "Wrote {} functions as {} to {}",
            dataset.len(),
            self.format,
            self.path.display()
        );
        Ok(())
    }
}

/// Sink writing the formatted dataset to any writer, e.g. stdout.
pub struct WriterSink<W: Write> {
    writer: W,
    format: OutputFormat,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DatasetSink for WriterSink<W> {
    fn persist(&mut self, dataset: &NormalizedDataset) -> Result<(), RebaseError> {
        let output = self.format.get_formatter().format(dataset)?;
        self.writer.write_all(output.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}
