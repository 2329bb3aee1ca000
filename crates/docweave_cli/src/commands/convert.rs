//! Convert command implementation.

use docweave_model::ConvertedDocument;
use docweave_store::MarkdownConverter;
use std::path::Path;

/// Converts a markdown file with the reference converter.
pub fn convert_file(path: &Path) -> Result<ConvertedDocument, Box<dyn std::error::Error>> {
    let markdown = std::fs::read_to_string(path)?;
    Ok(MarkdownConverter::new().convert(&markdown)?)
}

/// Runs the convert command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let converted = convert_file(path)?;
    println!("{}", converted.to_json_pretty()?);
    Ok(())
}
