//! Plan command implementation.

use docweave_engine::{plan, SyncError, SyncOptions};
use docweave_model::{BlockId, ConvertedDocument};
use serde::Serialize;
use std::path::Path;

/// Batch plan for a conversion output.
#[derive(Debug, Serialize)]
pub struct PlanSummary {
    /// Container the batches are written under.
    pub container: String,
    /// Total blocks.
    pub total_blocks: usize,
    /// Blocks re-parented during validation.
    pub repaired_blocks: usize,
    /// Per-batch details.
    pub batches: Vec<BatchSummary>,
}

/// One planned batch.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    /// Batch index.
    pub index: usize,
    /// Blocks in the batch.
    pub blocks: usize,
    /// Top-level blocks in the batch.
    pub top_level: usize,
    /// Blocks whose missing parent was set to the container.
    pub normalized_parents: usize,
    /// Tables with read-only metadata removed.
    pub stripped_tables: usize,
    /// Blocks re-parented to the container.
    pub repaired: Vec<String>,
}

/// Partitions and validates `converted` without writing anything.
pub fn summarize(
    converted: ConvertedDocument,
    container: &str,
    batch_size: usize,
) -> Result<PlanSummary, SyncError> {
    let options = SyncOptions::new().with_max_batch_size(batch_size);
    let plan = plan(converted, &BlockId::new(container), &options)?;

    let batches = plan
        .batches
        .iter()
        .zip(&plan.reports)
        .map(|(batch, report)| BatchSummary {
            index: batch.index,
            blocks: batch.len(),
            top_level: batch.top_level_ids.len(),
            normalized_parents: report.normalized_parents,
            stripped_tables: report.stripped_tables,
            repaired: report.repaired.iter().map(|id| id.to_string()).collect(),
        })
        .collect();

    Ok(PlanSummary {
        container: container.to_string(),
        total_blocks: plan.total_blocks(),
        repaired_blocks: plan.repaired_blocks(),
        batches,
    })
}

/// Runs the plan command.
pub fn run(
    path: &Path,
    container: &str,
    batch_size: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    let converted = ConvertedDocument::from_json(&json)?;
    let summary = summarize(converted, container, batch_size)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            print_text_output(&summary);
        }
    }

    Ok(())
}

fn print_text_output(summary: &PlanSummary) {
    println!("Container: {}", summary.container);
    println!("Blocks:    {}", summary.total_blocks);
    println!("Batches:   {}", summary.batches.len());
    if summary.repaired_blocks > 0 {
        println!("Repaired:  {}", summary.repaired_blocks);
    }
    println!();
    for batch in &summary.batches {
        println!(
            "  #{:<3} {:>4} blocks, {:>4} top-level, {} parents filled, {} tables stripped",
            batch.index,
            batch.blocks,
            batch.top_level,
            batch.normalized_parents,
            batch.stripped_tables
        );
        for id in &batch.repaired {
            println!("        re-parented {id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docweave_engine::StructuralError;
    use docweave_testkit::{flat_document, table_document, wide_tree_document, TempFiles};

    #[test]
    fn flat_document_batches() {
        let summary = summarize(flat_document(7), "doc", 3).unwrap();
        let sizes: Vec<usize> = summary.batches.iter().map(|b| b.blocks).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(summary.total_blocks, 7);
        assert_eq!(summary.batches[0].normalized_parents, 3);
        assert_eq!(summary.repaired_blocks, 0);
    }

    #[test]
    fn table_metadata_reported() {
        let summary = summarize(table_document(), "doc", 500).unwrap();
        assert_eq!(summary.batches.len(), 1);
        assert!(summary.batches[0].stripped_tables > 0);
    }

    #[test]
    fn unanchored_batch_is_an_error() {
        let err = summarize(wide_tree_document(5), "doc", 3).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Structural(StructuralError::NoTopLevelAnchor { batch: 1, .. })
        ));
    }

    #[test]
    fn run_reads_saved_conversion() {
        let files = TempFiles::new();
        let json = flat_document(4).to_json_pretty().unwrap();
        let path = files.write("converted.json", &json);

        run(&path, "doc", 2, "json").unwrap();
        run(&path, "doc", 2, "text").unwrap();
    }

    #[test]
    fn run_rejects_malformed_json() {
        let files = TempFiles::new();
        let path = files.write("converted.json", "{\"blocks\": 3}");
        assert!(run(&path, "doc", 2, "text").is_err());
    }
}
