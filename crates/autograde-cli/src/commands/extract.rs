//! The `autograde extract` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use autograde_core::error::GradeError;
use autograde_core::extract::Extractor;

use super::grade::read_document;
use crate::ExtractFormat;

pub fn execute(file: PathBuf, format: ExtractFormat) -> Result<()> {
    let document = read_document(&file)?;
    let extraction = Extractor::default().extract(&document.text);

    let Some(strategy) = extraction.strategy else {
        return Err(GradeError::NoPairsFound.into());
    };

    match format {
        ExtractFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&extraction.records)?);
        }
        ExtractFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["#", "Question", "Answer"]);
            for record in &extraction.records {
                table.add_row(vec![
                    Cell::new(&record.question_num),
                    Cell::new(&record.question),
                    Cell::new(&record.answer),
                ]);
            }
            println!("{table}");
            println!(
                "{} pairs found in {} ({strategy})",
                extraction.records.len(),
                document.source
            );
        }
    }

    Ok(())
}
