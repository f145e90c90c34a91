//! The `autograde score` command.

use std::path::PathBuf;

use anyhow::Result;

use autograde_core::grade::Grader;
use autograde_core::report::load_analysis;
use autograde_providers::config::load_config_from;

pub fn execute(analysis_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let analysis = load_analysis(&analysis_path)?;

    let grade = Grader::new(config.thresholds).grade(&analysis);
    println!("{}", serde_json::to_string_pretty(&grade)?);

    Ok(())
}
