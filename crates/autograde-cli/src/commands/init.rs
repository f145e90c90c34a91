//! The `autograde init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("autograde.toml").exists() {
        println!("autograde.toml already exists, skipping.");
    } else {
        std::fs::write("autograde.toml", SAMPLE_CONFIG)?;
        println!("Created autograde.toml");
    }

    println!("\nNext steps:");
    println!("  1. Set GEMINI_API_KEY (or edit autograde.toml for another provider)");
    println!("  2. Run: autograde extract answers.txt");
    println!("  3. Run: autograde grade answers.txt");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# autograde configuration

default_provider = "gemini"
default_model = "gemini-2.5-flash"
temperature = 0.0
max_tokens = 8192
max_retries = 3
retry_delay_ms = 1000
parallelism = 4
output_dir = "./autograde-results"

[providers.gemini]
type = "gemini"
api_key = "${GEMINI_API_KEY}"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

# Minimum percentage for each letter, highest first. The lowest must be 0.
[thresholds]
A = 90.0
B = 80.0
C = 70.0
D = 60.0
F = 0.0
"#;
