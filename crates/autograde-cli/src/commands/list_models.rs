//! The `autograde list-models` command.

use std::path::PathBuf;

use anyhow::Result;

use autograde_providers::create_provider;

pub fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = autograde_providers::config::load_config_from(config_path.as_deref())?;

    let mut names: Vec<&String> = config.providers.keys().collect();
    names.sort();

    let mut found_any = false;

    for name in names {
        if provider_filter.as_ref().is_some_and(|filter| filter != name) {
            continue;
        }

        let provider = create_provider(&config.providers[name])?;
        let models = provider.available_models();

        if !models.is_empty() {
            found_any = true;
            println!("Provider: {name}");
            for model in &models {
                let marker = if *name == config.default_provider && model.id == config.default_model {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "  {} — {} ({}K context){marker}",
                    model.id,
                    model.name,
                    model.max_context / 1000,
                );
            }
            println!();
        }
    }

    if !found_any {
        println!("No providers configured. Run `autograde init` to create a config file.");
    }

    Ok(())
}
