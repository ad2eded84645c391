use std::path::Path;

use anyhow::Result;
use clap::Args;
use contentci_core::pruner::DetectionPruner;

use super::load_config;

#[derive(Args)]
pub struct ClassifyArgs {
    /// Detection paths relative to the repository root
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn run(args: ClassifyArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let pruner = DetectionPruner::new(config.repository_root());
    let classification = pruner.classify_by_type(&args.paths, &config.criteria());

    if args.format.as_str() == "json" {
        let output = serde_json::json!({
            "to_test": classification.to_test,
            "not_to_test": classification.not_to_test,
            "errored": classification.errored,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for (label, paths) in [
            ("to test", &classification.to_test),
            ("not to test", &classification.not_to_test),
            ("errored", &classification.errored),
        ] {
            println!("{} ({}):", label, paths.len());
            for path in paths {
                println!("  {}", path);
            }
        }
    }

    Ok(())
}
