//! `drover config init|validate|show`.

use crate::cli::ConfigCommands;
use crate::cli::Output;
use crate::config::DroverConfig;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub async fn execute(
    cmd: ConfigCommands,
    config_path: Option<&Path>,
    output: &Output,
) -> Result<()> {
    match cmd {
        ConfigCommands::Init => init(output).await,
        ConfigCommands::Validate => validate(config_path, output).await,
        ConfigCommands::Show => show(config_path, output).await,
    }
}

async fn init(output: &Output) -> Result<()> {
    output.header("🔧 Initializing Configuration");

    let config_path = Path::new("drover.yml");
    if config_path.exists() {
        anyhow::bail!("drover.yml already exists in this directory");
    }

    DroverConfig::default().save_to_file(config_path)?;

    output.success("Configuration file created with default settings");
    output.table_row("Config file", "drover.yml");
    output.info("Edit drover.yml to change pool sizing, retries, and report paths");

    Ok(())
}

async fn validate(config_path: Option<&Path>, output: &Output) -> Result<()> {
    output.header("✅ Validating Configuration");

    let Some(path) = config_source(config_path) else {
        output.info("No configuration file found, built-in defaults apply");
        return Ok(());
    };

    let loaded =
        DroverConfig::load_from_file(&path).and_then(|config| config.validate().map(|()| config));
    match loaded {
        Ok(config) => {
            output.success("Configuration is valid");
            output.blank_line();
            output.table_row("Config file", &path.display().to_string());
            output.table_row("Threads", &describe_threads(config.pool.threads));
            output.table_row("Max retries", &config.pool.max_retries.to_string());
            output.table_row("Max failures", &config.pool.max_failures.to_string());
            output.table_row("Report dir", &config.report.dir.display().to_string());
        }
        Err(err) => {
            output.error("Configuration file is invalid");
            output.list_item(&format!("{err:#}"));
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn show(config_path: Option<&Path>, output: &Output) -> Result<()> {
    output.header("📄 Current Configuration");

    let config = DroverConfig::load_or_default(config_path)?;
    match config_source(config_path) {
        Some(path) => output.info(&format!("Loaded from {}", path.display())),
        None => output.info("No configuration file found, showing built-in defaults"),
    }
    output.blank_line();
    print!("{}", config.to_yaml()?);

    Ok(())
}

/// The file `load_or_default` would read, if any.
fn config_source(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => DroverConfig::find_config_file(),
    }
}

fn describe_threads(threads: usize) -> String {
    if threads == 0 {
        "one per core".to_string()
    } else {
        threads.to_string()
    }
}
