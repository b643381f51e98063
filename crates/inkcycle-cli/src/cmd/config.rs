use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use inkcycle_core::config::{Config, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the config for common mistakes
    Validate,

    /// Print the loaded config
    Show,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(root, json),
        ConfigSubcommand::Show => show(root, json),
    }
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        return print_json(&config);
    }
    println!("name:        {}", config.name);
    println!(
        "resolution:  {}x{} ({}{})",
        config.resolution.width,
        config.resolution.height,
        config.orientation,
        if config.inverted_image { ", inverted" } else { "" }
    );
    println!("timezone:    {}", config.timezone);
    println!("plugins:     {}", config.plugins.len());
    println!("playlists:   {}", config.playlist_config.playlists.len());
    match &config.refresh_info {
        Some(r) => println!(
            "last write:  {} {} ({})",
            r.refresh_time.to_rfc3339(),
            r.plugin_id,
            r.refresh_type
        ),
        None => println!("last write:  never"),
    }
    Ok(())
}
