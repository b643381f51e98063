use anyhow::Context;
use inkcycle_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let frame_name = name.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "inkcycle".to_string())
    });

    println!("Initializing inkcycle in: {}", root.display());

    let dir = paths::inkcycle_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::starter(&frame_name)
            .save(root)
            .context("failed to write device.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    println!("\nNext: inkcycle serve");
    Ok(())
}
