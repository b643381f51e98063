use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use inkcycle_core::config::Config;
use inkcycle_core::playlist::{Playlist, PluginInstance};
use inkcycle_core::types::{Settings, TimeOfDay};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum PlaylistSubcommand {
    /// List playlists with their windows and instances
    List,

    /// Show the playlist active now, or at a given local time
    Active {
        /// Local time of day, HH:MM
        #[arg(long)]
        at: Option<String>,
    },

    /// Create an empty playlist
    Add {
        name: String,
        /// Window start, HH:MM
        #[arg(long)]
        start: String,
        /// Window end, HH:MM (24:00 allowed; before start wraps past midnight)
        #[arg(long)]
        end: String,
    },

    /// Change a playlist's time window
    Window {
        name: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },

    /// Delete a playlist
    Delete { name: String },

    /// Add a plugin instance to a playlist
    AddInstance {
        playlist: String,
        /// Registered plugin id
        #[arg(long)]
        plugin: String,
        /// Instance name, unique within the playlist
        #[arg(long)]
        name: String,
        /// Minimum seconds between two draws
        #[arg(long, default_value_t = 3600)]
        interval: u64,
        /// Plugin setting; the value is parsed as JSON when possible
        #[arg(long = "setting", value_name = "KEY=VALUE")]
        settings: Vec<String>,
    },

    /// Remove a plugin instance from a playlist
    RemoveInstance { playlist: String, name: String },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: PlaylistSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PlaylistSubcommand::List => list(root, json),
        PlaylistSubcommand::Active { at } => active(root, at.as_deref(), json),
        PlaylistSubcommand::Add { name, start, end } => edit(root, |c| {
            c.playlist_config
                .add_playlist(&name, start.parse()?, end.parse()?)?;
            println!("Added playlist '{name}' ({start}-{end})");
            Ok(())
        }),
        PlaylistSubcommand::Window { name, start, end } => edit(root, |c| {
            c.playlist_config
                .update_playlist_window(&name, start.parse()?, end.parse()?)?;
            println!("Playlist '{name}' now runs {start}-{end}");
            Ok(())
        }),
        PlaylistSubcommand::Delete { name } => edit(root, |c| {
            c.playlist_config.delete_playlist(&name)?;
            println!("Deleted playlist '{name}'");
            Ok(())
        }),
        PlaylistSubcommand::AddInstance {
            playlist,
            plugin,
            name,
            interval,
            settings,
        } => edit(root, |c| {
            if c.plugin(&plugin).is_none() {
                anyhow::bail!("plugin '{plugin}' is not in the plugin registry");
            }
            let instance = PluginInstance::new(
                &plugin,
                &name,
                parse_settings(&settings)?,
                Duration::from_secs(interval),
            );
            c.playlist_config.add_instance(&playlist, instance)?;
            println!("Added '{name}' ({plugin}) to '{playlist}'");
            Ok(())
        }),
        PlaylistSubcommand::RemoveInstance { playlist, name } => edit(root, |c| {
            c.playlist_config.remove_instance(&playlist, &name)?;
            println!("Removed '{name}' from '{playlist}'");
            Ok(())
        }),
    }
}

fn load(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load config")
}

/// Load, mutate, save.
fn edit(root: &Path, f: impl FnOnce(&mut Config) -> anyhow::Result<()>) -> anyhow::Result<()> {
    let mut config = load(root)?;
    f(&mut config)?;
    config.save(root).context("failed to write device.yaml")?;
    Ok(())
}

fn parse_settings(pairs: &[String]) -> anyhow::Result<Settings> {
    let mut settings = Settings::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("invalid setting '{pair}': expected KEY=VALUE"))?;
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        settings.insert(key.to_string(), value);
    }
    Ok(settings)
}

// ---------------------------------------------------------------------------
// list / active
// ---------------------------------------------------------------------------

fn window(p: &Playlist) -> String {
    format!("{}-{}", p.start_time, p.end_time)
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load(root)?;
    let playlists = &config.playlist_config.playlists;

    if json {
        return print_json(playlists);
    }
    if playlists.is_empty() {
        println!("No playlists.");
        return Ok(());
    }

    let rows = playlists
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                window(p),
                p.plugins
                    .iter()
                    .map(|i| format!("{} ({})", i.name, i.plugin_id))
                    .collect::<Vec<_>>()
                    .join(", "),
                p.peek_next_instance()
                    .map(|i| i.name.clone())
                    .unwrap_or_else(|| "-".into()),
            ]
        })
        .collect();
    print_table(&["NAME", "WINDOW", "INSTANCES", "NEXT"], rows);
    Ok(())
}

fn active(root: &Path, at: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = load(root)?;
    let time = match at {
        Some(raw) => raw.parse::<TimeOfDay>()?,
        None => TimeOfDay::from_time(config.local_time(Utc::now()).time()),
    };
    let active = config.playlist_config.determine_active_playlist(time);

    if json {
        return print_json(&serde_json::json!({
            "at": time,
            "active": active.map(|p| &p.name),
            "next_instance": active.and_then(|p| p.peek_next_instance()).map(|i| &i.name),
        }));
    }

    match active {
        Some(p) => {
            println!("{} ({}) at {time}", p.name, window(p));
            match p.peek_next_instance() {
                Some(i) => println!("  next: {} ({})", i.name, i.plugin_id),
                None => println!("  no instances; the scheduler idles"),
            }
        }
        None => println!("No active playlist at {time}; the scheduler idles"),
    }
    Ok(())
}
