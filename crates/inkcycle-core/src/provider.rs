//! Content providers: the code side of the plugin registry.
//!
//! A plugin is renderable only when it is both registered here and listed
//! in the config's `plugins` registry.

use crate::error::{InkError, Result};
use crate::types::Settings;
use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// What a provider knows about the frame it is asked to draw.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Oriented frame size: already swapped for a vertical panel.
    pub width: u32,
    pub height: u32,
    pub timezone: Tz,
    pub now: DateTime<Utc>,
}

pub trait ContentProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Produce an image for `settings`. Blocking; called off the async runtime.
    fn render(&self, settings: &Settings, ctx: &RenderContext) -> anyhow::Result<DynamicImage>;
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ContentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `blank` and `image_file`. Relative image paths resolve
    /// against `base`.
    pub fn with_builtins(base: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BlankProvider));
        registry.register(Arc::new(ImageFileProvider::new(base)));
        registry
    }

    /// Register a provider, replacing any previous one with the same id.
    pub fn register(&mut self, provider: Arc<dyn ContentProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, plugin_id: &str) -> Result<Arc<dyn ContentProvider>> {
        self.providers
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| InkError::PluginNotFound(plugin_id.to_string()))
    }
}

/// Run a provider and attribute any failure to its plugin id.
pub fn render_with(
    provider: &dyn ContentProvider,
    settings: &Settings,
    ctx: &RenderContext,
) -> Result<DynamicImage> {
    provider
        .render(settings, ctx)
        .map_err(|e| InkError::ContentResolution {
            plugin_id: provider.id().to_string(),
            message: format!("{e:#}"),
        })
}

// ---------------------------------------------------------------------------
// Built-in providers
// ---------------------------------------------------------------------------

/// Solid fill. Setting `color` is `#rrggbb`; white when absent.
pub struct BlankProvider;

impl ContentProvider for BlankProvider {
    fn id(&self) -> &str {
        "blank"
    }

    fn render(&self, settings: &Settings, ctx: &RenderContext) -> anyhow::Result<DynamicImage> {
        let color = match settings.get("color") {
            None => [255, 255, 255],
            Some(value) => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| anyhow!("setting 'color' must be a string"))?;
                parse_hex_color(raw)?
            }
        };
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            ctx.width,
            ctx.height,
            Rgb(color),
        )))
    }
}

fn parse_hex_color(raw: &str) -> anyhow::Result<[u8; 3]> {
    let hex = raw.strip_prefix('#').unwrap_or(raw);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("invalid color '{raw}': expected #rrggbb");
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).with_context(|| format!("invalid color '{raw}'"))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Loads an image from disk. Setting `path` is required and must stay
/// inside the base directory.
pub struct ImageFileProvider {
    base: PathBuf,
}

impl ImageFileProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl ContentProvider for ImageFileProvider {
    fn id(&self) -> &str {
        "image_file"
    }

    fn render(&self, settings: &Settings, _ctx: &RenderContext) -> anyhow::Result<DynamicImage> {
        let path = settings
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("missing required setting 'path'"))?;
        let relative = Path::new(path);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || !contained {
            bail!("setting 'path' must be relative to the image directory: '{path}'");
        }
        let full = self.base.join(relative);
        image::open(&full).with_context(|| format!("failed to open {}", full.display()))
    }
}
