use anyhow::Context;
use inkcycle_core::config::WarnLevel;
use inkcycle_core::display::{DisplayDevice, FileDevice, MockDevice};
use inkcycle_core::paths;
use inkcycle_server::AppState;
use std::path::Path;

pub fn run(root: &Path, port: u16, dry_run: bool) -> anyhow::Result<()> {
    let device: Box<dyn DisplayDevice> = if dry_run {
        Box::new(MockDevice::new())
    } else {
        Box::new(FileDevice::new(paths::current_image_path(root)))
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (state, _worker) = AppState::boot(root, device)
            .with_context(|| format!("failed to start from {}", root.display()))?;

        let config = state.config();
        for w in config.validate() {
            match w.level {
                WarnLevel::Error => tracing::error!("config: {}", w.message),
                WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            }
        }
        tracing::info!(
            name = %config.name,
            playlists = config.playlist_config.playlists.len(),
            timezone = %config.timezone,
            dry_run,
            "frame loaded"
        );

        inkcycle_server::serve(state, port).await
    })
}
