use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const INKCYCLE_DIR: &str = ".inkcycle";
pub const CONFIG_FILE: &str = ".inkcycle/device.yaml";
pub const CURRENT_IMAGE_FILE: &str = ".inkcycle/current_image.png";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn inkcycle_dir(root: &Path) -> PathBuf {
    root.join(INKCYCLE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn current_image_path(root: &Path) -> PathBuf {
    root.join(CURRENT_IMAGE_FILE)
}
