use inkcycle_core::paths::INKCYCLE_DIR;
use std::path::{Path, PathBuf};

/// Resolve the frame's root directory.
///
/// Priority:
/// 1. `--root` flag / `INKCYCLE_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.inkcycle/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd).unwrap_or(cwd)
}

fn find_upward(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(INKCYCLE_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_inkcycle_dir_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(INKCYCLE_DIR)).unwrap();
        let nested = dir.path().join("photos/2024");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_upward(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn no_marker_inside_tree_finds_nothing() {
        let dir = TempDir::new().unwrap();
        let found = find_upward(dir.path());
        assert!(found.map_or(true, |p| !p.starts_with(dir.path())));
    }
}
