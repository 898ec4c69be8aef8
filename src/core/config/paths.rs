use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub index_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let user_data_dir = discover_user_data_dir(&project_root);
        Self::from_dirs(project_root, user_data_dir)
    }

    /// Lays out every path under an explicit data directory.
    pub fn from_dirs(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        let db_path = user_data_dir.join("helpdesk.db");
        let index_path = user_data_dir.join("knowledge.db");
        let secrets_path = user_data_dir.join("secrets.yaml");

        for dir in [&user_data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            db_path,
            index_path,
            secrets_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("HELPDESK_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

/// `HELPDESK_DATA_DIR` when set, otherwise `<project_root>/data`.
fn discover_user_data_dir(project_root: &Path) -> PathBuf {
    resolve_user_data_dir(project_root, env::var("HELPDESK_DATA_DIR").ok())
}

fn resolve_user_data_dir(project_root: &Path, configured: Option<String>) -> PathBuf {
    match configured.filter(|dir| !dir.trim().is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => project_root.join("data"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_dirs_places_stores_under_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_dirs(tmp.path().to_path_buf(), tmp.path().join("data"));

        assert_eq!(paths.db_path, tmp.path().join("data/helpdesk.db"));
        assert_eq!(paths.index_path, tmp.path().join("data/knowledge.db"));
        assert!(paths.log_dir.exists());
    }

    #[test]
    fn data_dir_defaults_to_project_data_folder() {
        let root = Path::new("/srv/helpdesk");

        assert_eq!(resolve_user_data_dir(root, None), root.join("data"));
        assert_eq!(
            resolve_user_data_dir(root, Some("  ".to_string())),
            root.join("data")
        );
        assert_eq!(
            resolve_user_data_dir(root, Some("/var/lib/helpdesk".to_string())),
            PathBuf::from("/var/lib/helpdesk")
        );
    }
}
