use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DB_FILENAME: &str = "stylepins.db.json";
const CONTENT_ROOT_DIRNAME: &str = "public";

/// Filesystem layout of one catalog instance.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub workdir: PathBuf,
    pub content_root: PathBuf,
    pub db_path: PathBuf,
}

impl AppConfig {
    pub fn new(workdir: &str) -> anyhow::Result<Self> {
        let workdir = Self::get_or_create_workdir(workdir)?;
        let content_root = Self::get_or_create_content_root(&workdir)?;
        let db_path = Self::get_or_create_db_path(&workdir)?;
        Ok(Self { workdir, content_root, db_path })
    }

    fn get_or_create_workdir(workdir: &str) -> anyhow::Result<PathBuf> {
        let workdir = Path::new(workdir);
        if !workdir.exists() {
            std::fs::create_dir_all(workdir)?;
        }
        if !workdir.is_dir() {
            anyhow::bail!("workdir is not a directory");
        }
        let workdir = workdir.canonicalize()?;
        info!("workdir: {}", workdir.display());
        Ok(workdir)
    }

    fn get_or_create_content_root(workdir: &Path) -> anyhow::Result<PathBuf> {
        let content_root = workdir.join(CONTENT_ROOT_DIRNAME);
        if !content_root.exists() {
            std::fs::create_dir_all(&content_root)?;
        }
        if !content_root.is_dir() {
            anyhow::bail!("content_root is not a directory");
        }
        info!("content_root: {}", content_root.display());
        Ok(content_root)
    }

    fn get_or_create_db_path(workdir: &Path) -> anyhow::Result<PathBuf> {
        let db_path = workdir.join(DB_FILENAME);
        if !db_path.exists() {
            std::fs::write(&db_path, "")?;
        }
        if !db_path.is_file() {
            anyhow::bail!("db_path is not a file");
        }
        info!("db_path: {}", db_path.display());
        Ok(db_path)
    }
}

#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub admin_password: String,
    pub session_ttl: Duration,
    pub max_upload_bytes: usize,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("admin_password", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("catalog");
        let config = AppConfig::new(workdir.to_str().unwrap()).unwrap();
        assert!(config.content_root.is_dir());
        assert!(config.db_path.is_file());
        assert!(config.content_root.starts_with(&config.workdir));

        // a second run reuses the existing layout
        std::fs::write(&config.db_path, "line\n").unwrap();
        let again = AppConfig::new(workdir.to_str().unwrap()).unwrap();
        assert_eq!(std::fs::read_to_string(again.db_path).unwrap(), "line\n");
    }

    #[test]
    fn app_config_rejects_file_as_workdir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(AppConfig::new(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn server_config_debug_hides_password() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:3000".to_string(),
            admin_password: "hunter2".to_string(),
            session_ttl: Duration::from_secs(60),
            max_upload_bytes: 1024,
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("127.0.0.1:3000"));
    }
}
