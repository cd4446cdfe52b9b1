use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use msuite_ingest::IngestConfig;
use msuite_store::BackendConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Hard ceiling on a listing page unless configured otherwise.
pub const DEFAULT_MAX_LIMIT: usize = 1000;

/// Service configuration, loaded once at startup from a TOML file.
///
/// ```toml
/// bind_addr = "0.0.0.0:8911"
/// max_limit = 500
///
/// [ingest]
/// staging_dir = "/srv/msuite/staging"
///
/// [backend]
/// kind = "filesystem"
/// content_root = "/srv/msuite/lts"
/// metadata_root = "/srv/msuite/premis"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// Largest page `GET /` will return; bigger `limit`s are clamped.
    pub max_limit: usize,
    /// Default log filter when no `-v` flag is given.
    pub log_level: String,
    pub ingest: IngestConfig,
    pub backend: BackendConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8911)),
            max_limit: DEFAULT_MAX_LIMIT,
            log_level: "info".into(),
            ingest: IngestConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_config() {
        let c = ServiceConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8911".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_limit, 1000);
        assert_eq!(c.backend.kind_name(), "filesystem");
    }

    #[test]
    fn empty_file_is_the_default() {
        assert_eq!(ServiceConfig::from_toml("").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn full_config() {
        let c = ServiceConfig::from_toml(
            r#"
            bind_addr = "0.0.0.0:9000"
            max_limit = 50
            log_level = "debug"

            [ingest]
            chunk_size = 4096

            [backend]
            kind = "mixed"
            content_root = "/srv/lts"
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.max_limit, 50);
        assert_eq!(c.ingest.chunk_size, 4096);
        assert_eq!(
            c.backend,
            BackendConfig::Mixed {
                content_root: PathBuf::from("/srv/lts"),
                document_root: None,
            }
        );
    }

    #[test]
    fn unknown_backend_kind_fails_at_load() {
        let err = ServiceConfig::from_toml("[backend]\nkind = \"swift\"\n").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msuite.toml");
        std::fs::write(&path, "max_limit = 7\n").unwrap();
        assert_eq!(ServiceConfig::load(&path).unwrap().max_limit, 7);
        assert!(ServiceConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
