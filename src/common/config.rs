//! Configuration for minibank components

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Partition layout as written in the cluster file.
///
/// ```json
/// {
///   "partitions": 2,
///   "partitions_map": {
///     "0": [{"id": 1, "host": "127.0.0.1", "port": 7001}, {"id": 2, "host": "127.0.0.1", "port": 7002}],
///     "1": [{"id": 3, "host": "127.0.0.1", "port": 7003}]
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryFile {
    /// Number of partitions; routing is `account mod partitions`
    pub partitions: usize,

    /// Partition index (as text) → replicas in failover order
    #[serde(default)]
    pub partitions_map: BTreeMap<String, Vec<EndpointFile>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointFile {
    pub id: u32,
    pub host: String,
    pub port: u16,
}

impl DirectoryFile {
    /// Load from JSON or TOML; the format follows the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;
        let file: DirectoryFile = settings.try_deserialize()?;
        Ok(file)
    }

    /// Replica lists indexed by partition. Partitions missing from the file
    /// come back as empty lists.
    pub fn partition_lists(&self) -> Result<Vec<Vec<EndpointFile>>> {
        if self.partitions == 0 {
            return Err(Error::InvalidConfig("partitions must be at least 1".into()));
        }
        let mut lists = vec![Vec::new(); self.partitions];
        for (key, endpoints) in &self.partitions_map {
            let index: usize = key.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("partition key {:?} is not an index", key))
            })?;
            if index >= self.partitions {
                return Err(Error::InvalidConfig(format!(
                    "partition {} out of range (partitions = {})",
                    index, self.partitions
                )));
            }
            for ep in endpoints {
                if ep.host.trim().is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "replica {} of partition {} has an empty host",
                        ep.id, index
                    )));
                }
            }
            lists[index] = endpoints.clone();
        }
        Ok(lists)
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Client-facing bind address
    #[serde(default = "default_coord_bind")]
    pub bind_addr: SocketAddr,

    /// Partition directory file
    #[serde(default = "default_directory_path")]
    pub directory_path: PathBuf,

    /// Audit/loan store directory
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,

    /// Connect timeout for coordinator → worker calls
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Read timeout for coordinator → worker calls
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Wait for COMMIT acknowledgements before answering the client
    #[serde(default)]
    pub await_commit_acks: bool,

    /// Rows returned by a history query
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_coord_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 6000))
}
fn default_directory_path() -> PathBuf {
    PathBuf::from("config/cluster.json")
}
fn default_audit_dir() -> PathBuf {
    PathBuf::from("./audit-data")
}
fn default_connect_timeout() -> u64 {
    1000
}
fn default_read_timeout() -> u64 {
    5000
}
fn default_history_limit() -> usize {
    20
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_coord_bind(),
            directory_path: default_directory_path(),
            audit_dir: default_audit_dir(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
            await_commit_acks: false,
            history_limit: default_history_limit(),
        }
    }
}

impl CoordinatorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Bind address for coordinator traffic
    #[serde(default = "default_worker_bind")]
    pub bind_addr: SocketAddr,

    /// Balance snapshot file, rewritten on every commit
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Audit/loan store directory
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,
}

fn default_worker_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7001))
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./worker-data/accounts.snap")
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_worker_bind(),
            snapshot_path: default_snapshot_path(),
            audit_dir: default_audit_dir(),
        }
    }
}

/// Optional settings file layered under `MINIBANK_*` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub coordinator: Option<CoordinatorConfig>,

    #[serde(default)]
    pub worker: Option<WorkerConfig>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load `path` if given (must exist), then apply environment overrides
    /// such as `MINIBANK_COORDINATOR__READ_TIMEOUT_MS=2000`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("MINIBANK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_json_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "cluster.json",
            r#"{"partitions": 3, "partitions_map": {
                "0": [{"id": 1, "host": "127.0.0.1", "port": 7001},
                      {"id": 2, "host": "127.0.0.1", "port": 7002}],
                "2": [{"id": 3, "host": "10.0.0.3", "port": 7003}]
            }}"#,
        );
        let file = DirectoryFile::load(&path).unwrap();
        let lists = file.partition_lists().unwrap();
        assert_eq!(lists.len(), 3);
        assert_eq!(lists[0].len(), 2);
        assert_eq!(lists[0][1].port, 7002);
        assert!(lists[1].is_empty());
        assert_eq!(lists[2][0].host, "10.0.0.3");
    }

    #[test]
    fn test_load_toml_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "cluster.toml",
            r#"
partitions = 1

[[partitions_map.0]]
id = 1
host = "127.0.0.1"
port = 7001
"#,
        );
        let lists = DirectoryFile::load(&path).unwrap().partition_lists().unwrap();
        assert_eq!(lists[0][0].id, 1);
    }

    #[test]
    fn test_missing_fields_abort() {
        let dir = tempfile::TempDir::new().unwrap();
        let no_count = write_file(dir.path(), "a.json", r#"{"partitions_map": {}}"#);
        assert!(DirectoryFile::load(&no_count).is_err());

        let no_port = write_file(
            dir.path(),
            "b.json",
            r#"{"partitions": 1, "partitions_map": {"0": [{"id": 1, "host": "h"}]}}"#,
        );
        assert!(DirectoryFile::load(&no_port).is_err());
    }

    #[test]
    fn test_bad_partition_keys() {
        let file = DirectoryFile {
            partitions: 2,
            partitions_map: BTreeMap::from([(
                "5".to_string(),
                vec![EndpointFile {
                    id: 1,
                    host: "h".into(),
                    port: 1,
                }],
            )]),
        };
        assert!(matches!(file.partition_lists(), Err(Error::InvalidConfig(_))));

        let zero = DirectoryFile {
            partitions: 0,
            partitions_map: BTreeMap::new(),
        };
        assert!(zero.partition_lists().is_err());
    }

    #[test]
    fn test_defaults() {
        let coord = CoordinatorConfig::default();
        assert_eq!(coord.connect_timeout(), Duration::from_secs(1));
        assert_eq!(coord.read_timeout(), Duration::from_secs(5));
        assert!(!coord.await_commit_acks);
        assert_eq!(coord.history_limit, 20);
    }
}
