//! Port allocation planning for backing servers

use servd_core::{ServdError, ServdResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// In-use flags keyed by backing-server port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAllocationTable {
    ports: BTreeMap<String, bool>,
}

impl PortAllocationTable {
    /// Plan one port per backing-server process, all marked free
    pub fn plan(base_port: u16, num_processes: u32) -> ServdResult<Self> {
        if num_processes == 0 {
            return Err(ServdError::MissingConfiguration(
                "at least one backing server process is required".to_string(),
            ));
        }

        let mut ports = BTreeMap::new();
        for i in 0..num_processes {
            let port = u16::try_from(i)
                .ok()
                .and_then(|i| base_port.checked_add(i))
                .ok_or_else(|| {
                    ServdError::MissingConfiguration(format!(
                        "{} processes from base port {} exceed the port range",
                        num_processes, base_port
                    ))
                })?;
            ports.insert(port.to_string(), false);
        }

        debug!(base_port = base_port, count = ports.len(), "Planned backing ports");

        Ok(Self { ports })
    }

    /// Number of planned ports
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// In-use flag for a port, if planned
    pub fn in_use(&self, port: u16) -> Option<bool> {
        self.ports.get(&port.to_string()).copied()
    }

    /// Planned port keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(String::as_str)
    }

    /// Persist the table, replacing any previous content
    ///
    /// The JSON is written to a sibling temporary file and renamed over
    /// `path`, so readers never observe a partially written table.
    pub fn persist(&self, path: &Path) -> ServdResult<()> {
        let body = serde_json::to_vec(&self.ports)
            .map_err(|e| ServdError::Persistence(format!("Failed to encode port table: {}", e)))?;

        let tmp = temp_path(path);
        std::fs::write(&tmp, &body).map_err(|e| {
            ServdError::Persistence(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            ServdError::Persistence(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        info!(
            path = %path.display(),
            ports = self.ports.len(),
            "Persisted port allocation table"
        );

        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_three_processes() {
        let table = PortAllocationTable::plan(9000, 3).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["9000", "9001", "9002"]);
        assert_eq!(table.in_use(9000), Some(false));
        assert_eq!(table.in_use(9002), Some(false));
        assert_eq!(table.in_use(9003), None);
    }

    #[test]
    fn test_plan_rejects_zero_processes() {
        assert!(matches!(
            PortAllocationTable::plan(9000, 0),
            Err(ServdError::MissingConfiguration(_))
        ));
    }

    #[test]
    fn test_plan_rejects_port_overflow() {
        assert!(PortAllocationTable::plan(65535, 2).is_err());
        assert!(PortAllocationTable::plan(65535, 1).is_ok());
    }

    #[test]
    fn test_persist_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("used_ports.json");
        std::fs::write(&path, r#"{"8000": true, "8001": true, "8002": true, "8003": true}"#)
            .unwrap();

        PortAllocationTable::plan(9000, 2)
            .unwrap()
            .persist(&path)
            .unwrap();

        let written: BTreeMap<String, bool> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            BTreeMap::from([("9000".to_string(), false), ("9001".to_string(), false)])
        );
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_persist_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("used_ports.json");
        let err = PortAllocationTable::plan(9000, 1)
            .unwrap()
            .persist(&path)
            .unwrap_err();
        assert!(matches!(err, ServdError::Persistence(_)));
    }
}
