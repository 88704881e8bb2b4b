//! Rebuild script directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::warn;

const SCRIPT_PREFIX: &str = "UP_";
const SCRIPT_SUFFIX: &str = ".sh";

/// Scripts as seen from this process.
#[derive(Debug, Clone)]
pub struct ScriptDir {
    root: PathBuf,
}

impl ScriptDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map `service → file name` for every `UP_<service>.sh`.
    ///
    /// An unreadable directory lists nothing.
    pub async fn discover(&self) -> BTreeMap<String, String> {
        let mut scripts = BTreeMap::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.root.display(), error = %e, "Cannot read scripts directory");
                return scripts;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let Ok(file_name) = entry.file_name().into_string() else {
                        continue;
                    };
                    if let Some(service) = service_name(&file_name) {
                        scripts.insert(service.to_string(), file_name);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.root.display(), error = %e, "Error while listing scripts");
                    break;
                }
            }
        }
        scripts
    }

    /// Path of `script_name` inside the directory.
    ///
    /// `script_name` must already be validated as a bare file name.
    pub fn path_of(&self, script_name: &str) -> PathBuf {
        self.root.join(script_name)
    }

    /// Does `script_name` exist as a file we can see?
    pub async fn exists(&self, script_name: &str) -> bool {
        tokio::fs::metadata(self.path_of(script_name))
            .await
            .is_ok_and(|m| m.is_file())
    }
}

/// `UP_billing.sh` → `billing`.
fn service_name(file_name: &str) -> Option<&str> {
    let service = file_name
        .strip_prefix(SCRIPT_PREFIX)?
        .strip_suffix(SCRIPT_SUFFIX)?;
    (!service.is_empty()).then_some(service)
}

/// A script name must be a bare file name.
pub fn is_valid_script_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_service_name() {
        assert_eq!(service_name("UP_billing.sh"), Some("billing"));
        assert_eq!(service_name("UP_.sh"), None);
        assert_eq!(service_name("DOWN_billing.sh"), None);
        assert_eq!(service_name("UP_billing.bash"), None);
    }

    #[test]
    fn test_script_name_validation() {
        assert!(is_valid_script_name("UP_api.sh"));
        assert!(!is_valid_script_name(""));
        assert!(!is_valid_script_name("../etc/passwd"));
        assert!(!is_valid_script_name("sub/UP_api.sh"));
        assert!(!is_valid_script_name(".."));
    }

    #[tokio::test]
    async fn test_discover() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("UP_api.sh"), "exit 0").unwrap();
        std::fs::write(temp.path().join("UP_db.sh"), "exit 0").unwrap();
        std::fs::write(temp.path().join("README.md"), "").unwrap();

        let dir = ScriptDir::new(temp.path());
        let found = dir.discover().await;
        assert_eq!(found.len(), 2);
        assert_eq!(found["api"], "UP_api.sh");
        assert!(dir.exists("UP_db.sh").await);
        assert!(!dir.exists("UP_web.sh").await);
    }

    #[tokio::test]
    async fn test_missing_dir_lists_nothing() {
        let dir = ScriptDir::new("/nonexistent/fleetdeck/scripts");
        assert!(dir.discover().await.is_empty());
    }
}
