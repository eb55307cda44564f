//! Workflow configuration loader.
//!
//! The only place in the system that reads workflow YAML from disk. Results
//! are cached for 60 seconds per resolved directory; parse failures are
//! negatively cached for the same interval so a broken file does not get
//! re-parsed on every call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::config::WorkflowConfig;

/// File name looked up inside the configured directory.
pub const WORKFLOW_FILE: &str = "workflows.yaml";

const CACHE_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    loaded_at: Instant,
    /// `None` records a parse failure; callers get the bundled default.
    config: Option<Arc<WorkflowConfig>>,
}

/// Cached loader for workflow configuration documents.
///
/// Thread-safe and cheap to clone behind an `Arc`; services share one
/// instance and call [`WorkflowConfigLoader::load`] per operation so a
/// changed file is picked up within the cache interval.
pub struct WorkflowConfigLoader {
    dir: Option<PathBuf>,
    ttl: Duration,
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
    bundled: Arc<WorkflowConfig>,
}

impl WorkflowConfigLoader {
    /// `dir` is the directory expected to contain [`WORKFLOW_FILE`]; `None`
    /// means always use the bundled default.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            ttl: CACHE_TTL,
            cache: Mutex::new(HashMap::new()),
            bundled: Arc::new(WorkflowConfig::bundled_default()),
        }
    }

    /// Loader with a custom cache interval, for tests.
    pub fn with_ttl(dir: Option<PathBuf>, ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::new(dir)
        }
    }

    /// Resolve the active configuration.
    ///
    /// Missing directory or file yields the bundled default. A file that
    /// fails to parse logs a warning and yields the bundled default until
    /// the cache interval elapses.
    pub fn load(&self) -> Arc<WorkflowConfig> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => return self.bundled.clone(),
        };

        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.get(&dir) {
                if entry.loaded_at.elapsed() < self.ttl {
                    return entry
                        .config
                        .clone()
                        .unwrap_or_else(|| self.bundled.clone());
                }
            }
        }

        let loaded = self.read_from_disk(&dir);
        let result = loaded.clone().unwrap_or_else(|| self.bundled.clone());

        self.cache.lock().insert(
            dir,
            CacheEntry {
                loaded_at: Instant::now(),
                config: loaded,
            },
        );
        result
    }

    /// Drop every cache entry so the next [`load`](Self::load) re-reads disk.
    pub fn reload(&self) {
        self.cache.lock().clear();
    }

    /// The bundled default, independent of any directory.
    pub fn bundled(&self) -> Arc<WorkflowConfig> {
        self.bundled.clone()
    }

    fn read_from_disk(&self, dir: &Path) -> Option<Arc<WorkflowConfig>> {
        let path = dir.join(WORKFLOW_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no workflow file, using bundled default");
                return Some(self.bundled.clone());
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read workflow file");
                return None;
            }
        };

        match WorkflowConfig::from_yaml(&text) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "workflow configuration loaded");
                Some(Arc::new(config))
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "workflow file invalid, using bundled default");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_workflow_file(dir: &Path, content: &str) {
        let mut file = std::fs::File::create(dir.join(WORKFLOW_FILE)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn no_directory_returns_bundled() {
        let loader = WorkflowConfigLoader::new(None);
        let config = loader.load();
        assert_eq!(*config, WorkflowConfig::bundled_default());
    }

    #[test]
    fn missing_file_returns_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let loader = WorkflowConfigLoader::new(Some(dir.path().to_path_buf()));
        let config = loader.load();
        assert_eq!(*config, WorkflowConfig::bundled_default());
    }

    #[test]
    fn valid_file_is_loaded_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        write_workflow_file(
            dir.path(),
            r#"
status_progression:
  tasks:
    default_flow: [todo, doing, done]
    terminal_statuses: [done]
"#,
        );

        let loader = WorkflowConfigLoader::new(Some(dir.path().to_path_buf()));
        let config = loader.load();
        assert_eq!(config.tasks.default_flow, vec!["todo", "doing", "done"]);

        // Within the interval the cached copy is served even after the file
        // changes on disk.
        write_workflow_file(
            dir.path(),
            r#"
status_progression:
  tasks:
    default_flow: [only]
    terminal_statuses: [only]
"#,
        );
        let cached = loader.load();
        assert_eq!(cached.tasks.default_flow, vec!["todo", "doing", "done"]);

        // Explicit reload picks up the new file.
        loader.reload();
        let fresh = loader.load();
        assert_eq!(fresh.tasks.default_flow, vec!["only"]);
    }

    #[test]
    fn parse_failure_is_negatively_cached() {
        let dir = tempfile::tempdir().unwrap();
        write_workflow_file(dir.path(), "status_progression: [not, a, mapping]");

        let loader = WorkflowConfigLoader::new(Some(dir.path().to_path_buf()));
        let config = loader.load();
        assert_eq!(*config, WorkflowConfig::bundled_default());

        // Fixing the file does not take effect until the entry expires or a
        // reload is requested.
        write_workflow_file(
            dir.path(),
            r#"
status_progression:
  tasks:
    default_flow: [a, b]
    terminal_statuses: [b]
"#,
        );
        assert_eq!(*loader.load(), WorkflowConfig::bundled_default());
        loader.reload();
        assert_eq!(loader.load().tasks.default_flow, vec!["a", "b"]);
    }

    #[test]
    fn expired_entry_is_reread() {
        let dir = tempfile::tempdir().unwrap();
        write_workflow_file(
            dir.path(),
            r#"
status_progression:
  tasks:
    default_flow: [a, b]
    terminal_statuses: [b]
"#,
        );
        let loader =
            WorkflowConfigLoader::with_ttl(Some(dir.path().to_path_buf()), Duration::ZERO);
        assert_eq!(loader.load().tasks.default_flow, vec!["a", "b"]);

        write_workflow_file(
            dir.path(),
            r#"
status_progression:
  tasks:
    default_flow: [x]
    terminal_statuses: [x]
"#,
        );
        assert_eq!(loader.load().tasks.default_flow, vec!["x"]);
    }
}
