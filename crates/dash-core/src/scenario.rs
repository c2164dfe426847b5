//! Scenario root detection and the per-scenario timeout configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Compiled-in default agent timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

pub const REPO_ROOT_ENV: &str = "VROOLI_ROOT";
pub const SCENARIO_ROOT_ENV: &str = "SCENARIO_ROOT";

const REPO_MARKER: &str = ".vrooli";
const SCENARIO_MARKER: &str = "service.json";
const CODEX_CONFIG_RELATIVE: &str = "initialization/configuration/codex-config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct CodexConfig {
    #[serde(default)]
    pub investigation_settings: InvestigationSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct InvestigationSettings {
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
}

/// Locate the repository root for `start_dir`.
///
/// `VROOLI_ROOT` wins when it names an existing directory containing a
/// `.vrooli` subdirectory; otherwise the ancestors of `start_dir` are walked
/// for one, falling back to `start_dir` itself.
pub fn detect_repo_root(start_dir: &Path) -> PathBuf {
    repo_root_from(std::env::var_os(REPO_ROOT_ENV).map(PathBuf::from), start_dir)
}

pub fn repo_root_from(env_root: Option<PathBuf>, start_dir: &Path) -> PathBuf {
    if let Some(root) = env_root {
        if root.join(REPO_MARKER).is_dir() {
            return root;
        }
    }
    find_ancestor_with(start_dir, |dir| dir.join(REPO_MARKER).is_dir())
        .unwrap_or_else(|| start_dir.to_path_buf())
}

/// Locate the scenario root.
///
/// `SCENARIO_ROOT` wins when it names an existing directory; otherwise the
/// ancestors of the working directory are walked for a `service.json`,
/// falling back to the working directory.
pub fn detect_scenario_root() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    scenario_root_from(std::env::var_os(SCENARIO_ROOT_ENV).map(PathBuf::from), &cwd)
}

pub fn scenario_root_from(env_root: Option<PathBuf>, cwd: &Path) -> PathBuf {
    if let Some(root) = env_root {
        if root.is_dir() {
            return root;
        }
    }
    find_ancestor_with(cwd, |dir| dir.join(SCENARIO_MARKER).exists())
        .unwrap_or_else(|| cwd.to_path_buf())
}

fn find_ancestor_with(start: &Path, matches: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| matches(dir))
        .map(Path::to_path_buf)
}

pub fn load_codex_config(path: impl AsRef<Path>) -> Result<CodexConfig, ConfigError> {
    let path_ref = path.as_ref();
    let body = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&body).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}

/// The effective agent timeout for a scenario root.
///
/// Reads `initialization/configuration/codex-config.json` under the root;
/// a missing file, malformed JSON, or a missing/zero/negative
/// `investigation_settings.timeout_seconds` falls back to
/// [`DEFAULT_TIMEOUT_SECS`]. Malformed input is logged, never fatal.
pub fn effective_timeout(scenario_root: &Path) -> Duration {
    let default = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
    let path = scenario_root.join(CODEX_CONFIG_RELATIVE);
    if !path.is_file() {
        return default;
    }

    let config = match load_codex_config(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("[scenario] ignoring scenario config: {err}");
            return default;
        }
    };

    match config.investigation_settings.timeout_seconds {
        Some(secs) if secs > 0 => Duration::from_secs(secs.max(1) as u64),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_codex_config(root: &Path, body: &str) {
        let dir = root.join("initialization/configuration");
        fs::create_dir_all(&dir).expect("create config dir");
        fs::write(dir.join("codex-config.json"), body).expect("write codex config");
    }

    #[test]
    fn repo_root_env_override_requires_marker_directory() {
        let marked = TempDir::new().expect("tempdir");
        fs::create_dir(marked.path().join(".vrooli")).expect("create marker");
        let unmarked = TempDir::new().expect("tempdir");

        let resolved = repo_root_from(Some(marked.path().to_path_buf()), unmarked.path());
        assert_eq!(resolved, marked.path());

        // Without the marker the override is ignored.
        let resolved = repo_root_from(Some(unmarked.path().to_path_buf()), unmarked.path());
        assert_eq!(resolved, unmarked.path());
    }

    #[test]
    fn repo_root_walks_ancestors_for_marker() {
        let root = TempDir::new().expect("tempdir");
        fs::create_dir(root.path().join(".vrooli")).expect("create marker");
        let nested = root.path().join("a/b/c");
        fs::create_dir_all(&nested).expect("create nested dirs");

        assert_eq!(repo_root_from(None, &nested), root.path());
    }

    #[test]
    fn repo_root_falls_back_to_start_dir() {
        let root = TempDir::new().expect("tempdir");
        assert_eq!(repo_root_from(None, root.path()), root.path());
    }

    #[test]
    fn scenario_root_env_override_only_needs_to_exist() {
        let override_dir = TempDir::new().expect("tempdir");
        let cwd = TempDir::new().expect("tempdir");

        let resolved = scenario_root_from(Some(override_dir.path().to_path_buf()), cwd.path());
        assert_eq!(resolved, override_dir.path());

        let resolved = scenario_root_from(Some(PathBuf::from("/no/such/dir-xyz")), cwd.path());
        assert_eq!(resolved, cwd.path());
    }

    #[test]
    fn scenario_root_walks_ancestors_for_service_json() {
        let root = TempDir::new().expect("tempdir");
        fs::write(root.path().join("service.json"), "{}").expect("write marker");
        let nested = root.path().join("sub/dir");
        fs::create_dir_all(&nested).expect("create nested dirs");

        assert_eq!(scenario_root_from(None, &nested), root.path());
    }

    #[test]
    fn effective_timeout_reads_investigation_settings() {
        let root = TempDir::new().expect("tempdir");
        write_codex_config(
            root.path(),
            r#"{"investigation_settings":{"timeout_seconds":45}}"#,
        );
        assert_eq!(effective_timeout(root.path()), Duration::from_secs(45));
    }

    #[test]
    fn effective_timeout_defaults_without_config_file() {
        let root = TempDir::new().expect("tempdir");
        assert_eq!(
            effective_timeout(root.path()),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn effective_timeout_defaults_on_zero_negative_or_missing_field() {
        for body in [
            r#"{"investigation_settings":{"timeout_seconds":0}}"#,
            r#"{"investigation_settings":{"timeout_seconds":-30}}"#,
            r#"{"investigation_settings":{}}"#,
            r#"{}"#,
        ] {
            let root = TempDir::new().expect("tempdir");
            write_codex_config(root.path(), body);
            assert_eq!(
                effective_timeout(root.path()),
                Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                "body: {body}"
            );
        }
    }

    #[test]
    fn effective_timeout_survives_malformed_json() {
        let root = TempDir::new().expect("tempdir");
        write_codex_config(root.path(), "{not json");
        assert_eq!(
            effective_timeout(root.path()),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn load_codex_config_classifies_read_and_parse_errors() {
        let root = TempDir::new().expect("tempdir");
        let missing = root.path().join("missing.json");
        let err = load_codex_config(&missing).expect_err("missing file should fail");
        assert!(matches!(err, ConfigError::Read { path, .. } if path == missing));

        let invalid = root.path().join("invalid.json");
        fs::write(&invalid, "{{").expect("write invalid fixture");
        let err = load_codex_config(&invalid).expect_err("invalid config should fail");
        assert!(matches!(err, ConfigError::Parse { path, .. } if path == invalid));
    }
}
