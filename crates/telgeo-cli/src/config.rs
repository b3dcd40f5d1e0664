//! Configuration vault – reads/writes `~/.telgeo/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted user configuration stored in `~/.telgeo/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// TOML detector description to load the plane registry from.
    #[serde(default = "default_description_path")]
    pub description_path: String,

    /// Geometry file: the import source when `import_geometry` is set,
    /// otherwise the model name and dump target.
    #[serde(default = "default_geometry_name")]
    pub geometry_name: String,

    /// Import a previously dumped model instead of building one.
    #[serde(default)]
    pub import_geometry: bool,

    /// Write the freshly built model to `geometry_name`.
    #[serde(default)]
    pub dump_geometry: bool,

    /// Default for `/radlen` when no skip flag is given.
    #[serde(default)]
    pub skip_boundary_volumes: bool,
}

fn default_description_path() -> String {
    "telescope.toml".to_string()
}
fn default_geometry_name() -> String {
    "telescope-geometry.json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            description_path: default_description_path(),
            geometry_name: default_geometry_name(),
            import_geometry: false,
            dump_geometry: false,
            skip_boundary_volumes: false,
        }
    }
}

/// Return the path to `~/.telgeo/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".telgeo").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `TELGEO_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TELGEO_DESCRIPTION` | `description_path` |
/// | `TELGEO_GEOMETRY_FILE` | `geometry_name` |
/// | `TELGEO_DUMP_GEOMETRY` | `dump_geometry` (`1`/`true`/`yes` or `0`/`false`/`no`) |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TELGEO_DESCRIPTION") {
        cfg.description_path = v;
    }
    if let Ok(v) = std::env::var("TELGEO_GEOMETRY_FILE") {
        cfg.geometry_name = v;
    }
    if let Ok(v) = std::env::var("TELGEO_DUMP_GEOMETRY")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.dump_geometry = flag;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.telgeo/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_meta = std::fs::metadata(&path).expect("file metadata");
        let file_mode = file_meta.permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        assert_eq!(dir_meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn roundtrip_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            description_path: "/data/desy/telescope.toml".to_string(),
            import_geometry: true,
            skip_boundary_volumes: true,
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.description_path, "/data/desy/telescope.toml");
        assert!(loaded.import_geometry);
        assert!(loaded.skip_boundary_volumes);
        assert!(!loaded.dump_geometry);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: Config = toml::from_str("import_geometry = true\n").expect("parse");
        assert!(cfg.import_geometry);
        assert_eq!(cfg.description_path, "telescope.toml");
        assert_eq!(cfg.geometry_name, "telescope-geometry.json");
    }

    #[test]
    fn config_path_points_to_telgeo_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".telgeo"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "import_geometry = \"sometimes\"\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }

    #[test]
    fn apply_env_overrides_changes_description() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::set_var("TELGEO_DESCRIPTION", "/tmp/other.toml") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.description_path, "/tmp/other.toml");
        unsafe { std::env::remove_var("TELGEO_DESCRIPTION") };
    }

    #[test]
    fn apply_env_overrides_changes_geometry_file() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::set_var("TELGEO_GEOMETRY_FILE", "run42.json") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.geometry_name, "run42.json");
        unsafe { std::env::remove_var("TELGEO_GEOMETRY_FILE") };
    }

    #[test]
    fn apply_env_overrides_changes_dump_flag() {
        // SAFETY: no other test touches this variable.
        unsafe { std::env::set_var("TELGEO_DUMP_GEOMETRY", "yes") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert!(cfg.dump_geometry);
        unsafe { std::env::remove_var("TELGEO_DUMP_GEOMETRY") };
    }

    #[test]
    fn parse_flag_rejects_garbage() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
