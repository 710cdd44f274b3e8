//! Config file discovery, table merging, and environment variable overlay.

use crate::{ConfigError, KeyConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in load order (system, user, local).
///
/// An explicit path replaces `./keytuner.toml` and is returned even when it
/// does not exist, so the caller gets a read error instead of silent defaults.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/keytuner/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("keytuner/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("keytuner.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

/// Parse a TOML string and check it against the config schema.
///
/// The table is returned rather than the typed config so that several files
/// can be layered key by key before the final conversion.
pub fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    // Surface type errors against the file that caused them.
    table_to_config(table.clone(), path)?;

    Ok(table)
}

/// Convert a merged table into the typed config.
pub fn table_to_config(table: toml::Table, path: &Path) -> Result<KeyConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base`. Nested tables merge recursively, every other
/// value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply process environment overrides to config.
pub fn apply_env_overrides(config: &mut KeyConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply `KEYTUNER_*` and `RUST_LOG` overrides from an arbitrary variable set.
///
/// Values that fail to parse are ignored.
pub fn apply_overrides_from<I>(config: &mut KeyConfig, sources: &mut ConfigSources, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut rust_log = None;

    for (key, value) in vars {
        let applied = match key.as_str() {
            "KEYTUNER_POPULATION_SIZE" => value
                .parse()
                .map(|v| config.optimizer.population_size = v)
                .is_ok(),
            "KEYTUNER_SWAP_THRESHOLD" => value
                .parse()
                .map(|v| config.optimizer.evolution_swap_threshold = v)
                .is_ok(),
            "KEYTUNER_MAX_GENERATIONS" => value
                .parse()
                .map(|v| config.optimizer.max_generations = Some(v))
                .is_ok(),
            "KEYTUNER_SEED" => value
                .parse()
                .map(|v| config.optimizer.seed = Some(v))
                .is_ok(),
            "KEYTUNER_WORKERS" => value
                .parse()
                .map(|v| config.evaluation.workers = v)
                .is_ok(),
            "KEYTUNER_DATASET" => {
                config.evaluation.dataset = Some(expand_path(&value));
                true
            }
            "KEYTUNER_LOG_LEVEL" => {
                config.telemetry.log_level = value;
                true
            }
            "RUST_LOG" => {
                // Applied last so it wins over KEYTUNER_LOG_LEVEL
                rust_log = Some(value);
                false
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }

    if let Some(v) = rust_log {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/datasets/manifest.txt");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("datasets/manifest.txt"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn explicit_path_is_always_returned() {
        let files = discover_config_files_with_override(Some(Path::new("/nonexistent/k.toml")));
        assert_eq!(files.last(), Some(&PathBuf::from("/nonexistent/k.toml")));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[optimizer]
population_size = 12
"#;
        let table = parse_table(toml, Path::new("test.toml")).unwrap();
        let config = table_to_config(table, Path::new("test.toml")).unwrap();
        assert_eq!(config.optimizer.population_size, 12);
        // Other values should be defaults
        assert_eq!(config.optimizer.evolution_swap_threshold, 3);
        assert_eq!(config.evaluation.workers, 4);
    }

    #[test]
    fn unknown_field_reports_path() {
        let err = parse_table("[optimizer]\npopulation = 3\n", Path::new("bad.toml")).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, PathBuf::from("bad.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn merge_replaces_leaf_values_only() {
        let mut base: toml::Table = r#"
[optimizer]
population_size = 5
kp_max_range = 50.0
"#
        .parse()
        .unwrap();
        let overlay: toml::Table = r#"
[optimizer]
population_size = 8

[evaluation]
workers = 2
"#
        .parse()
        .unwrap();

        merge_tables(&mut base, overlay);
        let config = table_to_config(base, Path::new("merged")).unwrap();

        assert_eq!(config.optimizer.population_size, 8);
        assert_eq!(config.optimizer.kp_max_range, 50.0);
        assert_eq!(config.evaluation.workers, 2);
    }

    #[test]
    fn env_overrides_are_recorded() {
        let mut config = KeyConfig::default();
        let mut sources = ConfigSources::default();

        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[
                ("KEYTUNER_POPULATION_SIZE", "20"),
                ("KEYTUNER_MAX_GENERATIONS", "not-a-number"),
                ("KEYTUNER_SEED", "42"),
                ("HOME", "/root"),
            ]),
        );

        assert_eq!(config.optimizer.population_size, 20);
        assert_eq!(config.optimizer.max_generations, None);
        assert_eq!(config.optimizer.seed, Some(42));
        assert_eq!(
            sources.env_overrides,
            vec!["KEYTUNER_POPULATION_SIZE".to_string(), "KEYTUNER_SEED".to_string()]
        );
    }

    #[test]
    fn rust_log_wins_over_log_level() {
        let mut config = KeyConfig::default();
        let mut sources = ConfigSources::default();

        apply_overrides_from(
            &mut config,
            &mut sources,
            vars(&[("RUST_LOG", "keytuner=trace"), ("KEYTUNER_LOG_LEVEL", "warn")]),
        );

        assert_eq!(config.telemetry.log_level, "keytuner=trace");
    }
}
