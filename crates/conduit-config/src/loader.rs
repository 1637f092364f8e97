use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::Config;

/// Search paths in lowest-to-highest priority order.  Later entries override
/// earlier ones on scalar conflicts; nested tables are deep-merged.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // System-wide.
    paths.push(PathBuf::from("/etc/conduit/config.yaml"));
    paths.push(PathBuf::from("/etc/conduit/config.yml"));

    // User / XDG.
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/conduit/config.yaml"));
        paths.push(home.join(".config/conduit/config.yml"));
    }
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("conduit/config.yaml"));
        paths.push(config_dir.join("conduit/config.yml"));
    }

    // Workspace-local.
    paths.push(PathBuf::from(".conduit/config.yaml"));
    paths.push(PathBuf::from(".conduit/config.yml"));
    paths.push(PathBuf::from(".conduit.yaml"));
    paths.push(PathBuf::from(".conduit.yml"));
    paths.push(PathBuf::from("conduit.yaml"));
    paths.push(PathBuf::from("conduit.yml"));

    paths
}

/// Load and merge configuration from every discovered file in
/// [`config_search_paths`], then apply `extra` (if given) as the
/// highest-priority layer.  Missing files are silently skipped; an
/// explicitly-given `extra` path that does not exist is an error.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = Value::Mapping(Default::default());

    for path in config_search_paths() {
        if let Ok(text) = std::fs::read_to_string(&path) {
            let parsed: Value = serde_yaml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            merge_yaml(&mut merged, &parsed);
            tracing::debug!(path = %path.display(), "loaded config layer");
        }
    }

    if let Some(extra_path) = extra {
        let text = std::fs::read_to_string(extra_path).map_err(|e| {
            anyhow::anyhow!("failed to read config file {}: {e}", extra_path.display())
        })?;
        let parsed: Value = serde_yaml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", extra_path.display()))?;
        merge_yaml(&mut merged, &parsed);
    }

    if matches!(&merged, Value::Mapping(m) if m.is_empty()) {
        return Ok(Config::default());
    }

    let config: Config = serde_yaml::from_value(merged)
        .map_err(|e| anyhow::anyhow!("failed to deserialize merged config: {e}"))?;
    Ok(config)
}

/// Deep-merge `src` into `dst`.  Scalars and sequences in `src` overwrite
/// `dst`; nested mappings are merged key by key.
fn merge_yaml(dst: &mut Value, src: &Value) {
    match (dst, src) {
        (Value::Mapping(dst_map), Value::Mapping(src_map)) => {
            for (key, src_val) in src_map {
                match dst_map.get_mut(key) {
                    Some(dst_val) => merge_yaml(dst_val, src_val),
                    None => {
                        dst_map.insert(key.clone(), src_val.clone());
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = serde_yaml::from_str("app:\n  name: a\n").unwrap();
        let src = serde_yaml::from_str("app:\n  name: b\n").unwrap();
        merge_yaml(&mut dst, &src);
        let merged: Config = serde_yaml::from_value(dst).unwrap();
        assert_eq!(merged.app.name, "b");
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst: Value =
            serde_yaml::from_str("app:\n  name: a\n  environment: prod\n").unwrap();
        let src: Value = serde_yaml::from_str("app:\n  name: b\n").unwrap();
        merge_yaml(&mut dst, &src);
        let merged: Config = serde_yaml::from_value(dst).unwrap();
        assert_eq!(merged.app.name, "b");
        assert_eq!(merged.app.environment, "prod");
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst: Value = serde_yaml::from_str("ai:\n  max_tool_rounds: 10\n").unwrap();
        let src: Value = serde_yaml::from_str("ai:\n  tool_call_timeout_secs: 20\n").unwrap();
        merge_yaml(&mut dst, &src);
        let merged: Config = serde_yaml::from_value(dst).unwrap();
        assert_eq!(merged.ai.max_tool_rounds, 10);
        assert_eq!(merged.ai.tool_call_timeout_secs, 20);
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/nonexistent/conduit-config-test.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_with_no_extra_path_returns_defaults_or_discovered() {
        // Cannot guarantee no config files exist on the host running the test
        // suite, but loading must never panic and must always produce a
        // structurally valid Config.
        let cfg = load(None).unwrap();
        assert!(!cfg.app.name.is_empty());
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conduit.yaml");
        std::fs::write(&path, "app:\n  name: from-file\n  listen_port: 9999\n").unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.app.name, "from-file");
        assert_eq!(cfg.app.listen_port, 9999);
    }
}
