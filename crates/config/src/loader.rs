use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use {
    anyhow::Context,
    serde::de::DeserializeOwned,
    tracing::{debug, warn},
};

use gatehouse_protocol::ConfigurationEntry;

use crate::{env_subst::substitute_env, schema::GatehouseConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "gatehouse.toml",
    "gatehouse.yaml",
    "gatehouse.yml",
    "gatehouse.json",
];

/// Gateway id → ordered configuration entries, as read from a bulk source.
pub type ConfigurationMap = HashMap<String, Vec<ConfigurationEntry>>;

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<GatehouseConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_document(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./gatehouse.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/gatehouse/gatehouse.{toml,yaml,yml,json}` (user-global)
///
/// Returns `GatehouseConfig::default()` if no file is found or the file
/// fails to parse.
pub fn discover_and_load() -> GatehouseConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return GatehouseConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            GatehouseConfig::default()
        },
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = std::iter::once(PathBuf::from("."));
    local
        .chain(config_dir())
        .find_map(|dir| find_in_dir(&dir))
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory, `~/.config/gatehouse/`.
pub fn config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("gatehouse"))
}

/// Read the bulk configuration source handed to the control plane at startup.
///
/// The document maps gateway ids to arrays of entries. Entry order within
/// each array is preserved.
pub fn load_configurations(path: &Path) -> anyhow::Result<ConfigurationMap> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration source {}", path.display()))?;
    let map: ConfigurationMap = parse_document(&raw, path)
        .with_context(|| format!("invalid configuration source {}", path.display()))?;
    let entries: usize = map.values().map(Vec::len).sum();
    debug!(path = %path.display(), gateways = map.len(), entries, "loaded configuration source");
    Ok(map)
}

fn parse_document<T: DeserializeOwned>(raw: &str, path: &Path) -> anyhow::Result<T> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::schema::MetadataKind, gatehouse_protocol::Direction};

    #[test]
    fn loads_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatehouse.yaml");
        std::fs::write(
            &path,
            "control_plane:\n  port: 9000\nagent:\n  control_plane_url: http://cp:9000\n  metadata: static\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.control_plane.port, 9000);
        assert_eq!(
            cfg.agent.control_plane_url.as_deref(),
            Some("http://cp:9000")
        );
        assert_eq!(cfg.agent.metadata, MetadataKind::Static);
    }

    #[test]
    fn substitutes_fallback_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatehouse.toml");
        std::fs::write(
            &path,
            "[control_plane]\nbind = \"${GATEHOUSE_TEST_UNSET_BIND:-127.0.0.1}\"\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.control_plane.bind, "127.0.0.1");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatehouse.ini");
        std::fs::write(&path, "port=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn finds_first_standard_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gatehouse.json"), "{}").unwrap();
        std::fs::write(dir.path().join("gatehouse.yaml"), "{}").unwrap();
        let found = find_in_dir(dir.path()).unwrap();
        assert!(found.ends_with("gatehouse.yaml"));
    }

    #[test]
    fn loads_json_configuration_source_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configurations.json");
        std::fs::write(
            &path,
            r#"{
                "1": [{"direction":"spokeToHub","serviceId":"s1","ports":null,"vip":"10.10.10.10","ip":"2.2.2.2"}],
                "2": [
                    {"direction":"spokeToHub","serviceId":"s2","ports":[80],"vip":"10.10.10.11","ip":"2.2.2.3"},
                    {"direction":"HubToSpoke","serviceId":"s3","ports":[],"vip":"10.10.13.13","ip":"2.2.4.4"}
                ]
            }"#,
        )
        .unwrap();

        let map = load_configurations(&path).unwrap();
        assert_eq!(map.len(), 2);
        let second = &map["2"];
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].service_id, "s2");
        assert_eq!(second[0].ports, vec![80]);
        assert_eq!(second[1].service_id, "s3");
        assert_eq!(second[1].direction, Direction::HubToSpoke);
    }

    #[test]
    fn loads_toml_configuration_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configurations.toml");
        std::fs::write(
            &path,
            r#"
            [[gw-a]]
            direction = "hubToSpoke"
            serviceId = "billing"
            ports = [8443]
            vip = "10.0.0.1"
            ip = "192.168.0.1"
            "#,
        )
        .unwrap();

        let map = load_configurations(&path).unwrap();
        assert_eq!(map["gw-a"][0].service_id, "billing");
    }

    #[test]
    fn malformed_configuration_source_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configurations.json");
        std::fs::write(&path, r#"{"1": [{"direction": "up"}]}"#).unwrap();
        let err = load_configurations(&path).unwrap_err();
        assert!(format!("{err:#}").contains("configurations.json"));
    }
}
