//! Service registry.
//!
//! Loads the declarative YAML registry of manageable services. The registry
//! holds no state between calls: every [`ServiceRegistry::load`] re-reads the
//! backing file, so edits take effect on the next request.
//!
//! `serde_yaml` follows YAML 1.2, where `yes`/`no` are strings. The
//! `status_check_allowed` key accepts those words anyway, and `null` for
//! any key means "use the default". An entry that still does not fit is
//! dropped by itself; the rest of the registry is kept.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::validation::validate_service_name;

use super::definition::{PermissionLevel, ServiceDefinition};

/// Service used when the registry source cannot be read or parsed.
const FALLBACK_SERVICE: &str = "pzserver";
const FALLBACK_DISPLAY_NAME: &str = "PZServer Game Server";
const FALLBACK_DESCRIPTION: &str = "Project Zomboid dedicated game server";

/// On-disk layout of the registry file.
///
/// Entries stay untyped here so one bad entry can be dropped on its own.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    services: Option<BTreeMap<String, serde_yaml::Value>>,
}

/// One entry under `services:`. Every key is optional, and an explicit
/// `null` means the same as a missing key.
#[derive(Debug, Deserialize)]
struct ServiceEntry {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    permissions_required: Option<PermissionLevel>,
    #[serde(default, deserialize_with = "lenient_bool")]
    status_check_allowed: Option<bool>,
}

/// Accept YAML 1.1 boolean words (`yes`, `no`, `on`, `off`) as well as
/// YAML 1.2 `true`/`false`. `serde_yaml` only knows the latter.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b)),
        Some(serde_yaml::Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "on" => Ok(Some(true)),
            "false" | "no" | "n" | "off" => Ok(Some(false)),
            _ => Err(D::Error::custom(format!("expected a boolean, got '{}'", s))),
        },
        Some(other) => Err(D::Error::custom(format!(
            "expected a boolean, got {:?}",
            other
        ))),
    }
}

impl Default for ServiceEntry {
    fn default() -> Self {
        Self {
            display_name: None,
            description: None,
            permissions_required: None,
            status_check_allowed: None,
        }
    }
}

impl ServiceEntry {
    fn into_definition(self, name: String) -> ServiceDefinition {
        ServiceDefinition {
            display_name: self.display_name.unwrap_or_else(|| name.clone()),
            description: self.description.unwrap_or_default(),
            permission_level: self.permissions_required.unwrap_or_default(),
            status_check_allowed: self.status_check_allowed.unwrap_or(true),
            name,
        }
    }
}

/// A loaded snapshot of the registry, keyed and ordered by service name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSet {
    services: BTreeMap<String, ServiceDefinition>,
}

impl ServiceSet {
    /// Parse a registry document.
    ///
    /// Entries whose names could not be passed safely to a helper, or whose
    /// keys hold values of the wrong kind, are dropped with a warning. Only a
    /// document that is not a registry at all is an error.
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self, RegistryError> {
        if content.trim().is_empty() {
            return Err(RegistryError::Parse {
                path: origin.to_path_buf(),
                message: "registry document is empty".to_string(),
            });
        }

        let file: RegistryFile =
            serde_yaml::from_str(content).map_err(|e| RegistryError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut services = BTreeMap::new();
        for (name, entry) in file.services.unwrap_or_default() {
            if let Err(e) = validate_service_name(&name) {
                warn!(
                    service = %name,
                    error = %e,
                    path = %origin.display(),
                    "Skipping registry entry with invalid service name"
                );
                continue;
            }
            let entry = if entry.is_null() {
                ServiceEntry::default()
            } else {
                match serde_yaml::from_value::<ServiceEntry>(entry) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(
                            service = %name,
                            error = %e,
                            path = %origin.display(),
                            "Skipping malformed registry entry"
                        );
                        continue;
                    }
                }
            };
            let definition = entry.into_definition(name.clone());
            services.insert(name, definition);
        }

        Ok(Self { services })
    }

    /// The built-in single-service set used when loading fails.
    pub fn fallback() -> Self {
        let definition = ServiceDefinition {
            name: FALLBACK_SERVICE.to_string(),
            display_name: FALLBACK_DISPLAY_NAME.to_string(),
            description: FALLBACK_DESCRIPTION.to_string(),
            permission_level: PermissionLevel::Restart,
            status_check_allowed: true,
        };
        Self::from_iter([definition])
    }

    /// Get a service definition by name.
    pub fn get(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Iterate definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.services.values()
    }

    /// List all service names in order.
    pub fn names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl FromIterator<ServiceDefinition> for ServiceSet {
    fn from_iter<I: IntoIterator<Item = ServiceDefinition>>(iter: I) -> Self {
        Self {
            services: iter
                .into_iter()
                .map(|def| (def.name.clone(), def))
                .collect(),
        }
    }
}

/// Handle on the registry file. Cheap to clone; carries only the path.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    path: PathBuf,
}

impl ServiceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the backing registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry, falling back to the built-in service on any error.
    ///
    /// This never fails: an unreadable or malformed registry yields
    /// [`ServiceSet::fallback`] and a warning.
    pub fn load(&self) -> ServiceSet {
        match self.try_load() {
            Ok(services) => {
                debug!(
                    path = %self.path.display(),
                    count = services.len(),
                    "Service registry loaded"
                );
                services
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = FALLBACK_SERVICE,
                    "Failed to load service registry, using built-in default"
                );
                ServiceSet::fallback()
            }
        }
    }

    /// Load the registry, reporting failures instead of falling back.
    pub fn try_load(&self) -> Result<ServiceSet, RegistryError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| RegistryError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        ServiceSet::from_yaml(&content, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(content: &str) -> Result<ServiceSet, RegistryError> {
        ServiceSet::from_yaml(content, Path::new("services.yaml"))
    }

    fn write_registry(dir: &TempDir, content: &str) -> ServiceRegistry {
        let path = dir.path().join("services.yaml");
        std::fs::write(&path, content).unwrap();
        ServiceRegistry::new(path)
    }

    #[test]
    fn test_full_entry() {
        let services = parse(
            r#"
services:
  web:
    display_name: "Web Frontend"
    description: "Public nginx"
    permissions_required: stop
    status_check_allowed: false
"#,
        )
        .unwrap();

        let web = services.get("web").unwrap();
        assert_eq!(web.name, "web");
        assert_eq!(web.display_name, "Web Frontend");
        assert_eq!(web.description, "Public nginx");
        assert_eq!(web.permission_level, PermissionLevel::Stop);
        assert!(!web.status_check_allowed);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let services = parse(
            r#"
services:
  worker:
    description: "Background jobs"
  bare:
"#,
        )
        .unwrap();

        let worker = services.get("worker").unwrap();
        assert_eq!(worker.permission_level, PermissionLevel::Restart);
        assert!(worker.status_check_allowed);
        assert_eq!(worker.display_name, "worker");

        let bare = services.get("bare").unwrap();
        assert_eq!(bare.permission_level, PermissionLevel::Restart);
        assert!(bare.status_check_allowed);
        assert_eq!(bare.description, "");
    }

    #[test]
    fn test_empty_services_is_valid() {
        assert!(parse("services: {}\n").unwrap().is_empty());
        assert!(parse("services:\n").unwrap().is_empty());
        assert!(parse("other_key: 1\n").unwrap().is_empty());
    }

    #[test]
    fn test_names_are_ordered() {
        let services = parse(
            r#"
services:
  zeta: {}
  alpha: {}
  mid: {}
"#,
        )
        .unwrap();
        assert_eq!(services.names(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_malformed_entry_skipped_alone() {
        let services = parse(
            r#"
services:
  web:
    permissions_required: reboot
  api:
    status_check_allowed: maybe
  worker:
    permissions_required: stop
"#,
        )
        .unwrap();
        assert_eq!(services.names(), vec!["worker"]);
    }

    #[test]
    fn test_null_values_use_defaults() {
        let services = parse(
            r#"
services:
  web:
    display_name: ~
    permissions_required: null
    status_check_allowed: null
"#,
        )
        .unwrap();

        let web = services.get("web").unwrap();
        assert_eq!(web.display_name, "web");
        assert_eq!(web.permission_level, PermissionLevel::Restart);
        assert!(web.status_check_allowed);
    }

    #[test]
    fn test_yaml_1_1_booleans() {
        let services = parse(
            r#"
services:
  a:
    status_check_allowed: no
  b:
    status_check_allowed: Off
  c:
    status_check_allowed: yes
"#,
        )
        .unwrap();

        assert!(!services.get("a").unwrap().status_check_allowed);
        assert!(!services.get("b").unwrap().status_check_allowed);
        assert!(services.get("c").unwrap().status_check_allowed);
    }

    #[test]
    fn test_services_not_a_mapping_is_parse_error() {
        let result = parse("services: [web, api]\n");
        assert!(matches!(result, Err(RegistryError::Parse { .. })));
    }

    #[test]
    fn test_invalid_names_skipped() {
        let services = parse(
            r#"
services:
  "-rf": {}
  "a b": {}
  good: {}
"#,
        )
        .unwrap();
        assert_eq!(services.names(), vec!["good"]);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let registry = ServiceRegistry::new("/nonexistent/svcmgr/services.yaml");
        assert!(matches!(
            registry.try_load(),
            Err(RegistryError::Read { .. })
        ));

        let services = registry.load();
        assert_eq!(services.len(), 1);
        let def = services.iter().next().unwrap();
        assert_eq!(def.name, FALLBACK_SERVICE);
        assert_eq!(def.permission_level, PermissionLevel::Restart);
        assert!(def.status_check_allowed);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let registry = write_registry(&dir, "services: [this, is: not, valid");
        let services = registry.load();
        assert_eq!(services, ServiceSet::fallback());
    }

    #[test]
    fn test_empty_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let registry = write_registry(&dir, "");
        assert_eq!(registry.load(), ServiceSet::fallback());
    }

    #[test]
    fn test_reload_sees_edits() {
        let dir = TempDir::new().unwrap();
        let registry = write_registry(&dir, "services:\n  web: {}\n");
        assert!(registry.load().contains("web"));

        std::fs::write(registry.path(), "services:\n  api: {}\n").unwrap();
        let services = registry.load();
        assert!(!services.contains("web"));
        assert!(services.contains("api"));
    }
}
