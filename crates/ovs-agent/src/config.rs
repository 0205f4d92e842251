//! Agent configuration.
//!
//! Loaded from YAML. Every field has a default, so an empty file (or no file)
//! yields a working single-bridge setup.
//!
//! ```yaml
//! integration_bridge: br-int
//! physical_bridges:
//!   - name: br-phys
//!     ports: [eth0]
//! enable_dhcpv6: false
//! log_format: pretty
//! ```

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::br_int::DefaultTableOptions;
use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// A provider bridge carrying minimum-bandwidth queues off the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalBridgeConfig {
    pub name: String,
    /// Ports reported for the bridge when no switch is attached.
    #[serde(default)]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub integration_bridge: String,
    pub physical_bridges: Vec<PhysicalBridgeConfig>,
    pub enable_openflow_dhcp: bool,
    pub enable_dhcpv6: bool,
    /// Cookie stamped on every rule the agent installs.
    pub cookie: u64,
    /// Port name to switch port number, for bridges without a live switch.
    pub ports: BTreeMap<String, u32>,
    pub log_level: String,
    pub log_format: LogFormat,
}

pub const DEFAULT_INTEGRATION_BRIDGE: &str = "br-int";
pub const DEFAULT_COOKIE: u64 = 0x0a9e_0000_0000_0001;

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            integration_bridge: DEFAULT_INTEGRATION_BRIDGE.to_string(),
            physical_bridges: Vec::new(),
            enable_openflow_dhcp: true,
            enable_dhcpv6: true,
            cookie: DEFAULT_COOKIE,
            ports: BTreeMap::new(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl AgentConfig {
    pub fn from_yaml(content: &str) -> AgentResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| AgentError::config(format!("invalid configuration: {}", e)))
    }

    /// Reads and validates `path`.
    pub fn load(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AgentError::config(format!("failed to read {}: {}", path.display(), e)))?;
        let config = if content.trim().is_empty() {
            Self::default()
        } else {
            Self::from_yaml(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AgentResult<()> {
        let mut seen = HashSet::new();
        let names = std::iter::once(self.integration_bridge.as_str())
            .chain(self.physical_bridges.iter().map(|bridge| bridge.name.as_str()));
        for name in names {
            if name.trim().is_empty() {
                return Err(AgentError::config("bridge name must not be empty"));
            }
            if !seen.insert(name) {
                return Err(AgentError::config(format!("duplicate bridge name {}", name)));
            }
        }
        if let Some((name, _)) = self.ports.iter().find(|(_, ofport)| **ofport == 0) {
            return Err(AgentError::config(format!("port {} has port number 0", name)));
        }
        Ok(())
    }

    /// Audit record for this configuration taking effect. `path` is the file
    /// it came from, if any.
    pub fn audit_record(&self, path: Option<&Path>) -> AuditRecord {
        let physical: Vec<&str> = self
            .physical_bridges
            .iter()
            .map(|bridge| bridge.name.as_str())
            .collect();
        AuditRecord::new(AuditCategory::ConfigurationChange, "AgentConfig", "load_config")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(&self.integration_bridge)
            .with_object_type("bridge")
            .with_details(serde_json::json!({
                "path": path.map(|p| p.display().to_string()),
                "physical_bridges": physical,
                "enable_openflow_dhcp": self.enable_openflow_dhcp,
                "enable_dhcpv6": self.enable_dhcpv6,
                "ports": self.ports.len(),
            }))
    }

    pub fn table_options(&self) -> DefaultTableOptions {
        DefaultTableOptions {
            enable_openflow_dhcp: self.enable_openflow_dhcp,
            enable_dhcpv6: self.enable_dhcpv6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.integration_bridge, "br-int");
        assert!(config.physical_bridges.is_empty());
        assert_eq!(config.table_options(), DefaultTableOptions::default());
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AgentConfig::from_yaml(
            "physical_bridges:\n  - name: br-phys\n    ports: [eth0, eth1]\nenable_dhcpv6: false\nlog_format: pretty\n",
        )
        .unwrap();

        assert_eq!(config.integration_bridge, "br-int");
        assert_eq!(
            config.physical_bridges,
            vec![PhysicalBridgeConfig {
                name: "br-phys".to_string(),
                ports: vec!["eth0".to_string(), "eth1".to_string()],
            }]
        );
        assert!(config.enable_openflow_dhcp);
        assert!(!config.enable_dhcpv6);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_duplicate_bridge_names_rejected() {
        let mut config = AgentConfig::default();
        config.physical_bridges.push(PhysicalBridgeConfig {
            name: "br-int".to_string(),
            ports: vec![],
        });
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_empty_bridge_name_rejected() {
        let config = AgentConfig {
            integration_bridge: " ".to_string(),
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "integration_bridge: br-test").unwrap();
        writeln!(file, "ports:\n  tap1: 5").unwrap();

        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(config.integration_bridge, "br-test");
        assert_eq!(config.ports.get("tap1"), Some(&5));
    }

    #[test]
    fn test_audit_record_describes_loaded_config() {
        let config = AgentConfig::from_yaml("physical_bridges:\n  - name: br-phys\n").unwrap();

        let record = config.audit_record(Some(Path::new("/etc/ovs-qos-agent.yaml")));

        assert_eq!(record.category, AuditCategory::ConfigurationChange);
        assert_eq!(record.outcome, AuditOutcome::Success);
        assert_eq!(record.object_id.as_deref(), Some("br-int"));
        let details = record.details.unwrap();
        assert_eq!(details["path"], "/etc/ovs-qos-agent.yaml");
        assert_eq!(details["physical_bridges"], serde_json::json!(["br-phys"]));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = AgentConfig::load(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_load_rejects_unknown_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_format: xml").unwrap();
        assert!(AgentConfig::load(file.path()).is_err());
    }
}
