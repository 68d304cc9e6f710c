use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {reason}")]
    Invalid { reason: String },
}

impl ConfigError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            reason: reason.into(),
        }
    }
}

/// Identity of one clustered system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemSpec {
    pub id: String,
    pub name: String,
    pub code_level: String,
    /// Empty for a standard system, `hyperswap` for a stretched one.
    #[serde(default)]
    pub topology: String,
}

/// A storage pool (mdisk group) seeded into the simulator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolSpec {
    pub name: String,
    /// Site the pool lives on; `None` for non-stretched pools.
    #[serde(default)]
    pub site_id: Option<u8>,
    #[serde(default = "default_extent_size")]
    pub extent_size: u32,
    #[serde(default)]
    pub data_reduction: bool,
    #[serde(default = "default_pool_capacity")]
    pub capacity: u64,
    #[serde(default = "default_pool_free")]
    pub free_capacity: u64,
}

fn default_extent_size() -> u32 {
    256
}

fn default_pool_capacity() -> u64 {
    3_573_412_790_272
}

fn default_pool_free() -> u64 {
    3_529_926_246_400
}

impl PoolSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            site_id: None,
            extent_size: default_extent_size(),
            data_reduction: false,
            capacity: default_pool_capacity(),
            free_capacity: default_pool_free(),
        }
    }

    pub fn on_site(mut self, site: u8) -> Self {
        self.site_id = Some(site);
        self
    }

    pub fn with_data_reduction(mut self) -> Self {
        self.data_reduction = true;
        self
    }
}

/// A controller node canister.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSpec {
    pub id: u32,
    pub name: String,
    pub wwnn: String,
    pub iscsi_name: String,
    pub panel_name: String,
    #[serde(default)]
    pub site_id: Option<u8>,
    /// FC port WWPNs, one per port starting at port 1.
    #[serde(default)]
    pub wwpns: Vec<String>,
    /// IPv4 addresses of the iSCSI ports, one per port starting at port 1.
    #[serde(default)]
    pub ipv4: Vec<String>,
}

impl NodeSpec {
    fn default_node(id: u32, wwpn_suffix: char, ips: [&str; 2]) -> Self {
        let name = format!("node{}", id);
        Self {
            id,
            wwnn: format!("123456789ABCDEF{}", id - 1),
            iscsi_name: format!("iqn.1982-01.com.ibm:1234.sim.{}", name),
            panel_name: format!("01-{}", id),
            site_id: Some(id as u8),
            wwpns: (1..=4)
                .map(|port| format!("50050768021{}2AD{}", port, wwpn_suffix))
                .collect(),
            ipv4: ips.iter().map(|ip| ip.to_string()).collect(),
            name,
        }
    }
}

/// Seed data for a simulator instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// The system the simulator plays.
    pub local_system: SystemSpec,
    /// The remote partner used by remote-copy verbs.
    pub aux_system: SystemSpec,
    pub pools: Vec<PoolSpec>,
    pub nodes: Vec<NodeSpec>,
    /// Number of regular I/O groups; `recovery_io_grp` is always appended.
    pub io_groups: u32,
    /// Whether the compression license is installed.
    pub license_compression: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            local_system: SystemSpec {
                id: "0123456789ABCDEF".to_string(),
                name: "storwize-svc-sim".to_string(),
                code_level: "7.2.0.0 (build 87.0.1311291000)".to_string(),
                topology: String::new(),
            },
            aux_system: SystemSpec {
                id: "ABCDEF0123456789".to_string(),
                name: "aux-svc-sim".to_string(),
                code_level: "7.2.0.0 (build 87.0.1311291000)".to_string(),
                topology: String::new(),
            },
            pools: vec![
                PoolSpec::new("openstack"),
                PoolSpec::new("openstack1"),
                PoolSpec::new("openstack2"),
                PoolSpec::new("openstack3"),
                PoolSpec::new("hyperswap1").on_site(1),
                PoolSpec::new("hyperswap2").on_site(2),
                PoolSpec::new("dr_pool1").with_data_reduction(),
                PoolSpec::new("dr_pool2").with_data_reduction(),
            ],
            nodes: vec![
                NodeSpec::default_node(1, 'E', ["1.234.56.78", "1.234.56.79"]),
                NodeSpec::default_node(2, 'F', ["1.234.56.80", "1.234.56.81"]),
            ],
            io_groups: 4,
            license_compression: true,
        }
    }
}

impl SimConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pools.is_empty() {
            return Err(ConfigError::invalid("at least one pool is required"));
        }
        if self.nodes.is_empty() {
            return Err(ConfigError::invalid("at least one node is required"));
        }
        if self.local_system.id == self.aux_system.id {
            return Err(ConfigError::invalid(
                "local and aux systems must have distinct ids",
            ));
        }

        let mut seen = HashSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate pool name {}",
                    pool.name
                )));
            }
            if let Some(site) = pool.site_id {
                if !(1..=2).contains(&site) {
                    return Err(ConfigError::invalid(format!(
                        "pool {} has site {}, expected 1 or 2",
                        pool.name, site
                    )));
                }
            }
        }
        Ok(())
    }

    /// Pool and its 1-based id.
    pub fn pool(&self, name: &str) -> Option<(usize, &PoolSpec)> {
        self.pools
            .iter()
            .enumerate()
            .find(|(_, pool)| pool.name == name)
            .map(|(idx, pool)| (idx + 1, pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pool("openstack").map(|(id, _)| id), Some(1));
        assert_eq!(
            config.pool("hyperswap2").and_then(|(_, p)| p.site_id),
            Some(2)
        );
        assert!(config.pool("missing").is_none());
        assert_eq!(config.nodes[0].wwpns[0], "5005076802112ADE");
    }

    #[test]
    fn test_yaml_overrides_and_defaults() {
        let yaml = r#"
pools:
  - name: gold
    site_id: 1
  - name: silver
    data_reduction: true
io_groups: 2
"#;
        let config = SimConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.pools.len(), 2);
        assert_eq!(config.pools[0].extent_size, 256);
        assert!(config.pools[1].data_reduction);
        assert_eq!(config.io_groups, 2);
        assert_eq!(config.local_system.name, "storwize-svc-sim");
    }

    #[test]
    fn test_validation_rejects_duplicates_and_bad_sites() {
        let dup = "pools:\n  - name: a\n  - name: a\n";
        assert!(matches!(
            SimConfig::from_yaml_str(dup),
            Err(ConfigError::Invalid { .. })
        ));

        let bad_site = "pools:\n  - name: a\n    site_id: 3\n";
        assert!(matches!(
            SimConfig::from_yaml_str(bad_site),
            Err(ConfigError::Invalid { .. })
        ));

        assert!(matches!(
            SimConfig::from_yaml_str("pools: [\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = SimConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
