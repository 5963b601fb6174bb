use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use crate::{
    nexus::MemoryNexus,
    types::{Address, Chain, ChainName},
    Error,
};

/// 治理参数；gateway 为空表示尚未设置
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct Params {
    #[serde(default)]
    pub gateway: Address,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChainConfig {
    pub name: ChainName,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default)]
    pub supports_foreign_assets: bool,
    #[serde(default = "default_activated")]
    pub activated: bool,
}

impl ChainConfig {
    pub fn to_chain(&self) -> Chain {
        Chain {
            name: self.name.clone(),
            module: self.module.clone(),
            supports_foreign_assets: self.supports_foreign_assets,
        }
    }
}

fn default_module() -> String {
    "evm".to_string()
}

fn default_activated() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayerConfig {
    pub poll_interval: u64,
    pub max_retries: u32,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: 5,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub gateway: Address,
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub relayer: RelayerConfig,
    /// 消息 ID 派生种子（十六进制），缺省为全零
    #[serde(default)]
    pub id_seed: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self, Error> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_json(&config_str)
    }

    pub fn from_json(config_str: &str) -> Result<Self, Error> {
        let config: Config = serde_json::from_str(config_str)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        // 链名不能为空且不能重复
        let mut names = HashSet::new();
        for chain in &self.chains {
            if chain.name.is_empty() {
                return Err(Error::Config("Chain name must not be empty".to_string()));
            }
            if !names.insert(&chain.name) {
                return Err(Error::Config(format!("Duplicate chain: {}", chain.name)));
            }
        }

        if let Some(seed) = &self.id_seed {
            if hex::decode(seed.trim_start_matches("0x")).is_err() {
                return Err(Error::Config(format!("Invalid id seed: {}", seed)));
            }
        }

        if self.relayer.poll_interval == 0 {
            return Err(Error::Config("Relayer poll interval must be greater than 0".to_string()));
        }
        if self.relayer.max_retries == 0 {
            return Err(Error::Config("Relayer max retries must be greater than 0".to_string()));
        }

        Ok(())
    }

    pub fn params(&self) -> Params {
        Params {
            gateway: self.gateway.clone(),
        }
    }

    pub fn get_chain_config(&self, name: &ChainName) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| &c.name == name)
    }

    pub fn build_nexus(&self) -> Result<MemoryNexus, Error> {
        let seed = match &self.id_seed {
            Some(seed) => hex::decode(seed.trim_start_matches("0x"))
                .map_err(|e| Error::Config(format!("Invalid id seed: {}", e)))?,
            None => Vec::new(),
        };

        let nexus = MemoryNexus::new(self.params(), seed);
        for chain in &self.chains {
            nexus.register_chain(chain.to_chain());
            if !chain.activated {
                nexus.deactivate_chain(&chain.name);
            }
        }

        Ok(nexus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nexus::{ChainRegistry, ConfigStore};
    use std::io::Write;

    const CONFIG: &str = r#"{
        "gateway": "axelar1gateway",
        "chains": [
            {"name": "Axelarnet", "module": "axelarnet"},
            {"name": "Ethereum", "activated": false}
        ],
        "relayer": {"poll_interval": 2, "max_retries": 4}
    }"#;

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.gateway, Address::from("axelar1gateway"));
        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.relayer.max_retries, 4);

        let ethereum = config.get_chain_config(&ChainName::from("Ethereum")).unwrap();
        assert_eq!(ethereum.module, "evm");
        assert!(!ethereum.activated);
    }

    #[test]
    fn test_missing_gateway_means_unset() {
        let config = Config::from_json(r#"{"chains": []}"#).unwrap();
        assert!(config.params().gateway.is_empty());
        assert_eq!(config.relayer.poll_interval, 5);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let duplicate = r#"{"chains": [{"name": "A"}, {"name": "A"}]}"#;
        assert!(matches!(Config::from_json(duplicate), Err(Error::Config(_))));

        let empty_name = r#"{"chains": [{"name": ""}]}"#;
        assert!(matches!(Config::from_json(empty_name), Err(Error::Config(_))));

        let zero_retries = r#"{"chains": [], "relayer": {"poll_interval": 1, "max_retries": 0}}"#;
        assert!(matches!(Config::from_json(zero_retries), Err(Error::Config(_))));

        let bad_seed = r#"{"chains": [], "id_seed": "zz"}"#;
        assert!(matches!(Config::from_json(bad_seed), Err(Error::Config(_))));

        assert!(matches!(Config::load("/nonexistent/nexus.json"), Err(Error::Config(_))));
    }

    #[test]
    fn test_build_nexus_registers_chains() {
        let config = Config::from_json(CONFIG).unwrap();
        let nexus = config.build_nexus().unwrap();

        assert_eq!(nexus.get_params().gateway, Address::from("axelar1gateway"));
        let axelarnet = nexus.get_chain(&ChainName::from("Axelarnet")).unwrap();
        assert_eq!(axelarnet.module, "axelarnet");
        assert!(nexus.is_chain_activated(&ChainName::from("Axelarnet")));
        assert!(!nexus.is_chain_activated(&ChainName::from("Ethereum")));
    }
}
