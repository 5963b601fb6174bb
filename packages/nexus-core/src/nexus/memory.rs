use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::{
    config::Params,
    types::{Address, Chain, ChainName, GeneralMessage, MessageId, MessageStatus, RoutingContext},
    Error, Result,
};
use super::{ChainRegistry, ConfigStore, MessageRegistry, Router};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct State {
    params: Params,
    seed: Vec<u8>,
    nonce: u64,
    chains: BTreeMap<ChainName, Chain>,
    deactivated: BTreeSet<ChainName>,
    messages: BTreeMap<String, GeneralMessage>,
    outbound: BTreeMap<ChainName, Vec<String>>,
    #[serde(default)]
    route_attempts: BTreeMap<String, u32>,
}

/// 进程内的参数存储、链注册表、消息注册表和路由器
#[derive(Debug, Default)]
pub struct MemoryNexus {
    state: RwLock<State>,
}

impl MemoryNexus {
    pub fn new(params: Params, seed: Vec<u8>) -> Self {
        Self {
            state: RwLock::new(State {
                params,
                seed,
                ..State::default()
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_gateway(&self, gateway: Address) {
        info!("Setting gateway to {}", gateway);
        self.write().params.gateway = gateway;
    }

    pub fn register_chain(&self, chain: Chain) {
        info!("Registering chain {}", chain.name);
        self.write().chains.insert(chain.name.clone(), chain);
    }

    pub fn activate_chain(&self, name: &ChainName) {
        self.write().deactivated.remove(name);
    }

    pub fn deactivate_chain(&self, name: &ChainName) {
        self.write().deactivated.insert(name.clone());
    }

    pub fn is_chain_activated(&self, name: &ChainName) -> bool {
        let state = self.read();
        state.chains.contains_key(name) && !state.deactivated.contains(name)
    }

    pub fn chains(&self) -> Vec<Chain> {
        self.read().chains.values().cloned().collect()
    }

    pub fn get_message(&self, id: &str) -> Option<GeneralMessage> {
        self.read().messages.get(id).cloned()
    }

    pub fn messages(&self) -> Vec<GeneralMessage> {
        self.read().messages.values().cloned().collect()
    }

    /// 已交给目标链投递通道的消息 ID，按路由顺序排列
    pub fn outbound(&self, chain: &ChainName) -> Vec<String> {
        self.read().outbound.get(chain).cloned().unwrap_or_default()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_vec_pretty(&*self.read())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(path, data)
            .map_err(|e| Error::Registry(format!("Failed to write state file: {}", e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| Error::Registry(format!("Failed to read state file: {}", e)))?;
        let state: State = serde_json::from_slice(&data)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Self {
            state: RwLock::new(state),
        })
    }
}

impl ConfigStore for MemoryNexus {
    fn get_params(&self) -> Params {
        self.read().params.clone()
    }
}

impl ChainRegistry for MemoryNexus {
    fn get_chain(&self, name: &ChainName) -> Option<Chain> {
        self.read().chains.get(name).cloned()
    }
}

impl MessageRegistry for MemoryNexus {
    fn generate_message_id(&self) -> MessageId {
        let mut state = self.write();
        let nonce = state.nonce;
        state.nonce += 1;

        let mut hasher = Sha256::new();
        hasher.update(&state.seed);
        hasher.update(nonce.to_be_bytes());
        let id_bytes = hasher.finalize().to_vec();

        MessageId {
            id: format!("0x{}-{}", hex::encode(&id_bytes), nonce),
            id_bytes,
            nonce,
        }
    }

    fn set_new_message(&self, message: GeneralMessage) -> Result<()> {
        if message.status != MessageStatus::Approved {
            return Err(Error::Registry(format!(
                "new message {} must be approved, got {:?}",
                message.id, message.status
            )));
        }

        let mut state = self.write();
        if state.messages.contains_key(&message.id) {
            return Err(Error::Registry(format!("message {} already exists", message.id)));
        }

        debug!("Storing message {} for chain {}", message.id, message.recipient.chain.name);
        state.messages.insert(message.id.clone(), message);
        Ok(())
    }

    fn approved_messages(&self) -> Vec<GeneralMessage> {
        self.read()
            .messages
            .values()
            .filter(|m| m.status == MessageStatus::Approved)
            .cloned()
            .collect()
    }

    fn record_route_attempt(&self, id: &str) -> Result<u32> {
        let mut state = self.write();
        if !state.messages.contains_key(id) {
            return Err(Error::Registry(format!("message {} not found", id)));
        }

        let count = state.route_attempts.entry(id.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    fn set_message_failed(&self, id: &str) -> Result<()> {
        let mut state = self.write();
        let message = state
            .messages
            .get_mut(id)
            .ok_or_else(|| Error::Registry(format!("message {} not found", id)))?;

        if message.status != MessageStatus::Approved {
            return Err(Error::Registry(format!(
                "message {} cannot fail from status {:?}",
                id, message.status
            )));
        }

        message.status = MessageStatus::Failed;
        state.route_attempts.remove(id);
        Ok(())
    }
}

impl Router for MemoryNexus {
    fn route_message(&self, id: &str, routing_ctx: &[RoutingContext]) -> Result<()> {
        let mut state = self.write();
        let destination = {
            let message = state
                .messages
                .get(id)
                .ok_or_else(|| Error::Routing(format!("message {} not found", id)))?;

            if message.status != MessageStatus::Approved {
                return Err(Error::Routing(format!(
                    "message {} is not approved (status {:?})",
                    id, message.status
                )));
            }
            message.recipient.chain.name.clone()
        };

        if !state.chains.contains_key(&destination) || state.deactivated.contains(&destination) {
            return Err(Error::Routing(format!(
                "destination chain {} is not activated",
                destination
            )));
        }

        if let Some(message) = state.messages.get_mut(id) {
            message.status = MessageStatus::Processing;
        }
        state.route_attempts.remove(id);
        state.outbound.entry(destination.clone()).or_default().push(id.to_string());

        debug!(
            "Routed message {} to {} with {} routing context(s)",
            id,
            destination,
            routing_ctx.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Endpoint, Hash};

    fn chain(name: &str) -> Chain {
        Chain {
            name: name.into(),
            module: "evm".to_string(),
            supports_foreign_assets: false,
        }
    }

    fn message(nexus: &MemoryNexus, destination: &str) -> GeneralMessage {
        let id = nexus.generate_message_id();
        GeneralMessage::new(
            id.id,
            Endpoint {
                chain: Chain::from_source("SomeChain".into()),
                address: "SomeAddress".into(),
            },
            Endpoint {
                chain: chain(destination),
                address: "0xrecipient".into(),
            },
            Hash([1u8; 32]),
            Hash([2u8; 32]),
            7,
        )
    }

    #[test]
    fn test_message_ids_are_unique_and_ordered() {
        let nexus = MemoryNexus::default();
        let first = nexus.generate_message_id();
        let second = nexus.generate_message_id();

        assert_eq!(first.nonce, 0);
        assert_eq!(second.nonce, 1);
        assert_ne!(first.id, second.id);
        assert_ne!(first.id_bytes, second.id_bytes);
        assert_eq!(first.id_bytes.len(), 32);
        assert!(first.id.ends_with("-0"));
    }

    #[test]
    fn test_seed_changes_ids() {
        let a = MemoryNexus::new(Params::default(), vec![1]);
        let b = MemoryNexus::new(Params::default(), vec![2]);
        assert_ne!(a.generate_message_id().id, b.generate_message_id().id);
    }

    #[test]
    fn test_rejects_duplicate_and_non_approved_messages() {
        let nexus = MemoryNexus::default();
        let msg = message(&nexus, "Ethereum");

        nexus.set_new_message(msg.clone()).unwrap();
        assert!(matches!(nexus.set_new_message(msg.clone()), Err(Error::Registry(_))));

        let mut executed = message(&nexus, "Ethereum");
        executed.status = MessageStatus::Executed;
        assert!(matches!(nexus.set_new_message(executed), Err(Error::Registry(_))));
    }

    #[test]
    fn test_route_marks_processing_and_queues() {
        let nexus = MemoryNexus::default();
        nexus.register_chain(chain("Ethereum"));
        let msg = message(&nexus, "Ethereum");
        nexus.set_new_message(msg.clone()).unwrap();

        nexus.route_message(&msg.id, &[]).unwrap();

        assert_eq!(nexus.get_message(&msg.id).unwrap().status, MessageStatus::Processing);
        assert_eq!(nexus.outbound(&"Ethereum".into()), vec![msg.id.clone()]);
        assert!(nexus.approved_messages().is_empty());

        // 已经在投递中的消息不能再次路由
        assert!(matches!(nexus.route_message(&msg.id, &[]), Err(Error::Routing(_))));
    }

    #[test]
    fn test_route_to_deactivated_chain_keeps_message_approved() {
        let nexus = MemoryNexus::default();
        nexus.register_chain(chain("Ethereum"));
        nexus.deactivate_chain(&"Ethereum".into());
        let msg = message(&nexus, "Ethereum");
        nexus.set_new_message(msg.clone()).unwrap();

        assert!(matches!(nexus.route_message(&msg.id, &[]), Err(Error::Routing(_))));
        assert_eq!(nexus.get_message(&msg.id).unwrap().status, MessageStatus::Approved);
        assert_eq!(nexus.approved_messages().len(), 1);

        nexus.activate_chain(&"Ethereum".into());
        nexus.route_message(&msg.id, &[]).unwrap();
    }

    #[test]
    fn test_set_message_failed() {
        let nexus = MemoryNexus::default();
        let msg = message(&nexus, "Ethereum");
        nexus.set_new_message(msg.clone()).unwrap();

        nexus.set_message_failed(&msg.id).unwrap();
        assert_eq!(nexus.get_message(&msg.id).unwrap().status, MessageStatus::Failed);
        assert!(nexus.set_message_failed(&msg.id).is_err());
        assert!(nexus.set_message_failed("missing").is_err());
    }

    #[test]
    fn test_route_attempts_are_counted_per_message() {
        let nexus = MemoryNexus::default();
        let msg = message(&nexus, "Ethereum");
        nexus.set_new_message(msg.clone()).unwrap();

        assert_eq!(nexus.record_route_attempt(&msg.id).unwrap(), 1);
        assert_eq!(nexus.record_route_attempt(&msg.id).unwrap(), 2);
        assert!(matches!(nexus.record_route_attempt("missing"), Err(Error::Registry(_))));
    }

    #[test]
    fn test_save_and_load_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let nexus = MemoryNexus::new(Params { gateway: "gw".into() }, vec![9]);
        nexus.register_chain(chain("Ethereum"));
        let msg = message(&nexus, "Ethereum");
        nexus.set_new_message(msg.clone()).unwrap();
        nexus.record_route_attempt(&msg.id).unwrap();
        nexus.save(&path).unwrap();

        let restored = MemoryNexus::load(&path).unwrap();
        assert_eq!(restored.get_params().gateway, Address::from("gw"));
        assert_eq!(restored.get_message(&msg.id), Some(msg.clone()));
        assert_eq!(restored.record_route_attempt(&msg.id).unwrap(), 2);
        assert_eq!(restored.chains().len(), 1);
        // nonce 继续递增，不会重复发放
        assert_eq!(restored.generate_message_id().nonce, 1);
    }
}
