use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::{
    handler::MessageHandler,
    nexus::{ChainRegistry, ConfigStore, MessageRegistry, Router},
    types::{Address, Chain, CrossChainMessage, Endpoint, GeneralMessage},
    Error, Result,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub message_id: String,
    pub id_bytes: Vec<u8>,
    pub nonce: u64,
    /// false 表示首次路由失败，消息仍以 Approved 状态保存，等待中继器重试
    pub routed: bool,
}

/// 处理网关合约发出的通用跨链消息
pub struct Messenger {
    config: Arc<dyn ConfigStore>,
    chains: Arc<dyn ChainRegistry>,
    messages: Arc<dyn MessageRegistry>,
    router: Arc<dyn Router>,
}

impl Messenger {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        chains: Arc<dyn ChainRegistry>,
        messages: Arc<dyn MessageRegistry>,
        router: Arc<dyn Router>,
    ) -> Self {
        Self {
            config,
            chains,
            messages,
            router,
        }
    }

    /// 所有协作者由同一个对象提供时的便捷构造
    pub fn from_nexus<N>(nexus: Arc<N>) -> Self
    where
        N: ConfigStore + ChainRegistry + MessageRegistry + Router + 'static,
    {
        Self::new(nexus.clone(), nexus.clone(), nexus.clone(), nexus)
    }

    pub fn decode(custom: &[u8]) -> Result<CrossChainMessage> {
        serde_json::from_slice(custom).map_err(|e| Error::UnknownMsg(e.to_string()))
    }

    pub fn dispatch_msg(&self, contract: &Address, custom: &[u8]) -> Result<DispatchResponse> {
        let req = Self::decode(custom)?;

        self.authorize(contract)?;

        let destination_chain = self
            .chains
            .get_chain(&req.destination_chain)
            .ok_or_else(|| Error::UnregisteredChain(req.destination_chain.clone()))?;

        let message_id = self.messages.generate_message_id();
        let msg = GeneralMessage::new(
            message_id.id.clone(),
            Endpoint {
                chain: Chain::from_source(req.source_chain),
                address: req.source_address,
            },
            Endpoint {
                chain: destination_chain,
                address: req.destination_address,
            },
            req.payload_hash,
            req.source_tx_id,
            req.source_tx_index,
        );

        debug!(
            "Storing general message {} from {} to {}",
            msg.id, msg.sender.chain.name, msg.recipient.chain.name
        );
        self.messages.set_new_message(msg)?;

        // 持久化即为可靠性边界，这里的路由失败只记录日志，消息留给中继器重试
        let routed = match self.router.route_message(&message_id.id, &[]) {
            Ok(()) => true,
            Err(e) => {
                info!("failed to route message {} due to error {}", message_id.id, e);
                false
            }
        };

        Ok(DispatchResponse {
            message_id: message_id.id,
            id_bytes: message_id.id_bytes,
            nonce: message_id.nonce,
            routed,
        })
    }

    fn authorize(&self, contract: &Address) -> Result<()> {
        let gateway = self.config.get_params().gateway;
        if gateway.is_empty() {
            return Err(Error::GatewayNotSet);
        }
        if &gateway != contract {
            return Err(Error::NotGateway(contract.clone()));
        }
        Ok(())
    }
}

impl MessageHandler for Messenger {
    fn dispatch_msg(&self, contract: &Address, custom: &[u8]) -> Result<DispatchResponse> {
        Messenger::dispatch_msg(self, contract, custom)
    }
}
