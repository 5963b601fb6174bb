use crate::{
    config::Params,
    types::{Chain, ChainName, GeneralMessage, MessageId, RoutingContext},
    Result,
};

/// 参数存储，网关地址可能随治理提案变更，每次调用都重新读取
#[cfg_attr(test, mockall::automock)]
pub trait ConfigStore: Send + Sync {
    fn get_params(&self) -> Params;
}

/// 链注册表，按名称精确查找目标链
#[cfg_attr(test, mockall::automock)]
pub trait ChainRegistry: Send + Sync {
    fn get_chain(&self, name: &ChainName) -> Option<Chain>;
}

/// 消息注册表，负责发放消息 ID 并持久化消息
#[cfg_attr(test, mockall::automock)]
pub trait MessageRegistry: Send + Sync {
    /// 每次调用都会消耗一个 nonce，失败的分发不会归还
    fn generate_message_id(&self) -> MessageId;

    fn set_new_message(&self, message: GeneralMessage) -> Result<()>;

    /// 已持久化但尚未路由成功的消息
    fn approved_messages(&self) -> Vec<GeneralMessage>;

    /// 记录一次失败的路由尝试，返回累计次数
    fn record_route_attempt(&self, id: &str) -> Result<u32>;

    fn set_message_failed(&self, id: &str) -> Result<()>;
}

/// 路由器，把已持久化的消息交给目标链的投递通道
#[cfg_attr(test, mockall::automock)]
pub trait Router: Send + Sync {
    fn route_message(&self, id: &str, routing_ctx: &[RoutingContext]) -> Result<()>;
}

pub mod memory;

pub use memory::MemoryNexus;
