pub mod config;
pub mod types;
pub mod nexus;
pub mod messenger;
pub mod handler;
pub mod relayer;

pub use config::Config;
pub use handler::{HandlerChain, MessageHandler};
pub use messenger::{DispatchResponse, Messenger};
pub use nexus::MemoryNexus;
pub use types::{CrossChainMessage, GeneralMessage, MessageStatus};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownMsg,
    Validation,
    Registry,
    Routing,
    Config,
    Serialization,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The payload is not a message this handler understands; another handler may try it.
    #[error("unknown message: {0}")]
    UnknownMsg(String),

    #[error("gateway is not set")]
    GatewayNotSet,

    #[error("contract {0} is not the gateway")]
    NotGateway(types::Address),

    #[error("recipient chain {0} is not a registered chain")]
    UnregisteredChain(types::ChainName),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownMsg(_) => ErrorKind::UnknownMsg,
            Error::GatewayNotSet | Error::NotGateway(_) | Error::UnregisteredChain(_) => {
                ErrorKind::Validation
            }
            Error::Registry(_) => ErrorKind::Registry,
            Error::Routing(_) => ErrorKind::Routing,
            Error::Config(_) => ErrorKind::Config,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub fn is_unknown_msg(&self) -> bool {
        self.kind() == ErrorKind::UnknownMsg
    }
}
