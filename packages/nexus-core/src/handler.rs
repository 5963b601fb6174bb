use log::debug;
use crate::{messenger::DispatchResponse, types::Address, Error, Result};

/// 自定义消息处理器。无法识别消息格式时必须返回 `Error::UnknownMsg`，
/// 其余错误说明消息属于该处理器但校验失败
#[cfg_attr(test, mockall::automock)]
pub trait MessageHandler: Send + Sync {
    fn dispatch_msg(&self, contract: &Address, custom: &[u8]) -> Result<DispatchResponse>;
}

/// 依次尝试多个处理器，直到某个处理器认领该消息
#[derive(Default)]
pub struct HandlerChain {
    handlers: Vec<Box<dyn MessageHandler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Box<dyn MessageHandler>) -> Self {
        self.handlers.push(handler);
        self
    }
}

impl MessageHandler for HandlerChain {
    fn dispatch_msg(&self, contract: &Address, custom: &[u8]) -> Result<DispatchResponse> {
        for (i, handler) in self.handlers.iter().enumerate() {
            match handler.dispatch_msg(contract, custom) {
                Err(e) if e.is_unknown_msg() => {
                    debug!("Handler {} did not recognize message: {}", i, e);
                    continue;
                }
                result => return result,
            }
        }

        Err(Error::UnknownMsg(format!(
            "no handler among {} recognized the message",
            self.handlers.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> DispatchResponse {
        DispatchResponse {
            message_id: "1".to_string(),
            id_bytes: b"1".to_vec(),
            nonce: 1,
            routed: true,
        }
    }

    fn declining() -> MockMessageHandler {
        let mut handler = MockMessageHandler::new();
        handler
            .expect_dispatch_msg()
            .times(1)
            .returning(|_, _| Err(Error::UnknownMsg("not mine".to_string())));
        handler
    }

    #[test]
    fn test_falls_through_unknown_messages() {
        let mut accepting = MockMessageHandler::new();
        accepting.expect_dispatch_msg().times(1).returning(|_, _| Ok(response()));

        let chain = HandlerChain::new()
            .with_handler(Box::new(declining()))
            .with_handler(Box::new(accepting));

        assert_eq!(chain.dispatch_msg(&"gw".into(), b"{}").unwrap(), response());
    }

    #[test]
    fn test_validation_error_stops_the_chain() {
        let mut rejecting = MockMessageHandler::new();
        rejecting
            .expect_dispatch_msg()
            .times(1)
            .returning(|_, _| Err(Error::GatewayNotSet));
        let mut never = MockMessageHandler::new();
        never.expect_dispatch_msg().never();

        let chain = HandlerChain::new()
            .with_handler(Box::new(rejecting))
            .with_handler(Box::new(never));

        let err = chain.dispatch_msg(&"gw".into(), b"{}").unwrap_err();
        assert!(matches!(err, Error::GatewayNotSet));
    }

    #[test]
    fn test_all_handlers_decline() {
        let chain = HandlerChain::new()
            .with_handler(Box::new(declining()))
            .with_handler(Box::new(declining()));

        assert!(chain.dispatch_msg(&"gw".into(), b"[]").unwrap_err().is_unknown_msg());
        assert!(HandlerChain::new().dispatch_msg(&"gw".into(), b"[]").unwrap_err().is_unknown_msg());
    }
}
