//! 客户端错误类型定义

use strider_link::LinkError;
use strider_protocol::ProtocolError;
use thiserror::Error;

/// 客户端同步返回的错误
///
/// 注意：连接级失败（传输耗尽、存活超时、验证超时）不走这里 ——
/// 它们只表现为状态迁移加一条日志，从不向调用方线程抛出。
#[derive(Error, Debug)]
pub enum ClientError {
    /// 协议违例（如非遥控器身份调用 `set_mode`），同步拒绝，无状态变化
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// 链路错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 协议编解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::ProtocolViolation("set_mode requires remote-controller".to_string());
        assert!(format!("{}", err).contains("Protocol violation"));

        let err: ClientError = LinkError::Timeout.into();
        assert!(matches!(err, ClientError::Link(LinkError::Timeout)));
    }
}
