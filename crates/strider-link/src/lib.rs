//! 链路适配层核心定义
//!
//! 提供统一的消息帧链路抽象：一条链路收发完整的二进制帧
//! （一帧一个 Envelope），不关心帧内容。当前后端为 TCP
//! （u32 小端长度前缀分帧）；`mock` feature 提供无网络的
//! 脚本化链路供测试使用。
//!
//! 设计要点：
//! - 收发拆分为 [`RxLink`] / [`TxLink`] 两个半部，分别被接收/发送
//!   工作线程独占，调用方线程从不直接触碰套接字
//! - `receive()` 带超时返回，[`LinkError::Timeout`] 是正常情况
//!   （轮询节奏由上层控制），其余错误按是否致命分类

use thiserror::Error;

pub mod tcp;

#[cfg(feature = "mock")]
pub mod mock;

pub use tcp::{TcpFrameLink, TcpLinkRx, TcpLinkTx, MAX_FRAME_LEN};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 底层 IO 错误（瞬态，由上层失败计数器决定是否升级）
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 读/写超时（非致命，可以重试）
    #[error("Link timeout")]
    Timeout,

    /// 对端关闭连接（致命）
    #[error("Connection closed by peer")]
    Closed,

    /// 帧长度超过上限（致命：说明流已失步）
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// 建立连接失败
    #[error("Connect failed: {0}")]
    Connect(String),
}

impl LinkError {
    /// 是否为致命错误（链路无法继续使用，应立即进入连接丢失处理）
    ///
    /// 非致命错误（超时、瞬态 IO）交给失败计数器累计。
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Closed | LinkError::FrameTooLarge { .. })
    }
}

/// 链路接收半部
///
/// 由接收工作线程独占。`receive()` 在配置的读超时内等待一个完整帧。
pub trait RxLink: Send {
    /// 接收一个完整帧
    ///
    /// # 错误
    /// - [`LinkError::Timeout`]: 超时内没有完整帧（正常，重试即可）
    /// - [`LinkError::Closed`]: 对端关闭
    /// - 其余：IO/分帧错误
    fn receive(&mut self) -> Result<Vec<u8>, LinkError>;
}

/// 链路发送半部
///
/// 由发送工作线程独占。
pub trait TxLink: Send {
    /// 发送一个完整帧
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_fatal_classification() {
        assert!(!LinkError::Timeout.is_fatal());
        assert!(!LinkError::Io(std::io::Error::other("transient")).is_fatal());
        assert!(LinkError::Closed.is_fatal());
        assert!(
            LinkError::FrameTooLarge {
                len: 1 << 30,
                max: MAX_FRAME_LEN
            }
            .is_fatal()
        );
    }
}
