//! Strider 协议层模块
//!
//! 负责控制信道消息（Envelope）的二进制编码/解码，
//! 以及 CRC-32 完整性校验。本层是纯函数式的，不持有任何 IO 或状态。

pub mod codec;
pub mod types;

pub use codec::{checksum, decode, encode, sign, verify, WIRE_VERSION};
pub use types::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// 输入在字段边界处被截断
    #[error("Truncated input: need {needed} bytes, only {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// 不支持的 wire 版本
    #[error("Unsupported wire version: 0x{version:02X}")]
    UnsupportedVersion { version: u8 },

    /// 字段长度与其类型不匹配
    #[error("Invalid length for field {field}: expected {expected}, got {actual}")]
    InvalidFieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// 载荷体长度与消息类型不匹配
    #[error("Invalid payload length for message type {message_type}: expected {expected}, got {actual}")]
    InvalidPayloadLength {
        message_type: u8,
        expected: usize,
        actual: usize,
    },

    /// 设备 ID 不是合法的 UTF-8
    #[error("Device id is not valid UTF-8")]
    InvalidDeviceId,

    /// 字段取值非法
    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: &'static str, value: u8 },
}
