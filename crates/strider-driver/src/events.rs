//! 客户端事件
//!
//! 工作线程与上层应用之间的显式消息边界：协议引擎不直接回调
//! UI 代码，而是把类型化事件发布到一条 channel，上层按自己的
//! 节奏消费（线程安全与 UI 状态解耦）。

use crate::connection::ConnectionState;
use strider_protocol::Envelope;

/// 发布给上层应用的事件
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// 连接状态迁移（每次迁移恰好一条）
    StateChanged(ConnectionState),
    /// 一条通过完整性验证的入站消息
    Message(Envelope),
}
