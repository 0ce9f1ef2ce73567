//! Strider SDK - 足式机器人控制信道客户端
//!
//! 让操作员设备（遥控器/导航端）通过一条面向消息的 TCP 连接
//! 与足式机器人控制进程交换低延迟、可容忍丢帧的指令与遥测。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`strider-protocol`): Envelope 二进制编解码 + CRC-32 完整性
//! - **链路层** (`strider-link`): 帧链路抽象，TCP 后端（长度前缀分帧）
//! - **驱动层** (`strider-driver`): 接收/发送/心跳三个工作线程、
//!   外发队列（丢最旧回压）、远端状态缓存、存活监视
//! - **客户端层** (本 crate): 连接状态机、指令整形与发送、事件 channel
//!
//! # 快速开始
//!
//! ```no_run
//! use strider_client::{ClientConfig, ClientEvent, StriderClient};
//!
//! let client = StriderClient::new(ClientConfig {
//!     host: "192.168.123.161".to_string(),
//!     ..Default::default()
//! });
//! client.connect();
//!
//! // 上层按自己的节奏消费事件
//! for event in client.events().iter() {
//!     match event {
//!         ClientEvent::StateChanged(state) => println!("state: {}", state),
//!         ClientEvent::Message(envelope) => println!("message: {:?}", envelope.message_type()),
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod shaper;

pub use client::StriderClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use logging::init_logging;
pub use shaper::{CommandShaper, ShaperConfig};

// 驱动层常用类型
pub use strider_driver::{ClientEvent, ConnectionState, RemoteState};

// 协议层常用类型
pub use strider_protocol::{
    ControlMode, DeviceIdentity, DeviceType, Envelope, MessageType, Payload, ProtocolError,
    Quaternion, RobotMode, Vec3,
};
