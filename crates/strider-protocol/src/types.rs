//! 控制信道消息类型定义
//!
//! 所有在线缆上往返的消息都包装在 [`Envelope`] 中：时间戳、设备身份、
//! 消息类型标签、一个载荷变体，以及尾部的 CRC-32 校验和。
//!
//! 设计要点：
//! - 载荷使用 sum type（[`Payload`]），每个消息类型标签恰好对应一个变体，
//!   访问是穷尽的、编译期检查的（取代"全部字段可空、只填一个"的旧约定）
//! - 整数标签枚举通过 `num_enum` 转换，未知值不会 panic
//! - Envelope 是不可变值对象，每次收发事件创建一个新实例

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 设备类型
///
/// 标识信道一端的设备角色。`set_mode` 等角色受限的操作
/// 只接受 [`DeviceType::RemoteController`] 身份。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DeviceType {
    /// 未指定
    #[default]
    Unspecified = 0,
    /// 机器人侧控制进程
    Server = 1,
    /// 导航模块
    Navigation = 2,
    /// 遥控器（操作员设备）
    RemoteController = 3,
}

/// 机器人运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RobotMode {
    #[default]
    Unspecified = 0,
    /// 自主模式
    Auto = 1,
    /// 手动遥控模式
    Manual = 2,
}

/// 机器人控制模式（站立/趴下等姿态级状态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ControlMode {
    #[default]
    Unspecified = 0,
    /// 阻尼/脱力
    Passive = 1,
    /// 站立
    StandUp = 2,
    /// 趴下
    LieDown = 3,
}

/// 消息类型标签
///
/// 选择 [`Payload`] 的唯一变体。未知标签在解码侧被跳过（前向兼容）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MessageType {
    #[default]
    Unspecified = 0,
    Heartbeat = 1,
    BatteryInfo = 2,
    ModeSet = 3,
    ControlModeSet = 4,
    VelocityCommand = 5,
    CurrentMode = 6,
    CurrentControlMode = 7,
    Odometry = 8,
}

/// 三维向量（wire 上为 3 个 f32，小端）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 单位四元数姿态（wire 上为 4 个 f32，小端，x/y/z/w 顺序）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

/// 消息载荷（tagged union）
///
/// 每个变体对应一个 [`MessageType`] 标签。接收侧收到未知标签时
/// 解码为 [`Payload::Unknown`]，既不进入状态缓存也不再向上分发。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Payload {
    /// 心跳（双向）。服务端心跳携带其视角下的连通标志。
    Heartbeat { is_connected: bool },
    /// 电池遥测
    BatteryInfo {
        /// 电量（服务端上报的原始值，缓存时钳制到 0-100）
        level: i32,
        voltage: f32,
        current: f32,
        temperature: f32,
    },
    /// 设置运行模式（遥控器 → 机器人）
    ModeSet { mode: RobotMode },
    /// 设置控制模式（遥控器 → 机器人）
    ControlModeSet { mode: ControlMode },
    /// 速度指令（遥控器 → 机器人）
    VelocityCommand { vx: f32, vy: f32, yaw_rate: f32 },
    /// 机器人当前运行模式（机器人 → 遥控器）
    CurrentMode { mode: RobotMode },
    /// 机器人当前控制模式（机器人 → 遥控器）
    CurrentControlMode { mode: ControlMode },
    /// 里程计遥测（机器人 → 遥控器）
    Odometry {
        position: Vec3,
        orientation: Quaternion,
        linear_vel: Vec3,
        angular_vel: Vec3,
    },
    /// 未知消息类型（保留原始标签，仅用于诊断）
    Unknown { tag: u8 },
}

impl Payload {
    /// 载荷对应的消息类型标签
    ///
    /// [`Payload::Unknown`] 返回 [`MessageType::Unspecified`]；
    /// 其原始标签通过 [`Payload::raw_tag`] 获取。
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::Heartbeat { .. } => MessageType::Heartbeat,
            Payload::BatteryInfo { .. } => MessageType::BatteryInfo,
            Payload::ModeSet { .. } => MessageType::ModeSet,
            Payload::ControlModeSet { .. } => MessageType::ControlModeSet,
            Payload::VelocityCommand { .. } => MessageType::VelocityCommand,
            Payload::CurrentMode { .. } => MessageType::CurrentMode,
            Payload::CurrentControlMode { .. } => MessageType::CurrentControlMode,
            Payload::Odometry { .. } => MessageType::Odometry,
            Payload::Unknown { .. } => MessageType::Unspecified,
        }
    }

    /// wire 上的原始消息类型标签
    pub fn raw_tag(&self) -> u8 {
        match self {
            Payload::Unknown { tag } => *tag,
            other => other.message_type().into(),
        }
    }
}

/// 顶层 wire 消息
///
/// 不可变值对象：每次发送/接收事件创建一个，签名（CRC 填充）通过
/// [`crate::codec::sign`] 返回新实例完成。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Envelope {
    /// 单调毫秒时间戳（进程启动起算，非 UNIX 时间）
    pub timestamp_ms: u64,
    /// 发送端设备类型
    pub device_type: DeviceType,
    /// 发送端设备 ID（每个客户端实例固定，形如 `"pilot_a1b2c3d4"`）
    pub device_id: String,
    /// 消息载荷（恰好一个变体）
    pub payload: Payload,
    /// CRC-32 校验和（对 crc32 字段置零后的序列化形式计算）
    pub crc32: u32,
}

impl Envelope {
    /// 构造一个未签名的 Envelope（`crc32 = 0`）
    ///
    /// 发送前必须经过 [`crate::codec::sign`]。
    pub fn new(
        timestamp_ms: u64,
        identity: &DeviceIdentity,
        payload: Payload,
    ) -> Self {
        Self {
            timestamp_ms,
            device_type: identity.device_type,
            device_id: identity.device_id.clone(),
            payload,
            crc32: 0,
        }
    }

    /// 消息类型标签（从载荷推导，保证"恰好一个载荷"不变量）
    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }
}

/// 设备身份：客户端构造时固定的 `(device_type, device_id)` 对
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceIdentity {
    pub device_type: DeviceType,
    pub device_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_tags_are_stable() {
        // wire 兼容性：标签值一旦发布不可变更
        assert_eq!(u8::from(MessageType::Heartbeat), 1);
        assert_eq!(u8::from(MessageType::BatteryInfo), 2);
        assert_eq!(u8::from(MessageType::ModeSet), 3);
        assert_eq!(u8::from(MessageType::ControlModeSet), 4);
        assert_eq!(u8::from(MessageType::VelocityCommand), 5);
        assert_eq!(u8::from(MessageType::CurrentMode), 6);
        assert_eq!(u8::from(MessageType::CurrentControlMode), 7);
        assert_eq!(u8::from(MessageType::Odometry), 8);
    }

    #[test]
    fn test_payload_message_type_mapping() {
        assert_eq!(
            Payload::Heartbeat { is_connected: true }.message_type(),
            MessageType::Heartbeat
        );
        assert_eq!(
            Payload::VelocityCommand {
                vx: 0.0,
                vy: 0.0,
                yaw_rate: 0.0
            }
            .message_type(),
            MessageType::VelocityCommand
        );
        assert_eq!(
            Payload::Unknown { tag: 42 }.message_type(),
            MessageType::Unspecified
        );
        assert_eq!(Payload::Unknown { tag: 42 }.raw_tag(), 42);
    }

    #[test]
    fn test_device_type_try_from() {
        assert_eq!(DeviceType::try_from(3).unwrap(), DeviceType::RemoteController);
        assert!(DeviceType::try_from(200).is_err());
    }

    #[test]
    fn test_envelope_new_is_unsigned() {
        let identity = DeviceIdentity {
            device_type: DeviceType::RemoteController,
            device_id: "pilot_00000000".to_string(),
        };
        let envelope = Envelope::new(123, &identity, Payload::Heartbeat { is_connected: false });
        assert_eq!(envelope.crc32, 0);
        assert_eq!(envelope.timestamp_ms, 123);
        assert_eq!(envelope.device_type, DeviceType::RemoteController);
        assert_eq!(envelope.message_type(), MessageType::Heartbeat);
    }
}
