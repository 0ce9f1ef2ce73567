//! Envelope 二进制编解码与 CRC-32 完整性校验
//!
//! Wire 布局（版本化 TLV，前向兼容）：
//!
//! ```text
//! [version: u8 = 0x01]
//! [tag: u8][len: u16 LE][value: len bytes]   × N
//! ```
//!
//! 字段标签：1 = timestamp (u64 LE)，2 = device_type (u8)，
//! 3 = device_id (UTF-8)，4 = message_type (u8)，
//! 5 = payload（按消息类型的定长小端布局），6 = crc32 (u32 LE，恒为末字段)。
//!
//! 解码侧跳过未知字段标签；未知消息类型解码为 [`Payload::Unknown`]。
//!
//! 校验和不变量：`crc32` 对"crc32 字段值置零后的序列化形式"计算，
//! 验证侧以同样方式重算并比较。

use crate::types::*;
use crate::ProtocolError;
use tracing::{trace, warn};

/// 当前 wire 版本
pub const WIRE_VERSION: u8 = 1;

const FIELD_TIMESTAMP: u8 = 1;
const FIELD_DEVICE_TYPE: u8 = 2;
const FIELD_DEVICE_ID: u8 = 3;
const FIELD_MESSAGE_TYPE: u8 = 4;
const FIELD_PAYLOAD: u8 = 5;
const FIELD_CRC32: u8 = 6;

// ==================== 编码 ====================

/// 序列化 Envelope 为字节流
///
/// 字段按标签升序写出，`crc32` 恒为末字段。本函数不计算校验和，
/// 写出的是 `envelope.crc32` 的当前值（签名见 [`sign`]）。
pub fn encode(envelope: &Envelope) -> Vec<u8> {
    let payload_body = encode_payload(&envelope.payload);
    let mut buf = Vec::with_capacity(40 + envelope.device_id.len() + payload_body.len());

    buf.push(WIRE_VERSION);
    put_field(&mut buf, FIELD_TIMESTAMP, &envelope.timestamp_ms.to_le_bytes());
    put_field(&mut buf, FIELD_DEVICE_TYPE, &[envelope.device_type.into()]);
    put_field(&mut buf, FIELD_DEVICE_ID, envelope.device_id.as_bytes());
    put_field(&mut buf, FIELD_MESSAGE_TYPE, &[envelope.payload.raw_tag()]);
    if !payload_body.is_empty() {
        put_field(&mut buf, FIELD_PAYLOAD, &payload_body);
    }
    put_field(&mut buf, FIELD_CRC32, &envelope.crc32.to_le_bytes());

    buf
}

fn put_field(buf: &mut Vec<u8>, tag: u8, value: &[u8]) {
    debug_assert!(value.len() <= u16::MAX as usize);
    buf.push(tag);
    buf.extend_from_slice(&(value.len() as u16).to_le_bytes());
    buf.extend_from_slice(value);
}

fn encode_payload(payload: &Payload) -> Vec<u8> {
    match payload {
        Payload::Heartbeat { is_connected } => vec![*is_connected as u8],
        Payload::BatteryInfo {
            level,
            voltage,
            current,
            temperature,
        } => {
            let mut body = Vec::with_capacity(16);
            body.extend_from_slice(&level.to_le_bytes());
            body.extend_from_slice(&voltage.to_le_bytes());
            body.extend_from_slice(&current.to_le_bytes());
            body.extend_from_slice(&temperature.to_le_bytes());
            body
        },
        Payload::ModeSet { mode } => vec![(*mode).into()],
        Payload::ControlModeSet { mode } => vec![(*mode).into()],
        Payload::VelocityCommand { vx, vy, yaw_rate } => {
            let mut body = Vec::with_capacity(12);
            body.extend_from_slice(&vx.to_le_bytes());
            body.extend_from_slice(&vy.to_le_bytes());
            body.extend_from_slice(&yaw_rate.to_le_bytes());
            body
        },
        Payload::CurrentMode { mode } => vec![(*mode).into()],
        Payload::CurrentControlMode { mode } => vec![(*mode).into()],
        Payload::Odometry {
            position,
            orientation,
            linear_vel,
            angular_vel,
        } => {
            let mut body = Vec::with_capacity(52);
            put_vec3(&mut body, position);
            put_quaternion(&mut body, orientation);
            put_vec3(&mut body, linear_vel);
            put_vec3(&mut body, angular_vel);
            body
        },
        // 未知载荷无法重构原始字节，只保留标签
        Payload::Unknown { .. } => Vec::new(),
    }
}

fn put_vec3(buf: &mut Vec<u8>, v: &Vec3) {
    buf.extend_from_slice(&v.x.to_le_bytes());
    buf.extend_from_slice(&v.y.to_le_bytes());
    buf.extend_from_slice(&v.z.to_le_bytes());
}

fn put_quaternion(buf: &mut Vec<u8>, q: &Quaternion) {
    buf.extend_from_slice(&q.x.to_le_bytes());
    buf.extend_from_slice(&q.y.to_le_bytes());
    buf.extend_from_slice(&q.z.to_le_bytes());
    buf.extend_from_slice(&q.w.to_le_bytes());
}

// ==================== 解码 ====================

/// 从字节流解析 Envelope
///
/// # 错误
/// - [`ProtocolError::UnsupportedVersion`]: 版本字节不匹配
/// - [`ProtocolError::Truncated`]: 字段边界处输入不足
/// - 其余变体：字段/载荷长度或取值非法
pub fn decode(bytes: &[u8]) -> Result<Envelope, ProtocolError> {
    let Some(&version) = bytes.first() else {
        return Err(ProtocolError::Truncated {
            needed: 1,
            remaining: 0,
        });
    };
    if version != WIRE_VERSION {
        return Err(ProtocolError::UnsupportedVersion { version });
    }

    let mut cursor = 1usize;
    let mut timestamp_ms = 0u64;
    let mut device_type = DeviceType::Unspecified;
    let mut device_id = String::new();
    let mut message_tag = 0u8;
    let mut payload_body: &[u8] = &[];
    let mut crc32 = 0u32;

    while cursor < bytes.len() {
        let remaining = bytes.len() - cursor;
        if remaining < 3 {
            return Err(ProtocolError::Truncated {
                needed: 3,
                remaining,
            });
        }
        let tag = bytes[cursor];
        let len = u16::from_le_bytes([bytes[cursor + 1], bytes[cursor + 2]]) as usize;
        cursor += 3;
        if bytes.len() - cursor < len {
            return Err(ProtocolError::Truncated {
                needed: len,
                remaining: bytes.len() - cursor,
            });
        }
        let value = &bytes[cursor..cursor + len];
        cursor += len;

        match tag {
            FIELD_TIMESTAMP => {
                timestamp_ms = u64::from_le_bytes(fixed::<8>("timestamp", value)?);
            },
            FIELD_DEVICE_TYPE => {
                let raw = fixed::<1>("device_type", value)?[0];
                // 未知设备类型不视为错误（前向兼容）
                device_type = DeviceType::try_from(raw).unwrap_or(DeviceType::Unspecified);
            },
            FIELD_DEVICE_ID => {
                device_id = std::str::from_utf8(value)
                    .map_err(|_| ProtocolError::InvalidDeviceId)?
                    .to_string();
            },
            FIELD_MESSAGE_TYPE => {
                message_tag = fixed::<1>("message_type", value)?[0];
            },
            FIELD_PAYLOAD => {
                payload_body = value;
            },
            FIELD_CRC32 => {
                crc32 = u32::from_le_bytes(fixed::<4>("crc32", value)?);
            },
            _ => {
                trace!("Skipping unknown field tag {} ({} bytes)", tag, len);
            },
        }
    }

    let payload = decode_payload(message_tag, payload_body)?;

    Ok(Envelope {
        timestamp_ms,
        device_type,
        device_id,
        payload,
        crc32,
    })
}

fn fixed<const N: usize>(
    field: &'static str,
    value: &[u8],
) -> Result<[u8; N], ProtocolError> {
    <[u8; N]>::try_from(value).map_err(|_| ProtocolError::InvalidFieldLength {
        field,
        expected: N,
        actual: value.len(),
    })
}

fn decode_payload(tag: u8, body: &[u8]) -> Result<Payload, ProtocolError> {
    let Ok(message_type) = MessageType::try_from(tag) else {
        // 未知消息类型：跳过载荷，保留标签供诊断
        return Ok(Payload::Unknown { tag });
    };

    match message_type {
        MessageType::Unspecified => Ok(Payload::Unknown { tag }),
        MessageType::Heartbeat => {
            let b = payload_exact::<1>(tag, body)?;
            Ok(Payload::Heartbeat {
                is_connected: b[0] != 0,
            })
        },
        MessageType::BatteryInfo => {
            let b = payload_exact::<16>(tag, body)?;
            Ok(Payload::BatteryInfo {
                level: i32::from_le_bytes([b[0], b[1], b[2], b[3]]),
                voltage: get_f32(&b, 4),
                current: get_f32(&b, 8),
                temperature: get_f32(&b, 12),
            })
        },
        MessageType::ModeSet => {
            let b = payload_exact::<1>(tag, body)?;
            Ok(Payload::ModeSet {
                mode: RobotMode::try_from(b[0]).unwrap_or_default(),
            })
        },
        MessageType::ControlModeSet => {
            let b = payload_exact::<1>(tag, body)?;
            Ok(Payload::ControlModeSet {
                mode: ControlMode::try_from(b[0]).unwrap_or_default(),
            })
        },
        MessageType::VelocityCommand => {
            let b = payload_exact::<12>(tag, body)?;
            Ok(Payload::VelocityCommand {
                vx: get_f32(&b, 0),
                vy: get_f32(&b, 4),
                yaw_rate: get_f32(&b, 8),
            })
        },
        MessageType::CurrentMode => {
            let b = payload_exact::<1>(tag, body)?;
            Ok(Payload::CurrentMode {
                mode: RobotMode::try_from(b[0]).unwrap_or_default(),
            })
        },
        MessageType::CurrentControlMode => {
            let b = payload_exact::<1>(tag, body)?;
            Ok(Payload::CurrentControlMode {
                mode: ControlMode::try_from(b[0]).unwrap_or_default(),
            })
        },
        MessageType::Odometry => {
            let b = payload_exact::<52>(tag, body)?;
            Ok(Payload::Odometry {
                position: get_vec3(&b, 0),
                orientation: Quaternion {
                    x: get_f32(&b, 12),
                    y: get_f32(&b, 16),
                    z: get_f32(&b, 20),
                    w: get_f32(&b, 24),
                },
                linear_vel: get_vec3(&b, 28),
                angular_vel: get_vec3(&b, 40),
            })
        },
    }
}

fn payload_exact<const N: usize>(tag: u8, body: &[u8]) -> Result<[u8; N], ProtocolError> {
    <[u8; N]>::try_from(body).map_err(|_| ProtocolError::InvalidPayloadLength {
        message_type: tag,
        expected: N,
        actual: body.len(),
    })
}

fn get_f32(b: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([b[offset], b[offset + 1], b[offset + 2], b[offset + 3]])
}

fn get_vec3(b: &[u8], offset: usize) -> Vec3 {
    Vec3 {
        x: get_f32(b, offset),
        y: get_f32(b, offset + 4),
        z: get_f32(b, offset + 8),
    }
}

// ==================== 校验和 ====================

/// CRC-32 校验和
///
/// IEEE 802.3 反射多项式 0xEDB88320，初值 0xFFFFFFFF，末异或 0xFFFFFFFF。
/// 参考向量：`checksum(b"123456789") == 0xCBF43926`。
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// 签名：填充 Envelope 的 crc32 字段
///
/// 将 `crc32` 置零、序列化、计算校验和，返回带校验和的新 Envelope。
pub fn sign(envelope: Envelope) -> Envelope {
    let mut signed = envelope;
    signed.crc32 = 0;
    signed.crc32 = checksum(&encode(&signed));
    signed
}

/// 验证：对 crc32 置零副本重算校验和并与存储值比较
///
/// 不匹配时记录两个值并返回 `false`，从不 panic —— 完整性失败
/// 是每帧可恢复的（丢弃该帧即可）。
pub fn verify(envelope: &Envelope) -> bool {
    let mut zeroed = envelope.clone();
    zeroed.crc32 = 0;
    let computed = checksum(&encode(&zeroed));
    if computed != envelope.crc32 {
        warn!(
            "CRC mismatch: stored=0x{:08X}, computed=0x{:08X}",
            envelope.crc32, computed
        );
        return false;
    }
    true
}
