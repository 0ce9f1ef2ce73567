//! 设备身份生成
//!
//! 每个客户端实例在构造时生成一次身份，之后不可变：
//! `device_id` 形如 `"<prefix>_<random-8-hex>"`。

use strider_protocol::{DeviceIdentity, DeviceType};

/// 生成一个客户端实例身份
pub fn generate_identity(device_type: DeviceType, prefix: &str) -> DeviceIdentity {
    DeviceIdentity {
        device_type,
        device_id: format!("{}_{:08x}", prefix, rand::random::<u32>()),
    }
}
