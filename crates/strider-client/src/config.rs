//! 客户端配置
//!
//! 所有可配置项在构造时一次性传入（无全局可变配置对象）。
//! 时间窗口的默认值与机器人侧控制进程的标称节奏匹配：
//! 1 Hz 心跳、2 s 连接验证窗口、2.5 s 心跳响应窗口。

use crate::shaper::ShaperConfig;
use std::time::Duration;
use strider_protocol::DeviceType;

/// 客户端配置
///
/// # Example
///
/// ```
/// use strider_client::ClientConfig;
///
/// let config = ClientConfig {
///     host: "192.168.123.161".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.heartbeat_interval.as_millis(), 1000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// 机器人控制进程地址
    pub host: String,
    /// 控制信道端口
    pub port: u16,

    /// TCP 连接建立超时
    pub connect_timeout: Duration,
    /// 套接字读超时（接收线程单次阻塞上限）
    pub read_timeout: Duration,

    /// 心跳发送间隔
    pub heartbeat_interval: Duration,
    /// 连接验证窗口：此时间内服务端连通标志未翻转即判定超时
    pub verify_timeout: Duration,
    /// 心跳响应窗口：Connected 状态下入站心跳静默超过此值判定链路丢失
    pub response_timeout: Duration,
    /// 断开时等待工作线程退出的上限
    pub shutdown_timeout: Duration,

    /// 外发队列容量（超出时丢最旧）
    pub queue_capacity: usize,
    /// 连续失败阈值（达到即升级为 ConnectionFailed）
    pub failure_threshold: u32,
    /// 接收/验证线程的轮询间隔
    pub poll_interval: Duration,
    /// 发送线程单次队列等待上限
    pub pop_timeout: Duration,

    /// 设备 ID 前缀（实例 ID 形如 `"<prefix>_<random-8-hex>"`）
    pub device_id_prefix: String,
    /// 本端设备类型（`set_mode` 只接受 RemoteController）
    pub device_type: DeviceType,

    /// 速度指令整形阈值
    pub shaper: ShaperConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "192.168.123.161".to_string(),
            port: 5555,
            connect_timeout: Duration::from_millis(3000),
            read_timeout: Duration::from_millis(50),
            heartbeat_interval: Duration::from_millis(1000),
            verify_timeout: Duration::from_millis(2000),
            response_timeout: Duration::from_millis(2500),
            shutdown_timeout: Duration::from_secs(5),
            queue_capacity: 1000,
            failure_threshold: 3,
            poll_interval: Duration::from_millis(10),
            pop_timeout: Duration::from_millis(100),
            device_id_prefix: "pilot".to_string(),
            device_type: DeviceType::RemoteController,
            shaper: ShaperConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 5555);
        assert_eq!(config.heartbeat_interval, Duration::from_millis(1000));
        assert_eq!(config.verify_timeout, Duration::from_millis(2000));
        assert_eq!(config.response_timeout, Duration::from_millis(2500));
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.device_type, DeviceType::RemoteController);
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = ClientConfig {
            host: "10.0.0.7".to_string(),
            port: 9000,
            ..Default::default()
        };
        let cloned = config.clone();
        assert_eq!(cloned, config);
    }
}
