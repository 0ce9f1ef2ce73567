//! 远端状态缓存
//!
//! 接收线程独占写入、任意线程并发读取的"机器人最后已知状态"快照。
//! 各字段独立更新、无跨字段不变量；读取端拿到的是一个一致的
//! `RemoteState` 副本（ArcSwap 原子替换）。
//!
//! 同步机制：ArcSwap + rcu（每次更新克隆-修改-替换），
//! 读取无锁，适合 UI 以任意频率轮询。

use crate::monitor::{ConnectionMonitor, FailureTracker, now_millis};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use strider_protocol::{ControlMode, RobotMode};

/// 远端状态快照
///
/// 字段均为"最后一次收到"的值；`battery_percent` 在写入时钳制到
/// 0-100，其余电池遥测保留原始值。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteState {
    /// 机器人当前运行模式（来自 CurrentMode）
    pub mode: RobotMode,
    /// 机器人当前控制模式（来自 CurrentControlMode）
    pub control_mode: ControlMode,
    /// 电量百分比，0-100（来自 BatteryInfo，已钳制）
    pub battery_percent: u8,
    /// 电池电压（V）
    pub battery_voltage: f32,
    /// 电池电流（A）
    pub battery_current: f32,
    /// 电池温度（°C）
    pub battery_temperature: f32,
    /// 服务端上报的连通标志（来自 Heartbeat）
    pub server_connected: bool,
    /// 最后一次收到心跳的单调毫秒时间戳
    pub last_heartbeat_ms: u64,
}

/// 远端状态缓存（无锁快照）
pub struct RemoteStateCache {
    inner: ArcSwap<RemoteState>,
}

impl RemoteStateCache {
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(RemoteState::default()),
        }
    }

    /// 获取当前快照（无锁，返回副本）
    pub fn snapshot(&self) -> RemoteState {
        self.inner.load().as_ref().clone()
    }

    /// 心跳：更新连通标志与时间戳
    pub fn update_heartbeat(&self, is_connected: bool) {
        let now = now_millis();
        self.inner.rcu(|old| {
            let mut state = (**old).clone();
            state.server_connected = is_connected;
            state.last_heartbeat_ms = now;
            Arc::new(state)
        });
    }

    /// 电池遥测：百分比钳制到 0-100，其余原样保留
    pub fn update_battery(&self, level: i32, voltage: f32, current: f32, temperature: f32) {
        let percent = level.clamp(0, 100) as u8;
        self.inner.rcu(|old| {
            let mut state = (**old).clone();
            state.battery_percent = percent;
            state.battery_voltage = voltage;
            state.battery_current = current;
            state.battery_temperature = temperature;
            Arc::new(state)
        });
    }

    /// 当前运行模式
    pub fn update_mode(&self, mode: RobotMode) {
        self.inner.rcu(|old| {
            let mut state = (**old).clone();
            state.mode = mode;
            Arc::new(state)
        });
    }

    /// 当前控制模式
    pub fn update_control_mode(&self, mode: ControlMode) {
        self.inner.rcu(|old| {
            let mut state = (**old).clone();
            state.control_mode = mode;
            Arc::new(state)
        });
    }

    /// 重置为默认值（新连接尝试开始时调用）
    pub fn reset(&self) {
        self.inner.store(Arc::new(RemoteState::default()));
    }
}

impl Default for RemoteStateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// 链路共享上下文（所有工作线程共用）
pub struct LinkContext {
    /// 远端状态缓存
    pub remote: RemoteStateCache,
    /// 心跳存活监视
    pub monitor: ConnectionMonitor,
    /// 连续失败计数
    pub failures: FailureTracker,
}

impl LinkContext {
    pub fn new(response_timeout: Duration, failure_threshold: u32) -> Self {
        Self {
            remote: RemoteStateCache::new(),
            monitor: ConnectionMonitor::new(response_timeout),
            failures: FailureTracker::new(failure_threshold),
        }
    }

    /// 新连接尝试前重置所有可变状态
    pub fn reset(&self) {
        self.remote.reset();
        self.monitor.reset();
        self.failures.reset();
    }
}
