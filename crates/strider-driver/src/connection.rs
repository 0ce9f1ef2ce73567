//! 连接状态单元
//!
//! 单一权威的连接状态枚举，存放在一个原子单元里：
//! 迁移只通过 compare-and-set 完成，保证并发调用方中同一时刻
//! 只有一个状态变更被接受，重复请求由调用侧记日志并忽略。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 连接生命周期状态
///
/// ```text
///  Disconnected ──connect()──► Connecting ──verified──► Connected
///       ▲                          │    │                   │
///       │                 timeout  │    │ failure           │ watchdog/failure
///       │                          ▼    ▼                   ▼
///       │              ConnectionTimeout  ConnectionFailed ◄┘
///       └───────────────── disconnect() ────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// 无连接（初始/终止态）
    #[default]
    Disconnected = 0,
    /// 套接字已打开，正在进行连接验证
    Connecting = 1,
    /// 验证通过，信道可用
    Connected = 2,
    /// 传输失败/存活超时导致的终止态
    ConnectionFailed = 3,
    /// 连接验证窗口内未得到服务端响应
    ConnectionTimeout = 4,
}

impl ConnectionState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::ConnectionFailed,
            4 => ConnectionState::ConnectionTimeout,
            _ => ConnectionState::Disconnected,
        }
    }

    /// 是否为终止态（可以从这里发起新的 `connect()`）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected
                | ConnectionState::ConnectionFailed
                | ConnectionState::ConnectionTimeout
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::ConnectionFailed => write!(f, "ConnectionFailed"),
            ConnectionState::ConnectionTimeout => write!(f, "ConnectionTimeout"),
        }
    }
}

/// 原子状态单元
///
/// 所有迁移走 compare-and-set；读取无锁。
pub struct StateCell {
    raw: AtomicU8,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            raw: AtomicU8::new(ConnectionState::Disconnected as u8),
        }
    }

    /// 当前状态
    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// 单源 compare-and-set 迁移
    ///
    /// 仅当当前状态等于 `from` 时迁移到 `to`，返回是否成功。
    pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.raw
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 多源 compare-and-set 迁移
    ///
    /// 当前状态属于 `from_any` 之一时迁移到 `to`，返回迁移前的状态；
    /// 否则返回 `None`（调用侧记日志并忽略）。
    pub fn transition_from_any(
        &self,
        from_any: &[ConnectionState],
        to: ConnectionState,
    ) -> Option<ConnectionState> {
        loop {
            let current = self.load();
            if !from_any.contains(&current) {
                return None;
            }
            if self.transition(current, to) {
                return Some(current);
            }
            // CAS 失败说明并发迁移抢先，重读后再判定
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_disconnected() {
        let cell = StateCell::new();
        assert_eq!(cell.load(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_transition_succeeds_from_expected_state() {
        let cell = StateCell::new();
        assert!(cell.transition(ConnectionState::Disconnected, ConnectionState::Connecting));
        assert_eq!(cell.load(), ConnectionState::Connecting);
    }

    #[test]
    fn test_transition_fails_from_wrong_state() {
        let cell = StateCell::new();
        assert!(!cell.transition(ConnectionState::Connected, ConnectionState::ConnectionFailed));
        assert_eq!(cell.load(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_transition_from_any() {
        let cell = StateCell::new();
        let prev = cell.transition_from_any(
            &[
                ConnectionState::Disconnected,
                ConnectionState::ConnectionFailed,
                ConnectionState::ConnectionTimeout,
            ],
            ConnectionState::Connecting,
        );
        assert_eq!(prev, Some(ConnectionState::Disconnected));

        // Connecting 不在允许源中：拒绝并保持现状
        let rejected = cell.transition_from_any(
            &[ConnectionState::Disconnected],
            ConnectionState::Connecting,
        );
        assert_eq!(rejected, None);
        assert_eq!(cell.load(), ConnectionState::Connecting);
    }

    #[test]
    fn test_only_one_concurrent_transition_wins() {
        use std::sync::Arc;
        let cell = Arc::new(StateCell::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = cell.clone();
            handles.push(std::thread::spawn(move || {
                cell.transition(ConnectionState::Disconnected, ConnectionState::Connecting)
            }));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(ConnectionState::ConnectionFailed.is_terminal());
        assert!(ConnectionState::ConnectionTimeout.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
    }
}
