//! 脚本化内存链路（测试用，`mock` feature）
//!
//! 不依赖网络：测试端通过 [`MockLinkHandle`] 注入"对端发来"的帧、
//! 读取客户端已发送的帧、模拟对端关闭。收/发半部实现与 TCP 后端
//! 相同的 trait，可直接喂给工作线程。

use crate::{LinkError, RxLink, TxLink};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct MockShared {
    incoming: Mutex<VecDeque<Vec<u8>>>,
    sent: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    /// 模拟瞬态接收错误的剩余次数
    rx_faults: Mutex<u32>,
}

/// 创建一对 mock 链路半部和对应的测试句柄
pub fn mock_link() -> (MockLinkRx, MockLinkTx, MockLinkHandle) {
    let shared = Arc::new(MockShared::default());
    (
        MockLinkRx {
            shared: shared.clone(),
        },
        MockLinkTx {
            shared: shared.clone(),
        },
        MockLinkHandle { shared },
    )
}

/// mock 链路接收半部
pub struct MockLinkRx {
    shared: Arc<MockShared>,
}

impl RxLink for MockLinkRx {
    fn receive(&mut self) -> Result<Vec<u8>, LinkError> {
        {
            let mut faults = self.shared.rx_faults.lock();
            if *faults > 0 {
                *faults -= 1;
                return Err(LinkError::Io(std::io::Error::other("injected fault")));
            }
        }
        if let Some(frame) = self.shared.incoming.lock().pop_front() {
            return Ok(frame);
        }
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(LinkError::Closed);
        }
        Err(LinkError::Timeout)
    }
}

/// mock 链路发送半部
pub struct MockLinkTx {
    shared: Arc<MockShared>,
}

impl TxLink for MockLinkTx {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(LinkError::Closed);
        }
        self.shared.sent.lock().push(frame.to_vec());
        Ok(())
    }
}

/// 测试侧控制句柄
#[derive(Clone)]
pub struct MockLinkHandle {
    shared: Arc<MockShared>,
}

impl MockLinkHandle {
    /// 注入一帧"对端发来"的数据
    pub fn push_incoming(&self, frame: Vec<u8>) {
        self.shared.incoming.lock().push_back(frame);
    }

    /// 取走客户端已发送的所有帧
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.shared.sent.lock())
    }

    /// 已发送帧数
    pub fn sent_count(&self) -> usize {
        self.shared.sent.lock().len()
    }

    /// 注入 n 次瞬态接收错误
    pub fn inject_rx_faults(&self, n: u32) {
        *self.shared.rx_faults.lock() = n;
    }

    /// 模拟对端关闭连接
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_link_round_trip() {
        let (mut rx, mut tx, handle) = mock_link();

        assert!(matches!(rx.receive(), Err(LinkError::Timeout)));

        handle.push_incoming(b"inbound".to_vec());
        assert_eq!(rx.receive().unwrap(), b"inbound");

        tx.send(b"outbound").unwrap();
        assert_eq!(handle.take_sent(), vec![b"outbound".to_vec()]);
    }

    #[test]
    fn test_mock_link_close() {
        let (mut rx, mut tx, handle) = mock_link();
        handle.close();
        assert!(matches!(rx.receive(), Err(LinkError::Closed)));
        assert!(matches!(tx.send(b"x"), Err(LinkError::Closed)));
    }

    #[test]
    fn test_mock_link_injected_faults() {
        let (mut rx, _tx, handle) = mock_link();
        handle.inject_rx_faults(2);
        assert!(matches!(rx.receive(), Err(LinkError::Io(_))));
        assert!(matches!(rx.receive(), Err(LinkError::Io(_))));
        assert!(matches!(rx.receive(), Err(LinkError::Timeout)));
    }
}
