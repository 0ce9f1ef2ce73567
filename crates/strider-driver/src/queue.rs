//! 外发帧队列
//!
//! 有界 FIFO，满时淘汰最旧一帧再插入新帧（drop-oldest）：
//! 控制指令的时效价值高于完整性，永远不阻塞调用方线程。
//! `pop` 带超时阻塞，供发送线程使用。

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

/// 有界外发队列（drop-oldest 回压策略）
pub struct OutboundQueue {
    inner: Mutex<VecDeque<Vec<u8>>>,
    available: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl OutboundQueue {
    /// 创建指定容量的队列
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// 非阻塞入队
    ///
    /// 队列满时淘汰最旧一帧再插入（丢弃计入 [`Self::dropped_count`]）。
    pub fn push(&self, frame: Vec<u8>) {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            trace!("Outbound queue full, dropped oldest frame (total dropped: {})", dropped);
        }
        queue.push_back(frame);
        drop(queue);
        self.available.notify_one();
    }

    /// 阻塞出队，最多等待 `timeout`
    ///
    /// 超时返回 `None`。
    pub fn pop(&self, timeout: Duration) -> Option<Vec<u8>> {
        let mut queue = self.inner.lock();
        if let Some(frame) = queue.pop_front() {
            return Some(frame);
        }
        // 等待期间可能被虚假唤醒，醒来后重查队列
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if self.available.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
            if let Some(frame) = queue.pop_front() {
                return Some(frame);
            }
        }
    }

    /// 清空队列（断开连接时调用）
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// 当前排队帧数
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// 因回压被丢弃的帧总数（诊断用）
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
