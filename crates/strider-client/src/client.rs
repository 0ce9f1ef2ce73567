//! 控制信道客户端
//!
//! 对外的 [`StriderClient`]：拥有连接状态机与工作线程会话，
//! 把"连接生命周期 + 指令发送 + 状态读取"封装成一个实例对象
//! （显式按引用传递给各消费方，不使用任何进程级全局状态）。
//!
//! 生命周期语义：
//! - `connect()`：从终止态 CAS 到 Connecting，打开套接字、重置
//!   计数器与监视器、启动三个工作线程，然后由验证线程异步等待
//!   服务端连通标志翻转（成功 → Connected；窗口耗尽 →
//!   ConnectionTimeout；期间任何连接级失败 → ConnectionFailed）
//! - `disconnect()`：清除运行标志、带界限地 join 所有线程、释放
//!   套接字、清空外发队列；在终止态调用是记日志的空操作
//! - 指令发送（`send_velocity`/`set_mode` 等）是 fire-and-forget
//!   入队，不设超时；只有生命周期操作有时间界限

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::identity::generate_identity;
use crate::shaper::CommandShaper;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use strider_driver::{
    heartbeat_loop, now_millis, rx_loop, tx_loop, ClientEvent, ConnectionState, LinkContext,
    OutboundQueue, RemoteState, StateCell, WorkerShared,
};
use strider_link::TcpFrameLink;
use strider_protocol::{
    codec, ControlMode, DeviceIdentity, DeviceType, Envelope, Payload, RobotMode,
};
use tracing::{debug, error, info, trace, warn};

/// 一次连接尝试对应的线程会话
///
/// 运行标志随会话创建，避免旧会话的残余线程观察到新会话的标志。
struct WorkerSession {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

/// Strider 控制信道客户端（对外 API）
pub struct StriderClient {
    config: ClientConfig,
    identity: DeviceIdentity,
    shaper: CommandShaper,
    /// 权威连接状态
    state: Arc<StateCell>,
    /// 缓存/监视/失败计数
    ctx: Arc<LinkContext>,
    /// 外发帧队列
    queue: Arc<OutboundQueue>,
    event_tx: Sender<ClientEvent>,
    event_rx: Receiver<ClientEvent>,
    session: Mutex<Option<WorkerSession>>,
}

impl StriderClient {
    /// 创建客户端实例
    ///
    /// 只分配资源、生成设备身份，不做任何网络操作。
    pub fn new(config: ClientConfig) -> Self {
        let identity = generate_identity(config.device_type, &config.device_id_prefix);
        info!(
            "Client created: device_id={}, endpoint={}:{}",
            identity.device_id, config.host, config.port
        );
        let (event_tx, event_rx) = unbounded();
        Self {
            identity,
            shaper: CommandShaper::new(config.shaper.clone()),
            state: Arc::new(StateCell::new()),
            ctx: Arc::new(LinkContext::new(
                config.response_timeout,
                config.failure_threshold,
            )),
            queue: Arc::new(OutboundQueue::new(config.queue_capacity)),
            event_tx,
            event_rx,
            session: Mutex::new(None),
            config,
        }
    }

    // ==================== 生命周期 ====================

    /// 发起连接
    ///
    /// 仅在终止态（Disconnected / ConnectionFailed / ConnectionTimeout）
    /// 生效；Connecting/Connected 下重复调用记日志后忽略（恰好创建
    /// 一个套接字）。套接字打开失败直接落入 ConnectionFailed。
    pub fn connect(&self) {
        let Some(prev) = self.state.transition_from_any(
            &[
                ConnectionState::Disconnected,
                ConnectionState::ConnectionFailed,
                ConnectionState::ConnectionTimeout,
            ],
            ConnectionState::Connecting,
        ) else {
            info!("connect() ignored: connection is {}", self.state.load());
            return;
        };
        debug!("Connection state: {} -> Connecting", prev);
        self.emit_state(ConnectionState::Connecting);

        // 回收上一个会话的线程（其运行标志在进入终止态时已清除）
        self.teardown_session(self.config.shutdown_timeout);
        self.ctx.reset();
        self.queue.clear();

        let link = match TcpFrameLink::connect(
            &self.config.host,
            self.config.port,
            self.config.connect_timeout,
            self.config.read_timeout,
        ) {
            Ok(link) => link,
            Err(e) => {
                error!("Socket open failed: {}", e);
                self.fail_connecting();
                return;
            },
        };
        let (rx, tx) = match link.split() {
            Ok(halves) => halves,
            Err(e) => {
                error!("Socket split failed: {}", e);
                self.fail_connecting();
                return;
            },
        };

        let running = Arc::new(AtomicBool::new(true));
        let shared = WorkerShared {
            running: running.clone(),
            state: self.state.clone(),
            ctx: self.ctx.clone(),
            queue: self.queue.clone(),
            events: self.event_tx.clone(),
        };

        let mut handles = Vec::with_capacity(4);
        {
            let shared = shared.clone();
            let poll = self.config.poll_interval;
            handles.push(thread::spawn(move || rx_loop(rx, shared, poll)));
        }
        {
            let shared = shared.clone();
            let pop = self.config.pop_timeout;
            handles.push(thread::spawn(move || tx_loop(tx, shared, pop)));
        }
        {
            let shared = shared.clone();
            let identity = self.identity.clone();
            let interval = self.config.heartbeat_interval;
            handles.push(thread::spawn(move || heartbeat_loop(shared, identity, interval)));
        }
        {
            let identity = self.identity.clone();
            let window = self.config.verify_timeout;
            let poll = self.config.poll_interval;
            handles.push(thread::spawn(move || {
                verification_loop(shared, identity, window, poll)
            }));
        }

        *self.session.lock() = Some(WorkerSession { running, handles });

        // 并发 disconnect() 可能在建立期间抢先迁移了状态：
        // 此时本会话已无归属，立即拆除
        if self.state.load().is_terminal() {
            warn!("Connection was torn down concurrently during connect()");
            self.teardown_session(self.config.shutdown_timeout);
        }
    }

    /// 断开连接
    ///
    /// Connecting/Connected → Disconnected；终止态下是空操作。
    /// 在 `shutdown_timeout` 内等待所有工作线程观察到取消并退出，
    /// 之后释放套接字、清空外发队列。
    pub fn disconnect(&self) {
        let Some(prev) = self.state.transition_from_any(
            &[ConnectionState::Connecting, ConnectionState::Connected],
            ConnectionState::Disconnected,
        ) else {
            debug!("disconnect() ignored in state {}", self.state.load());
            return;
        };
        info!("Disconnecting (was {})", prev);
        self.teardown_session(self.config.shutdown_timeout);
        self.queue.clear();
        self.emit_state(ConnectionState::Disconnected);
    }

    fn fail_connecting(&self) {
        if self.state.transition(
            ConnectionState::Connecting,
            ConnectionState::ConnectionFailed,
        ) {
            self.emit_state(ConnectionState::ConnectionFailed);
        }
    }

    /// 停止并回收当前会话的线程（有界等待）
    fn teardown_session(&self, timeout: Duration) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        session.running.store(false, Ordering::Release);
        let deadline = Instant::now() + timeout;
        for handle in session.handles {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    error!("Worker thread panicked during shutdown");
                }
            } else {
                warn!("Worker thread did not stop within shutdown timeout");
            }
        }
    }

    fn emit_state(&self, state: ConnectionState) {
        let _ = self.event_tx.send(ClientEvent::StateChanged(state));
    }

    // ==================== 指令发送（fire-and-forget）====================

    /// 设置机器人运行模式
    ///
    /// 仅遥控器身份可用；其它设备类型同步拒绝，无状态变化。
    pub fn set_mode(&self, mode: RobotMode) -> Result<(), ClientError> {
        if self.identity.device_type != DeviceType::RemoteController {
            warn!(
                "set_mode rejected: device type {:?} is not a remote controller",
                self.identity.device_type
            );
            return Err(ClientError::ProtocolViolation(format!(
                "set_mode requires a remote-controller identity, got {:?}",
                self.identity.device_type
            )));
        }
        self.enqueue(Payload::ModeSet { mode });
        Ok(())
    }

    /// 设置机器人控制模式（站立/趴下/阻尼）
    pub fn set_control_mode(&self, mode: ControlMode) {
        self.enqueue(Payload::ControlModeSet { mode });
    }

    /// 发送速度指令
    ///
    /// 各轴先经过死区/饱和整形（见 [`crate::shaper`]）再编码入队。
    pub fn send_velocity(&self, vx: f32, vy: f32, yaw_rate: f32) {
        let (vx, vy, yaw_rate) = self.shaper.shape(vx, vy, yaw_rate);
        self.enqueue(Payload::VelocityCommand { vx, vy, yaw_rate });
    }

    /// 发送一条心跳帧
    ///
    /// 心跳线程会周期性调用同一路径；此方法额外暴露给诊断场景。
    pub fn send_heartbeat(&self) {
        let connected = self.state.load() == ConnectionState::Connected;
        self.enqueue(Payload::Heartbeat {
            is_connected: connected,
        });
    }

    fn enqueue(&self, payload: Payload) {
        trace!("Enqueueing {:?} command", payload.message_type());
        let envelope = codec::sign(Envelope::new(now_millis(), &self.identity, payload));
        self.queue.push(codec::encode(&envelope));
    }

    // ==================== 状态读取 ====================

    /// 当前连接状态（无锁）
    pub fn connection_state(&self) -> ConnectionState {
        self.state.load()
    }

    /// 远端状态快照（无锁，返回副本）
    pub fn remote_state(&self) -> RemoteState {
        self.ctx.remote.snapshot()
    }

    /// 事件接收端
    ///
    /// 上层在自己的线程/节奏里消费 [`ClientEvent`]；协议引擎
    /// 从不直接回调上层代码。
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.event_rx.clone()
    }

    /// 本实例的设备身份
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// 因回压被丢弃的外发帧总数（诊断用）
    pub fn outbound_dropped(&self) -> u64 {
        self.queue.dropped_count()
    }
}

impl Drop for StriderClient {
    fn drop(&mut self) {
        // 与 disconnect() 相同的有界拆除，避免套接字上的 use-after-close
        self.teardown_session(self.config.shutdown_timeout);
    }
}

// ==================== 连接验证 ====================

/// 连接验证线程
///
/// 先经发送路径发出一条心跳促使服务端应答，然后在验证窗口内
/// 轮询服务端连通标志：翻转为 true → Connected；窗口耗尽 →
/// ConnectionTimeout（清除运行标志，工作线程随之退出、套接字释放）。
/// 验证期间发生的连接级失败由工作线程的丢失路径处理
/// （Connecting → ConnectionFailed），此线程观察到后直接退出。
fn verification_loop(
    shared: WorkerShared,
    identity: DeviceIdentity,
    window: Duration,
    poll_interval: Duration,
) {
    debug!("Connection verification started ({:?} window)", window);
    let hello = codec::sign(Envelope::new(
        now_millis(),
        &identity,
        Payload::Heartbeat {
            is_connected: false,
        },
    ));
    shared.queue.push(codec::encode(&hello));

    let deadline = Instant::now() + window;
    while Instant::now() < deadline {
        // 运行标志属于本会话：被清除（超时/失败/断开）即放弃验证，
        // 绝不触碰后续会话的状态
        if !shared.running.load(Ordering::Acquire) {
            trace!("Verification aborted: session stopped");
            return;
        }
        match shared.state.load() {
            ConnectionState::Connecting => {},
            other => {
                trace!("Verification aborted: state is {}", other);
                return;
            },
        }
        if shared.ctx.remote.snapshot().server_connected {
            if shared
                .state
                .transition(ConnectionState::Connecting, ConnectionState::Connected)
            {
                info!("Connection verified, channel is up");
                let _ = shared
                    .events
                    .send(ClientEvent::StateChanged(ConnectionState::Connected));
            }
            return;
        }
        spin_sleep::sleep(poll_interval);
    }

    if shared.running.load(Ordering::Acquire)
        && shared.state.transition(
            ConnectionState::Connecting,
            ConnectionState::ConnectionTimeout,
        )
    {
        warn!("Connection verification timed out after {:?}", window);
        shared.running.store(false, Ordering::Release);
        let _ = shared
            .events
            .send(ClientEvent::StateChanged(ConnectionState::ConnectionTimeout));
    }
}
