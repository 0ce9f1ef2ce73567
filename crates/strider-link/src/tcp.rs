//! TCP 帧链路后端
//!
//! 在一条外发 TCP 连接上承载消息帧：每帧一个 u32 小端长度前缀 +
//! 帧体。TCP 本身是字节流，接收侧用内部缓冲区累积字节并按前缀
//! 切帧，读超时落在帧边界之外不会丢失已到达的半帧。
//!
//! 连接建立后通过 `try_clone` 拆分为收/发两个半部，分别交给
//! 接收线程和发送线程独占。

use crate::{LinkError, RxLink, TxLink};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

/// 单帧最大长度（超过视为流失步）
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// 长度前缀字节数
const LEN_PREFIX: usize = 4;

/// TCP 帧链路（未拆分状态）
pub struct TcpFrameLink {
    stream: TcpStream,
}

impl TcpFrameLink {
    /// 建立到 `host:port` 的外发连接
    ///
    /// # 参数
    /// - `connect_timeout`: 连接建立超时
    /// - `io_timeout`: 读/写超时（决定 `receive()` 的阻塞上限）
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| LinkError::Connect(format!("resolve {}:{}: {}", host, port, e)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(Some(io_timeout))?;
                    stream.set_write_timeout(Some(io_timeout))?;
                    debug!("TCP link established to {}", addr);
                    return Ok(Self { stream });
                },
                Err(e) => {
                    trace!("Connect attempt to {} failed: {}", addr, e);
                    last_err = Some(e);
                },
            }
        }

        Err(match last_err {
            Some(e) => LinkError::Connect(format!("{}:{}: {}", host, port, e)),
            None => LinkError::Connect(format!("{}:{}: no addresses resolved", host, port)),
        })
    }

    /// 拆分为接收/发送两个半部
    ///
    /// 两个半部共享同一条底层连接（`try_clone`），任一半部释放
    /// 不会关闭连接，两者都释放后套接字关闭。
    pub fn split(self) -> Result<(TcpLinkRx, TcpLinkTx), LinkError> {
        let write_half = self.stream.try_clone()?;
        Ok((
            TcpLinkRx {
                stream: self.stream,
                buf: Vec::with_capacity(4096),
            },
            TcpLinkTx { stream: write_half },
        ))
    }
}

/// TCP 链路接收半部
pub struct TcpLinkRx {
    stream: TcpStream,
    /// 分帧缓冲区：保存尚未凑齐一帧的字节
    buf: Vec<u8>,
}

impl TcpLinkRx {
    /// 尝试从缓冲区切出一个完整帧
    fn take_frame(&mut self) -> Result<Option<Vec<u8>>, LinkError> {
        if self.buf.len() < LEN_PREFIX {
            return Ok(None);
        }
        let len = u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > MAX_FRAME_LEN {
            return Err(LinkError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        if self.buf.len() < LEN_PREFIX + len {
            return Ok(None);
        }
        let frame = self.buf[LEN_PREFIX..LEN_PREFIX + len].to_vec();
        self.buf.drain(..LEN_PREFIX + len);
        Ok(Some(frame))
    }
}

impl RxLink for TcpLinkRx {
    fn receive(&mut self) -> Result<Vec<u8>, LinkError> {
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(frame);
            }

            let mut chunk = [0u8; 4096];
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(LinkError::Timeout);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(LinkError::Io(e)),
            }
        }
    }
}

/// TCP 链路发送半部
pub struct TcpLinkTx {
    stream: TcpStream,
}

impl TxLink for TcpLinkTx {
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(LinkError::FrameTooLarge {
                len: frame.len(),
                max: MAX_FRAME_LEN,
            });
        }

        // 长度前缀 + 帧体一次写出，避免对端读到半个前缀
        let mut wire = Vec::with_capacity(LEN_PREFIX + frame.len());
        wire.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        wire.extend_from_slice(frame);

        match self.stream.write_all(&wire) {
            Ok(()) => Ok(()),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(LinkError::Timeout)
            },
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                ) =>
            {
                Err(LinkError::Closed)
            },
            Err(e) => Err(LinkError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn loopback_pair() -> (TcpFrameLink, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || listener.accept().unwrap().0);
        let client = TcpFrameLink::connect(
            "127.0.0.1",
            addr.port(),
            Duration::from_secs(1),
            Duration::from_millis(50),
        )
        .unwrap();
        (client, server.join().unwrap())
    }

    #[test]
    fn test_send_and_receive_frame() {
        let (client, mut server) = loopback_pair();
        let (mut rx, mut tx) = client.split().unwrap();

        tx.send(b"hello strider").unwrap();

        let mut wire = [0u8; 4 + 13];
        server.read_exact(&mut wire).unwrap();
        assert_eq!(&wire[..4], &13u32.to_le_bytes());
        assert_eq!(&wire[4..], b"hello strider");

        // 回发一帧（分两次写，验证接收侧的缓冲累积）
        server.write_all(&7u32.to_le_bytes()).unwrap();
        server.write_all(b"rob").unwrap();
        server.flush().unwrap();
        thread::sleep(Duration::from_millis(10));
        server.write_all(b"otdg").unwrap();
        server.flush().unwrap();

        let mut frame = Err(LinkError::Timeout);
        for _ in 0..20 {
            frame = rx.receive();
            if frame.is_ok() {
                break;
            }
        }
        assert_eq!(frame.unwrap(), b"robotdg");
    }

    #[test]
    fn test_receive_times_out_without_data() {
        let (client, _server) = loopback_pair();
        let (mut rx, _tx) = client.split().unwrap();
        assert!(matches!(rx.receive(), Err(LinkError::Timeout)));
    }

    #[test]
    fn test_receive_detects_closed_peer() {
        let (client, server) = loopback_pair();
        let (mut rx, _tx) = client.split().unwrap();
        drop(server);

        let mut result = rx.receive();
        for _ in 0..20 {
            if !matches!(result, Err(LinkError::Timeout)) {
                break;
            }
            result = rx.receive();
        }
        assert!(matches!(result, Err(LinkError::Closed)));
    }

    #[test]
    fn test_oversized_length_prefix_is_fatal() {
        let (client, mut server) = loopback_pair();
        let (mut rx, _tx) = client.split().unwrap();

        server
            .write_all(&((MAX_FRAME_LEN as u32) + 1).to_le_bytes())
            .unwrap();
        server.flush().unwrap();

        let mut result = rx.receive();
        for _ in 0..20 {
            if !matches!(result, Err(LinkError::Timeout)) {
                break;
            }
            result = rx.receive();
        }
        assert!(matches!(result, Err(LinkError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_connect_to_unreachable_port_fails() {
        // 先绑定再释放，拿到一个（大概率）无监听者的端口
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = TcpFrameLink::connect(
            "127.0.0.1",
            port,
            Duration::from_millis(500),
            Duration::from_millis(50),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_send_rejects_oversized_frame() {
        let (client, _server) = loopback_pair();
        let (_rx, mut tx) = client.split().unwrap();
        let frame = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(
            tx.send(&frame),
            Err(LinkError::FrameTooLarge { .. })
        ));
    }
}
