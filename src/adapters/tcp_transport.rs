//! TCP transport adapter.
//!
//! Implements [`ListenerPort`] / [`Connection`] — a single-client,
//! non-blocking TCP server for the serving-mode command terminal.
//!
//! `std::net` is backed by lwIP on ESP-IDF and by the host stack
//! elsewhere, so one implementation serves both targets. Pass port `0`
//! on the host to let the OS pick a free port (see
//! [`local_addr()`](TcpTransport::local_addr)).
//!
//! ## Connection model
//!
//! 1. `listen()` binds `0.0.0.0:<port>` in non-blocking mode.
//! 2. `accept()` polls for one pending client and hands it out as a
//!    [`TcpConnection`]; the caller owns the single session slot.
//! 3. Reads never block. Received bytes are buffered so a peer that sent
//!    a command and then closed still has the command delivered before
//!    the connection reports itself gone.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use log::{info, warn};

use crate::app::ports::{Connection, ListenerPort, TransportError};

/// Bytes pulled from the socket per read call.
const RX_CHUNK: usize = 128;

/// Attempts before a write that keeps hitting `WouldBlock` is abandoned.
const WRITE_RETRIES: u32 = 200;

// ───────────────────────────────────────────────────────────────
// TcpTransport
// ───────────────────────────────────────────────────────────────

/// Listener half. Unbound until [`ListenerPort::listen`] runs.
#[derive(Default)]
pub struct TcpTransport {
    listener: Option<TcpListener>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The actual bound address, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

impl ListenerPort for TcpTransport {
    type Conn = TcpConnection;

    fn listen(&mut self, port: u16) -> Result<(), TransportError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).map_err(|e| {
            warn!("TCP: bind {} failed: {}", addr, e);
            TransportError::BindFailed
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|_| TransportError::BindFailed)?;
        info!("TCP: listening on port {}", port);
        self.listener = Some(listener);
        Ok(())
    }

    fn accept(&mut self) -> Option<TcpConnection> {
        let listener = self.listener.as_ref()?;
        match listener.accept() {
            Ok((stream, addr)) => {
                if stream.set_nonblocking(true).is_err() {
                    warn!("TCP: failed to set non-blocking on client socket");
                    return None;
                }
                let _ = stream.set_nodelay(true);
                info!("TCP: client connected from {}", addr);
                Some(TcpConnection::new(stream))
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("TCP: accept error: {}", e);
                None
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// TcpConnection
// ───────────────────────────────────────────────────────────────

/// One accepted client.
pub struct TcpConnection {
    stream: Option<TcpStream>,
    rx: VecDeque<u8>,
    eof: bool,
}

impl TcpConnection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
            rx: VecDeque::with_capacity(RX_CHUNK),
            eof: false,
        }
    }

    /// Pull whatever the socket has ready into `rx`.
    fn fill(&mut self) {
        if self.eof {
            return;
        }
        let Some(stream) = self.stream.as_mut() else {
            self.eof = true;
            return;
        };
        let mut buf = [0u8; RX_CHUNK];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    info!("TCP: client closed (EOF)");
                    self.eof = true;
                    return;
                }
                Ok(n) => self.rx.extend(&buf[..n]),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("TCP: read error: {}", e);
                    self.eof = true;
                    return;
                }
            }
        }
    }
}

impl Connection for TcpConnection {
    fn is_connected(&mut self) -> bool {
        self.fill();
        !self.eof || !self.rx.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.rx.is_empty() {
            self.fill();
        }
        self.rx.pop_front()
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let mut rest = data;
        let mut retries = 0;
        while !rest.is_empty() {
            match stream.write(rest) {
                Ok(0) => return Err(TransportError::Io),
                Ok(n) => rest = &rest[n..],
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    retries += 1;
                    if retries > WRITE_RETRIES {
                        return Err(TransportError::Io);
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => return Err(TransportError::Io),
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.flush();
            let _ = stream.shutdown(Shutdown::Both);
            info!("TCP: client disconnected");
        }
        self.eof = true;
        self.rx.clear();
    }
}

// ───────────────────────────────────────────────────────────────
// Tests (host only)
// ───────────────────────────────────────────────────────────────
