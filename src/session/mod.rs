//! Command session — one client at a time over the serving-mode listener.
//!
//! ```text
//!            accept() + is_connected()
//!  Awaiting ───────────────────────────▶ Connected
//!     ▲                                      │
//!     └──────── peer gone: close, clear ─────┘
//! ```
//!
//! Each [`CommandSession::poll`] pass is non-blocking: it either looks for
//! a client, or drains the connected client's bytes into the command
//! protocol and bridges locally typed console bytes back to it. There is no
//! idle timeout; the session only ends through `Z` (deep sleep) or a reset.

pub mod protocol;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{
    Connection, ConsolePort, EventSink, ListenerPort, LogStorePort, PowerPort,
};
use crate::config::LoggerConfig;

use protocol::{CommandContext, Flow};

/// Result of one [`CommandSession::poll`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No client connected and none arrived.
    Idle,
    /// A client is (still or newly) connected.
    Active,
    /// The client went away during this pass; the slot is free.
    Disconnected,
    /// `Z` was received. The caller must power down.
    Shutdown,
}

/// Single-slot session driver over a [`ListenerPort`].
pub struct CommandSession<L: ListenerPort> {
    listener: L,
    client: Option<L::Conn>,
    log_path: String,
    keepalive: Box<dyn FnMut()>,
}

impl<L: ListenerPort> CommandSession<L> {
    /// Wrap an already listening `listener`.
    pub fn new(listener: L, config: &LoggerConfig) -> Self {
        Self {
            listener,
            client: None,
            log_path: config.log_path.as_str().into(),
            keepalive: Box::new(|| {}),
        }
    }

    /// Run `keepalive` at the start of every poll pass and once per line a
    /// command streams, so neither an idle loop nor a long `R` dump
    /// starves the task watchdog.
    pub fn with_keepalive(mut self, keepalive: impl FnMut() + 'static) -> Self {
        self.keepalive = Box::new(keepalive);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// One pass of the session loop.
    pub fn poll(
        &mut self,
        store: &mut dyn LogStorePort,
        console: &mut dyn ConsolePort,
        sink: &mut dyn EventSink,
    ) -> PollOutcome {
        (self.keepalive)();
        let Some(conn) = self.client.as_mut() else {
            return self.poll_awaiting(sink);
        };

        if !conn.is_connected() {
            conn.close();
            self.client = None;
            info!("Client disconnected");
            sink.emit(&AppEvent::ClientDisconnected);
            return PollOutcome::Disconnected;
        }

        // Client → console echo + dispatch, in arrival order.
        while let Some(byte) = conn.read_byte() {
            console.write_byte(byte);
            let mut ctx = CommandContext {
                store: &mut *store,
                client: &mut *conn,
                log_path: &self.log_path,
                keepalive: &mut *self.keepalive,
            };
            if let Some((command, flow)) = protocol::dispatch(byte, &mut ctx) {
                sink.emit(&AppEvent::CommandDispatched(command));
                if flow == Flow::Shutdown {
                    return PollOutcome::Shutdown;
                }
            }
        }

        // Console → client bridge.
        while let Some(byte) = console.read_byte() {
            console.write_byte(byte);
            if let Err(e) = conn.write_bytes(&[byte]) {
                warn!("Console bridge write failed: {}", e);
                break;
            }
        }

        PollOutcome::Active
    }

    fn poll_awaiting(&mut self, sink: &mut dyn EventSink) -> PollOutcome {
        let Some(mut conn) = self.listener.accept() else {
            return PollOutcome::Idle;
        };
        if conn.is_connected() {
            info!("New client");
            sink.emit(&AppEvent::ClientConnected);
            self.client = Some(conn);
            PollOutcome::Active
        } else {
            conn.close();
            sink.emit(&AppEvent::ClientRejected);
            PollOutcome::Idle
        }
    }

    /// Poll until `Z`, then power down. `between_polls` runs after every
    /// pass (pacing delay).
    pub fn serve(
        &mut self,
        store: &mut dyn LogStorePort,
        console: &mut dyn ConsolePort,
        power: &mut dyn PowerPort,
        sink: &mut dyn EventSink,
        mut between_polls: impl FnMut(),
    ) -> ! {
        loop {
            if self.poll(store, console, sink) == PollOutcome::Shutdown {
                break;
            }
            between_polls();
        }
        if let Some(mut conn) = self.client.take() {
            conn.close();
        }
        store.unmount();
        console.flush();
        sink.emit(&AppEvent::EnteringDeepSleep);
        power.enter_deep_sleep()
    }
}
