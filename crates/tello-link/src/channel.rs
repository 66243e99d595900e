//! UDP command channel
//!
//! Owns the socket the drone's SDK port talks to. Commands are fire-and-forget
//! datagrams; whatever the drone sends back is picked up by a background
//! receiver thread and written to the log in arrival order. Replies are not
//! correlated with the command that caused them - the protocol carries no
//! request identifier.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::str::Utf8Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::DroneConfig;
use crate::error::TransportError;
use crate::log::LogSink;

const RECV_BUFFER_SIZE: usize = 1024;

/// Extra time stop() allows the receiver beyond one receive timeout
const JOIN_MARGIN: Duration = Duration::from_millis(500);

/// Socket lifecycle
pub enum ChannelState {
    Closed,
    Listening(Listener),
}

/// Resources held while the channel is open
pub struct Listener {
    socket: Arc<UdpSocket>,
    running: Arc<AtomicBool>,
    receiver: JoinHandle<()>,
}

impl Listener {
    /// Whether the receiver is still serving the socket
    fn is_alive(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the receiver to exit and poke it with an empty datagram so it
    /// does not sit out the rest of its receive timeout.
    fn signal_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(local) = self.socket.local_addr() {
            let wake = SocketAddr::from((Ipv4Addr::LOCALHOST, local.port()));
            if let Err(e) = self.socket.send_to(&[], wake) {
                debug!(error = %e, "Receiver wake-up datagram failed");
            }
        }
    }
}

/// UDP command channel to one drone
pub struct CommandChannel {
    config: DroneConfig,
    log: LogSink,
    state: Mutex<ChannelState>,
}

impl CommandChannel {
    /// Create a closed channel. No socket is opened until `start()` or the
    /// first `send_command()`.
    pub fn new(config: DroneConfig, log: LogSink) -> Self {
        Self {
            config,
            log,
            state: Mutex::new(ChannelState::Closed),
        }
    }

    /// Open the socket and start the receiver. No-op if already listening.
    pub fn start(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let ChannelState::Listening(listener) = &*state {
            if listener.is_alive() {
                return Ok(());
            }
        }
        // The receiver gave up after a socket error; reopen.
        if let ChannelState::Listening(dead) = std::mem::replace(&mut *state, ChannelState::Closed) {
            debug!("Receiver exited; reopening command socket");
            self.close(dead);
        }

        let listener = self.open().inspect_err(|e| {
            self.log.warn(format!("Socket setup failed: {}", e));
        })?;
        let port = listener
            .socket
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(self.config.local_port);
        *state = ChannelState::Listening(listener);

        self.log.info(format!("UDP socket ready on port {}.", port));
        Ok(())
    }

    fn open(&self) -> Result<Listener, TransportError> {
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.local_port));
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| TransportError::Bind(format!("{}: {}", bind_addr, e)))?;

        // A zero timeout means "block forever" to the OS, which would defeat
        // cooperative shutdown.
        let timeout = self.config.receive_timeout().max(Duration::from_millis(1));
        socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| TransportError::Bind(format!("set read timeout: {}", e)))?;

        let socket = Arc::new(socket);
        let running = Arc::new(AtomicBool::new(true));

        let receiver = {
            let socket = socket.clone();
            let running = running.clone();
            let log = self.log.clone();
            std::thread::Builder::new()
                .name("tello-rx".to_string())
                .spawn(move || receive_loop(&socket, &running, &log))
                .map_err(|e| TransportError::Bind(format!("spawn receiver: {}", e)))?
        };

        debug!(%bind_addr, ?timeout, "Command socket bound");
        Ok(Listener {
            socket,
            running,
            receiver,
        })
    }

    /// Send a command, opening the channel first if needed.
    ///
    /// Returns false on any transport failure; the cause is logged.
    pub fn send_command(&self, text: &str) -> bool {
        match self.try_send(text) {
            Ok(()) => true,
            Err(TransportError::Send(cause)) => {
                self.log.warn(format!("Send failed: {}", cause));
                false
            }
            Err(e) => {
                self.log.warn(format!("Send failed: {}", e));
                false
            }
        }
    }

    /// Fallible form of [`send_command`](Self::send_command). Logs `>>> text`
    /// on success and nothing on failure.
    pub fn try_send(&self, text: &str) -> Result<(), TransportError> {
        self.start()?;

        let socket = match &*self.state.lock() {
            ChannelState::Listening(listener) => listener.socket.clone(),
            // stop() won the race against start()
            ChannelState::Closed => return Err(TransportError::Closed),
        };

        socket
            .send_to(text.as_bytes(), self.config.address)
            .map_err(|e| TransportError::Send(e.to_string()))?;

        self.log.sent(text);
        Ok(())
    }

    /// Close the socket and stop the receiver. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let ChannelState::Listening(listener) =
            std::mem::replace(&mut *state, ChannelState::Closed)
        {
            self.close(listener);
        }
        drop(state);

        self.log.info("Socket closed.");
    }

    /// Stop the receiver and release the socket. Called with the state lock
    /// held so a concurrent start() cannot rebind the port while the old
    /// receiver still holds it.
    fn close(&self, listener: Listener) {
        listener.signal_stop();
        let Listener {
            socket, receiver, ..
        } = listener;
        drop(socket);

        let deadline = Instant::now() + self.config.receive_timeout() + JOIN_MARGIN;
        if join_until(receiver, deadline).is_err() {
            warn!("Receiver thread did not stop in time; detaching");
        }
    }

    /// Whether a socket is open and its receiver is running
    pub fn is_listening(&self) -> bool {
        match &*self.state.lock() {
            ChannelState::Listening(listener) => listener.is_alive(),
            ChannelState::Closed => false,
        }
    }

    /// Bound local address, if listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            ChannelState::Listening(listener) => listener.socket.local_addr().ok(),
            ChannelState::Closed => None,
        }
    }

    /// Drone address commands are sent to
    pub fn peer_addr(&self) -> SocketAddr {
        self.config.address
    }

    pub fn config(&self) -> &DroneConfig {
        &self.config
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        if let ChannelState::Listening(listener) = self.state.get_mut() {
            listener.signal_stop();
        }
    }
}

fn receive_loop(socket: &UdpSocket, running: &AtomicBool, log: &LogSink) {
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, source)) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                // Only the stop wake-up is expected to be empty
                if len == 0 {
                    continue;
                }
                let payload = &buf[..len];
                match decode_reply(payload) {
                    Ok(text) => log.received(text),
                    Err(e) => {
                        debug!(%source, error = %e, "Reply is not valid UTF-8");
                        log.received(String::from_utf8_lossy(payload).trim_end().to_string());
                    }
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => {
                log.warn(format!("Receive failed: {}", e));
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    debug!("Command receiver stopped");
}

/// Decode a reply datagram as text, dropping trailing whitespace/newlines
pub fn decode_reply(payload: &[u8]) -> Result<&str, Utf8Error> {
    std::str::from_utf8(payload).map(str::trim_end)
}

/// Join `handle` if it finishes before `deadline`; otherwise hand it back.
pub(crate) fn join_until(handle: JoinHandle<()>, deadline: Instant) -> Result<(), JoinHandle<()>> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Err(handle);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    if handle.join().is_err() {
        warn!("Background thread panicked");
    }
    Ok(())
}
