//! UDP socket layer sending queries and receiving raw datagrams.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, trace};

use crate::common::Message;

use super::config::Config;

const MTU: usize = 2048;

pub const DEFAULT_PORT: u16 = 6881;
/// The maximum duration to backoff checking the [UdpSocket] buffer after it is empty.
/// Lower values increases CPU usage, but reduces latency, and drains the buffer faster,
/// reducing the risk of packet loss.
pub const MAX_THREAD_BLOCK_DURATION: Duration = Duration::from_millis(5);

/// A UdpSocket wrapper that encodes outgoing Krpc messages.
///
/// Decoding is left to the caller, so that malformed traffic can be dropped
/// where the decision is made.
#[derive(Debug)]
pub struct KrpcSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl KrpcSocket {
    pub(crate) fn new(config: &Config) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], config.resolved_port())))?;

        let local_addr = socket.local_addr()?;

        socket.set_nonblocking(true)?;

        Ok(Self { socket, local_addr })
    }

    // === Getters ===

    /// Returns the address the socket is listening to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    // === Public Methods ===

    /// Encode and send a message, errors are logged and otherwise ignored.
    pub fn send(&self, address: SocketAddr, message: &Message) {
        let _ = self.try_send(address, message).map_err(|e| {
            debug!(context = "socket_error", ?e, ?address, "Error sending message");
        });
    }

    /// Receives a single datagram on the socket.
    /// On success, returns the raw bytes and the origin.
    pub fn recv_from(&self) -> Option<(Vec<u8>, SocketAddr)> {
        let mut buf = [0u8; MTU];

        match self.socket.recv_from(&mut buf) {
            Ok((amt, from)) => {
                if from.port() == 0 {
                    trace!(
                        context = "socket_validation",
                        message = "Response from port 0"
                    );
                    return None;
                }

                return Some((buf[..amt].to_vec(), from));
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(MAX_THREAD_BLOCK_DURATION);
            }
            Err(e) => {
                trace!(context = "socket_error", ?e, "recv_from failed unexpectedly");
            }
        }

        None
    }

    // === Private Methods ===

    fn try_send(&self, address: SocketAddr, message: &Message) -> Result<(), crate::Error> {
        self.socket.send_to(&message.to_bytes()?, address)?;
        trace!(context = "socket_message_sending", ?address, message = ?message);
        Ok(())
    }
}
