//! ICMP echo prober.
//!
//! One [`IcmpProber`] owns a single ICMP socket for the whole sweep. Every
//! request goes out through it with a fresh sequence number, and one
//! listener task reads all replies, matching each to the waiting request by
//! source address and sequence (plus identifier on raw sockets).
//!
//! Unprivileged ICMP datagram sockets (Linux `ping_group_range`, macOS) are
//! tried first, raw sockets second; the latter need root or `CAP_NET_RAW`.
//! Replies are accepted with or without a leading IPv4 header, since raw
//! sockets and macOS datagram sockets include it while Linux datagram
//! sockets strip it.

use crate::error::{ScanError, ScanResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::{self, MutableEchoRequestPacket};
use pnet::packet::icmp::{self, IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Bytes of payload carried by each echo request.
const PAYLOAD_LEN: usize = 32;

/// Size of the ICMP echo header.
const ECHO_HEADER_LEN: usize = 8;

/// Largest reply we bother reading (IP header + ICMP + payload fits easily).
const RECV_BUFFER_LEN: usize = 1500;

/// Waiters kept before abandoned ones are swept out of the table.
const PRUNE_FLOOR: usize = 4096;

/// An echo request that is on the wire.
///
/// Resolves with the round-trip time once the matching reply arrives, or
/// `None` if the prober shuts down first. Never resolves for a silent
/// host; the caller bounds the wait.
pub struct PendingEcho {
    reply: BoxFuture<'static, Option<Duration>>,
}

impl PendingEcho {
    pub fn new<F>(reply: F) -> Self
    where
        F: Future<Output = Option<Duration>> + Send + 'static,
    {
        Self {
            reply: Box::pin(reply),
        }
    }

    /// Wait for the reply.
    pub async fn reply(self) -> Option<Duration> {
        self.reply.await
    }
}

/// Anything that can send an echo request and report the round trip.
#[async_trait]
pub trait EchoProber: Send + Sync {
    /// Send one echo request to `addr`.
    ///
    /// `Ok` means the request was handed to the network. An error means it
    /// never went out and concerns this address only.
    async fn send_echo(&self, addr: Ipv4Addr) -> ScanResult<PendingEcho>;
}

/// Which kind of ICMP socket the prober opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketKind {
    /// `SOCK_DGRAM` + `IPPROTO_ICMP`. The kernel owns the identifier.
    Datagram,
    /// `SOCK_RAW` + `IPPROTO_ICMP`. Every ICMP packet reaches us.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ReplyKey {
    source: Ipv4Addr,
    sequence: u16,
}

struct Waiter {
    key: ReplyKey,
    sent_at: Instant,
    reply_tx: oneshot::Sender<Duration>,
}

/// Echo prober sharing one ICMP socket across every request.
///
/// Dropping it stops the listener; requests still waiting resolve to `None`.
pub struct IcmpProber {
    kind: SocketKind,
    socket: Arc<UdpSocket>,
    identifier: u16,
    next_sequence: AtomicU16,
    waiters: mpsc::UnboundedSender<Waiter>,
    listener: JoinHandle<()>,
}

impl IcmpProber {
    /// Open the sweep socket and start its listener.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// `PermissionDenied` when neither datagram nor raw ICMP sockets can be
    /// opened; `Socket` for any other failure.
    pub fn new() -> ScanResult<Self> {
        let (kind, socket) = match open_socket(SocketKind::Datagram) {
            Ok(socket) => (SocketKind::Datagram, socket),
            Err(e) => {
                debug!(error = %e, "ICMP datagram socket unavailable, trying raw");
                match open_socket(SocketKind::Raw) {
                    Ok(socket) => (SocketKind::Raw, socket),
                    Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                        return Err(ScanError::PermissionDenied(
                            "ICMP echo requires root/sudo or CAP_NET_RAW".to_string(),
                        ))
                    }
                    Err(e) => {
                        return Err(ScanError::Socket(format!("cannot open ICMP socket: {}", e)))
                    }
                }
            }
        };

        let socket = UdpSocket::from_std(std::net::UdpSocket::from(socket))
            .map_err(|e| ScanError::Socket(format!("cannot register ICMP socket: {}", e)))?;
        let socket = Arc::new(socket);
        let identifier: u16 = rand::random();
        debug!(?kind, identifier, "ICMP socket open");

        let (waiters, waiter_rx) = mpsc::unbounded_channel();
        let router = ReplyRouter::new(kind, identifier);
        let listener = tokio::spawn(listen(Arc::clone(&socket), router, waiter_rx));

        Ok(Self {
            kind,
            socket,
            identifier,
            next_sequence: AtomicU16::new(rand::random()),
            waiters,
            listener,
        })
    }
}

impl Drop for IcmpProber {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[async_trait]
impl EchoProber for IcmpProber {
    async fn send_echo(&self, addr: Ipv4Addr) -> ScanResult<PendingEcho> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let request = build_echo_request(self.identifier, sequence)
            .map_err(|e| ScanError::Socket(format!("{}: {}", addr, e)))?;

        // Registered before sending, so the listener knows the request by
        // the time its reply can arrive.
        let (reply_tx, reply_rx) = oneshot::channel();
        let waiter = Waiter {
            key: ReplyKey {
                source: addr,
                sequence,
            },
            sent_at: Instant::now(),
            reply_tx,
        };
        if self.waiters.send(waiter).is_err() {
            return Err(ScanError::Socket("ICMP listener stopped".to_string()));
        }

        self.socket
            .send_to(&request, SocketAddrV4::new(addr, 0))
            .await
            .map_err(|e| ScanError::Socket(format!("{}: {}", addr, e)))?;
        trace!(%addr, sequence, kind = ?self.kind, "echo request sent");

        Ok(PendingEcho::new(async move { reply_rx.await.ok() }))
    }
}

/// Read every packet from the shared socket and hand matches to waiters.
async fn listen(
    socket: Arc<UdpSocket>,
    mut router: ReplyRouter,
    mut waiter_rx: mpsc::UnboundedReceiver<Waiter>,
) {
    let mut buffer = [0u8; RECV_BUFFER_LEN];
    loop {
        let (len, source) = match socket.recv_from(&mut buffer).await {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "ICMP receive failed, listener stopping");
                return;
            }
        };
        let received_at = Instant::now();

        loop {
            match waiter_rx.try_recv() {
                Ok(waiter) => router.register(waiter),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        if let SocketAddr::V4(source) = source {
            if !router.dispatch(*source.ip(), &buffer[..len], received_at) {
                trace!(%source, len, "unmatched ICMP packet");
            }
        }
    }
}

/// Table of requests still waiting for their reply.
struct ReplyRouter {
    kind: SocketKind,
    identifier: u16,
    waiting: HashMap<ReplyKey, Waiter>,
    prune_at: usize,
}

impl ReplyRouter {
    fn new(kind: SocketKind, identifier: u16) -> Self {
        Self {
            kind,
            identifier,
            waiting: HashMap::new(),
            prune_at: PRUNE_FLOOR,
        }
    }

    fn register(&mut self, waiter: Waiter) {
        if self.waiting.len() >= self.prune_at {
            self.waiting.retain(|_, w| !w.reply_tx.is_closed());
            self.prune_at = (self.waiting.len() * 2).max(PRUNE_FLOOR);
        }
        self.waiting.insert(waiter.key, waiter);
    }

    /// Complete the waiter `packet` answers. Returns whether one matched.
    fn dispatch(&mut self, source: Ipv4Addr, packet: &[u8], received_at: Instant) -> bool {
        let sequence = match reply_sequence(self.kind, packet, self.identifier) {
            Some(sequence) => sequence,
            None => return false,
        };
        match self.waiting.remove(&ReplyKey { source, sequence }) {
            Some(waiter) => {
                let rtt = received_at.saturating_duration_since(waiter.sent_at);
                let _ = waiter.reply_tx.send(rtt);
                true
            }
            None => false,
        }
    }
}

fn open_socket(kind: SocketKind) -> io::Result<Socket> {
    let ty = match kind {
        SocketKind::Datagram => Type::DGRAM,
        SocketKind::Raw => Type::RAW,
    };
    let socket = Socket::new(Domain::IPV4, ty, Some(Protocol::ICMPV4))?;
    socket.set_nonblocking(true)?;
    // Broadcast addresses are part of every range.
    socket.set_broadcast(true)?;
    Ok(socket)
}

/// Build an ICMP echo request with a checksum.
fn build_echo_request(identifier: u16, sequence: u16) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; ECHO_HEADER_LEN + PAYLOAD_LEN];
    let payload: Vec<u8> = (0..PAYLOAD_LEN as u8).collect();

    let mut packet = MutableEchoRequestPacket::new(&mut buffer)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "echo buffer too small"))?;
    packet.set_icmp_type(IcmpTypes::EchoRequest);
    packet.set_icmp_code(echo_request::IcmpCodes::NoCode);
    packet.set_identifier(identifier);
    packet.set_sequence_number(sequence);
    packet.set_payload(&payload);

    let checksum = IcmpPacket::new(packet.packet())
        .map(|p| icmp::checksum(&p))
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "echo buffer too small"))?;
    packet.set_checksum(checksum);

    Ok(buffer)
}

/// ICMP bytes of `packet`, skipping an IPv4 header if one leads.
///
/// An ICMP message never starts with a version nibble of 4, so the first
/// byte tells the two apart.
fn icmp_bytes(packet: &[u8]) -> Option<&[u8]> {
    match packet.first() {
        Some(first) if first >> 4 == 4 => {
            let ip = Ipv4Packet::new(packet)?;
            packet.get(usize::from(ip.get_header_length()) * 4..)
        }
        Some(_) => Some(packet),
        None => None,
    }
}

/// Sequence number of `packet` if it is an echo reply to this prober.
///
/// Datagram sockets rewrite the identifier, so it is only checked on raw
/// sockets.
fn reply_sequence(kind: SocketKind, packet: &[u8], identifier: u16) -> Option<u16> {
    let reply = EchoReplyPacket::new(icmp_bytes(packet)?)?;
    let ours = reply.get_icmp_type() == IcmpTypes::EchoReply
        && (kind == SocketKind::Datagram || reply.get_identifier() == identifier);
    ours.then_some(reply.get_sequence_number())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::icmp::echo_reply::MutableEchoReplyPacket;
    use pnet::packet::icmp::echo_request::EchoRequestPacket;
    use pnet::packet::ip::IpNextHeaderProtocols;
    use pnet::packet::ipv4::MutableIpv4Packet;

    fn echo_reply(identifier: u16, sequence: u16) -> Vec<u8> {
        let mut buffer = vec![0u8; ECHO_HEADER_LEN + PAYLOAD_LEN];
        let mut reply = MutableEchoReplyPacket::new(&mut buffer).unwrap();
        reply.set_icmp_type(IcmpTypes::EchoReply);
        reply.set_identifier(identifier);
        reply.set_sequence_number(sequence);
        buffer
    }

    fn with_ipv4_header(icmp: &[u8]) -> Vec<u8> {
        let mut buffer = vec![0u8; 20 + icmp.len()];
        {
            let mut ip = MutableIpv4Packet::new(&mut buffer).unwrap();
            ip.set_version(4);
            ip.set_header_length(5);
            ip.set_total_length((20 + icmp.len()) as u16);
            ip.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
        }
        buffer[20..].copy_from_slice(icmp);
        buffer
    }

    fn waiter(source: Ipv4Addr, sequence: u16) -> (Waiter, oneshot::Receiver<Duration>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let waiter = Waiter {
            key: ReplyKey { source, sequence },
            sent_at: Instant::now(),
            reply_tx,
        };
        (waiter, reply_rx)
    }

    #[test]
    fn test_echo_request_fields_and_checksum() {
        let bytes = build_echo_request(0x1234, 7).unwrap();
        assert_eq!(bytes.len(), ECHO_HEADER_LEN + PAYLOAD_LEN);

        let request = EchoRequestPacket::new(&bytes).unwrap();
        assert_eq!(request.get_icmp_type(), IcmpTypes::EchoRequest);
        assert_eq!(request.get_identifier(), 0x1234);
        assert_eq!(request.get_sequence_number(), 7);

        let icmp = IcmpPacket::new(&bytes).unwrap();
        assert_eq!(icmp::checksum(&icmp), request.get_checksum());
    }

    #[test]
    fn test_datagram_reply_ignores_identifier() {
        let reply = echo_reply(999, 42);
        assert_eq!(reply_sequence(SocketKind::Datagram, &reply, 1), Some(42));
    }

    #[test]
    fn test_datagram_reply_with_ip_header_is_accepted() {
        let reply = with_ipv4_header(&echo_reply(999, 42));
        assert_eq!(reply_sequence(SocketKind::Datagram, &reply, 1), Some(42));
    }

    #[test]
    fn test_raw_reply_skips_ip_header_and_checks_identifier() {
        let reply = with_ipv4_header(&echo_reply(5, 42));
        assert_eq!(reply_sequence(SocketKind::Raw, &reply, 5), Some(42));
        assert_eq!(reply_sequence(SocketKind::Raw, &reply, 6), None);
    }

    #[test]
    fn test_request_is_not_a_reply() {
        let request = build_echo_request(5, 42).unwrap();
        assert_eq!(reply_sequence(SocketKind::Datagram, &request, 5), None);
    }

    #[test]
    fn test_truncated_packet_is_ignored() {
        assert_eq!(reply_sequence(SocketKind::Raw, &[0x45, 0x00], 1), None);
        assert_eq!(reply_sequence(SocketKind::Datagram, &[], 1), None);
    }

    #[tokio::test]
    async fn test_router_matches_source_and_sequence() {
        let mut router = ReplyRouter::new(SocketKind::Raw, 7);
        let a = Ipv4Addr::new(10, 0, 0, 1);
        let b = Ipv4Addr::new(10, 0, 0, 2);
        let (wa, ra) = waiter(a, 1);
        let (wb, rb) = waiter(b, 2);
        router.register(wa);
        router.register(wb);

        let reply = with_ipv4_header(&echo_reply(7, 1));
        // Right sequence, wrong source.
        assert!(!router.dispatch(b, &reply, Instant::now()));
        assert!(router.dispatch(a, &reply, Instant::now()));
        // Already answered.
        assert!(!router.dispatch(a, &reply, Instant::now()));

        assert!(ra.await.is_ok());
        drop(router);
        assert!(rb.await.is_err());
    }

    #[test]
    fn test_router_sweeps_abandoned_waiters() {
        let mut router = ReplyRouter::new(SocketKind::Datagram, 0);
        let mut live = Vec::new();
        for i in 0..PRUNE_FLOOR as u16 {
            let (w, rx) = waiter(Ipv4Addr::new(10, 0, 0, 1), i);
            router.register(w);
            if i % 2 == 0 {
                live.push(rx);
            }
        }
        assert_eq!(router.waiting.len(), PRUNE_FLOOR);

        let (w, _rx) = waiter(Ipv4Addr::new(10, 0, 0, 2), 0);
        router.register(w);
        assert_eq!(router.waiting.len(), live.len() + 1);
    }

    #[tokio::test]
    async fn test_one_socket_serves_a_thousand_requests() {
        // Needs ICMP socket rights; nothing to check without them.
        let prober = match IcmpProber::new() {
            Ok(prober) => prober,
            Err(_) => return,
        };

        let mut pending = Vec::new();
        for i in 0..1024u32 {
            let addr = Ipv4Addr::from(u32::from(Ipv4Addr::new(127, 0, 0, 0)) + i);
            pending.push(prober.send_echo(addr).await);
        }
        assert!(pending.iter().all(|p| p.is_ok()));
    }

    #[tokio::test]
    async fn test_pending_echo_without_listener_is_no_reply() {
        let (reply_tx, reply_rx) = oneshot::channel::<Duration>();
        let pending = PendingEcho::new(async move { reply_rx.await.ok() });
        drop(reply_tx);
        assert_eq!(pending.reply().await, None);
    }
}
