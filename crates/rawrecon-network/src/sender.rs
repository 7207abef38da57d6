//! Raw Sender: the two probe-emission primitives.
//!
//! Both open a fresh raw socket, send exactly one probe, and close the
//! socket before returning — scoped acquisition rather than a long-lived
//! shared socket.

use std::net::{IpAddr, Ipv4Addr};
use std::os::fd::AsRawFd;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use rawrecon_core::error::{Error, Result};

/// Failure sending one probe. Non-fatal: the caller logs this and
/// continues with the remaining probes.
#[derive(Debug)]
pub struct SendError {
    pub dst: IpAddr,
    pub source: std::io::Error,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "send failed for {}: {}", self.dst, self.source)
    }
}

impl From<SendError> for Error {
    fn from(e: SendError) -> Self {
        Error::Send {
            dst: e.dst.to_string(),
            source: e.source,
        }
    }
}

/// Send a pre-built `ip_header ++ transport_header` buffer on a raw IPv4
/// socket with `IP_HDRINCL` set. `dst_port` is cosmetic on
/// `SOCK_RAW`/`IPPROTO_RAW` (the kernel routes by the IP header we
/// supplied) but kept in the interface for symmetry with [`send_icmp`].
pub fn send_layer3(buf: &[u8], dst_ip: Ipv4Addr, dst_port: u16) -> std::result::Result<(), SendError> {
    let socket = raw_ipv4_socket().map_err(|source| SendError {
        dst: IpAddr::V4(dst_ip),
        source,
    })?;
    set_ip_hdrincl(&socket).map_err(|source| SendError {
        dst: IpAddr::V4(dst_ip),
        source,
    })?;

    let addr = SockAddr::from(std::net::SocketAddrV4::new(dst_ip, dst_port));
    socket.send_to(buf, &addr).map_err(|source| SendError {
        dst: IpAddr::V4(dst_ip),
        source,
    })?;
    // socket dropped here, closing the fd.
    Ok(())
}

/// Send a pre-built ICMP header+payload on a raw ICMP socket; the kernel
/// prepends the IP header using its own routing table.
pub fn send_icmp(buf: &[u8], dst_ip: Ipv4Addr) -> std::result::Result<(), SendError> {
    let socket = raw_icmp_socket().map_err(|source| SendError {
        dst: IpAddr::V4(dst_ip),
        source,
    })?;

    let addr = SockAddr::from(std::net::SocketAddrV4::new(dst_ip, 0));
    socket.send_to(buf, &addr).map_err(|source| SendError {
        dst: IpAddr::V4(dst_ip),
        source,
    })?;
    Ok(())
}

fn raw_ipv4_socket() -> std::io::Result<Socket> {
    Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(libc::IPPROTO_RAW)))
}

/// Set `IP_HDRINCL` directly via `libc::setsockopt`: we supply the IPv4
/// header ourselves, so the kernel must not build its own.
fn set_ip_hdrincl(socket: &Socket) -> std::io::Result<()> {
    let value: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_HDRINCL,
            &value as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn raw_icmp_socket() -> std::io::Result<Socket> {
    Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
}
