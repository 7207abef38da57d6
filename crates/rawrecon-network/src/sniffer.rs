//! Link-layer sniffer: an `AF_PACKET`/`SOCK_RAW` capture thread bound to one
//! interface, with a classic-BPF filter attached in-kernel.
//!
//! The sniffer owns exactly one background thread. It never blocks the
//! caller: [`Sniffer::start`] spawns the thread and returns immediately,
//! [`Sniffer::poll_one`]/[`Sniffer::drain`] read from a bounded queue the
//! thread fills, and [`Sniffer::stop`] signals the thread to exit and joins
//! it. The lifecycle is the four-state machine the source's ad-hoc
//! "is it running" boolean was replaced with:
//!
//! ```text
//! Idle --start()--> Running --stop()--> Drained --(dropped)--> Closed
//! ```
//!
//! `Idle` is a constructed-but-unstarted sniffer; `Running` is actively
//! polling the kernel socket; `Drained` means the capture thread has exited
//! and no further frames will arrive, but frames already queued are still
//! readable; `Closed` means the underlying socket fd has been released.

use std::collections::VecDeque;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rawrecon_core::error::{Error, Result};

use crate::bpf::BpfProgram;

/// Maximum frames buffered between the capture thread and its consumer.
/// Past this the capture thread drops the newest frame rather than block.
const QUEUE_CAPACITY: usize = 4096;

/// One captured link-layer frame plus the instant it was received.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub bytes: Vec<u8>,
    pub received_at: Instant,
}

/// The sniffer's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnifferState {
    Idle,
    Running,
    Drained,
    Closed,
}

struct Inner {
    state: Mutex<SnifferState>,
    queue: Mutex<VecDeque<RawFrame>>,
    dropped: std::sync::atomic::AtomicUsize,
    stop: AtomicBool,
}

/// A bound, filtered capture socket and its background reader thread.
pub struct Sniffer {
    inner: Arc<Inner>,
    handle: Option<JoinHandle<()>>,
    fd: Option<RawFd>,
}

impl Sniffer {
    /// Open an `AF_PACKET`/`SOCK_RAW` socket bound to `ifindex`, attach
    /// `filter`, and size its receive buffer, without starting capture yet.
    pub fn open(ifindex: i32, filter: &BpfProgram) -> Result<Self> {
        let fd = open_packet_socket(ifindex)
            .map_err(|e| Error::Sniff(format!("failed to open capture socket: {e}")))?;

        if let Err(e) = attach_filter(fd, filter) {
            unsafe { libc::close(fd) };
            return Err(Error::Filter(format!("failed to attach BPF filter: {e}")));
        }

        // Best-effort: a large receive buffer reduces the chance the
        // kernel drops frames before our poll loop gets to them. Failure
        // here is not fatal.
        let _ = set_rcvbuf(fd, 1 << 28);

        Ok(Sniffer {
            inner: Arc::new(Inner {
                state: Mutex::new(SnifferState::Idle),
                queue: Mutex::new(VecDeque::new()),
                dropped: std::sync::atomic::AtomicUsize::new(0),
                stop: AtomicBool::new(false),
            }),
            handle: None,
            fd: Some(fd),
        })
    }

    pub fn state(&self) -> SnifferState {
        *self.inner.state.lock().unwrap()
    }

    /// Start the capture thread. Idle -> Running. Calling this twice is a
    /// logic error on the caller's part and returns [`Error::Sniff`].
    pub fn start(&mut self) -> Result<()> {
        {
            let mut state = self.inner.state.lock().unwrap();
            if *state != SnifferState::Idle {
                return Err(Error::Sniff(format!(
                    "cannot start a sniffer in state {:?}",
                    *state
                )));
            }
            *state = SnifferState::Running;
        }

        let fd = self
            .fd
            .ok_or_else(|| Error::Sniff("sniffer has no open socket".to_string()))?;
        let inner = Arc::clone(&self.inner);

        self.handle = Some(std::thread::spawn(move || capture_loop(fd, inner)));
        Ok(())
    }

    /// Signal the capture thread to exit and join it. Running -> Drained.
    /// Frames already queued remain available via [`Sniffer::drain`].
    pub fn stop(&mut self) {
        self.inner.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let mut state = self.inner.state.lock().unwrap();
        if *state == SnifferState::Running {
            *state = SnifferState::Drained;
        }
    }

    /// Pop the oldest queued frame, if any, without blocking.
    pub fn poll_one(&self) -> Option<RawFrame> {
        self.inner.queue.lock().unwrap().pop_front()
    }

    /// Drain every currently queued frame, oldest first.
    pub fn drain(&self) -> Vec<RawFrame> {
        let mut queue = self.inner.queue.lock().unwrap();
        queue.drain(..).collect()
    }

    /// Count of frames dropped because the queue was at capacity.
    pub fn dropped_count(&self) -> usize {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Sniffer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
        if let Some(fd) = self.fd.take() {
            unsafe { libc::close(fd) };
        }
        *self.inner.state.lock().unwrap() = SnifferState::Closed;
    }
}

const ETH_P_ALL_NETWORK_ORDER: u16 = (libc::ETH_P_ALL as u16).to_be();

fn open_packet_socket(ifindex: i32) -> std::io::Result<RawFd> {
    let fd = unsafe {
        libc::socket(
            libc::AF_PACKET,
            libc::SOCK_RAW,
            ETH_P_ALL_NETWORK_ORDER as i32,
        )
    };
    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }

    let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as u16;
    addr.sll_protocol = ETH_P_ALL_NETWORK_ORDER;
    addr.sll_ifindex = ifindex;

    let ret = unsafe {
        libc::bind(
            fd,
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }

    Ok(fd)
}

fn attach_filter(fd: RawFd, program: &BpfProgram) -> std::io::Result<()> {
    let mut insns: Vec<libc::sock_filter> = program
        .instructions()
        .iter()
        .map(|i| libc::sock_filter {
            code: i.code,
            jt: i.jt,
            jf: i.jf,
            k: i.k,
        })
        .collect();

    let fprog = libc::sock_fprog {
        len: insns.len() as u16,
        filter: insns.as_mut_ptr(),
    };

    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ATTACH_FILTER,
            &fprog as *const libc::sock_fprog as *const libc::c_void,
            std::mem::size_of::<libc::sock_fprog>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn set_rcvbuf(fd: RawFd, bytes: libc::c_int) -> std::io::Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUFFORCE,
            &bytes as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// The capture thread body: poll the socket with a short timeout so the
/// stop flag is checked often, read one frame per readable wakeup, and
/// push it onto the bounded queue.
fn capture_loop(fd: RawFd, inner: Arc<Inner>) {
    const POLL_TIMEOUT: Duration = Duration::from_millis(1);
    let mut buf = vec![0u8; 65535];

    loop {
        if inner.stop.load(Ordering::SeqCst) {
            break;
        }

        let mut pollfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pollfd, 1, POLL_TIMEOUT.as_millis() as i32) };
        if ret <= 0 {
            continue; // timeout or interrupted; re-check the stop flag
        }

        let n = unsafe {
            libc::recv(
                fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        if n <= 0 {
            continue;
        }

        let frame = RawFrame {
            bytes: buf[..n as usize].to_vec(),
            received_at: Instant::now(),
        };

        let mut queue = inner.queue.lock().unwrap();
        if queue.len() >= QUEUE_CAPACITY {
            inner.dropped.fetch_add(1, Ordering::Relaxed);
        } else {
            queue.push_back(frame);
        }
    }
}

/// Resolve an interface name to the kernel index [`Sniffer::open`] needs.
pub fn interface_index(name: &str) -> Result<i32> {
    let c_name = std::ffi::CString::new(name)
        .map_err(|_| Error::Sniff(format!("interface name {name:?} contains a NUL byte")))?;
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        Err(Error::Sniff(format!("no such interface: {name}")))
    } else {
        Ok(index as i32)
    }
}

impl std::fmt::Debug for Sniffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sniffer").field("state", &self.state()).finish()
    }
}
