//! Raw packet construction, BPF filter compilation, link-layer capture, and
//! frame dissection.
//!
//! Dependency order, leaves first: [`checksum`] has no internal
//! dependency; [`header`] builds on it; [`composer`] builds on `header`;
//! [`sender`] is an independent leaf (raw sockets only); [`bpf`] is an
//! independent leaf (pure assembler); [`sniffer`] depends on `bpf` for the
//! program it attaches; [`dissector`] depends only on
//! [`rawrecon_core::types`]. [`interface`] and [`privilege`] are ambient
//! utilities used by the orchestration layer above this crate.

pub mod bpf;
pub mod checksum;
pub mod composer;
pub mod dissector;
pub mod header;
pub mod interface;
pub mod privilege;
pub mod sender;
pub mod sniffer;

pub use bpf::{BpfInsn, BpfProgram};
pub use composer::{compose, compose_tcp_syn, ComposedTcpSyn, RawProbeBytes};
pub use privilege::{check_privileges, has_raw_socket_capability};
pub use sniffer::{RawFrame, Sniffer, SnifferState};
