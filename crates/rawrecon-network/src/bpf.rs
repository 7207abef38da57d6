//! Classic-BPF filter compiler.
//!
//! Builds the three filter programs the sniffer attaches via
//! `SO_ATTACH_FILTER`:
//!
//! - [`tcp_syn_filter`]: TCP SYN+ACK responses to our IP (port scanning).
//! - [`discovery_filter`]: ICMP Echo Reply OR TCP SYN+ACK/RST (host
//!   discovery).
//! - [`icmp_unreachable_filter`]: ICMP Port Unreachable (UDP probing).
//!
//! [`Clause`] values are assembled into a labelled intermediate form by
//! [`Assembler`], and jump targets are resolved to forward displacements in
//! a second pass, so adding a clause can never silently corrupt an earlier
//! jump the way hand-indexed offsets can.

use std::net::Ipv4Addr;

use rawrecon_core::error::{Error, Result};

/// One classic-BPF instruction: `(opcode, jt, jf, k)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpfInsn {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

impl BpfInsn {
    const fn stmt(code: u16, k: u32) -> Self {
        BpfInsn { code, jt: 0, jf: 0, k }
    }

    const fn jump(code: u16, k: u32, jt: u8, jf: u8) -> Self {
        BpfInsn { code, jt, jf, k }
    }
}

/// A fully resolved classic-BPF program, ready for `sock_fprog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BpfProgram {
    insns: Vec<BpfInsn>,
}

impl BpfProgram {
    pub fn instructions(&self) -> &[BpfInsn] {
        &self.insns
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }
}

/// Programs that would address instructions beyond the BPF legal range are
/// refused at compile time rather than truncated or wrapped.
pub const MAX_BPF_INSNS: usize = 4096;

// --- classic BPF opcode fragments (linux/filter.h naming) --------------

const BPF_LD_H_ABS: u16 = 0x28; // ldh [k]
const BPF_LD_W_ABS: u16 = 0x20; // ld [k]
const BPF_LD_B_ABS: u16 = 0x30; // ldb [k]
const BPF_LD_B_IND: u16 = 0x50; // ldb [x + k]
const BPF_LDX_B_MSH: u16 = 0xb1; // ldxb 4*([k]&0xf)
const BPF_JMP_JEQ_K: u16 = 0x15; // jeq #k, jt, jf
const BPF_JMP_JSET_K: u16 = 0x45; // jset #k, jt, jf
const BPF_ALU_AND_K: u16 = 0x54; // A &= k
const BPF_RET_K: u16 = 0x06; // ret #k

const ETHERTYPE_OFFSET: u32 = 12;
const IPV4_DST_OFFSET: u32 = 30;
const IPV4_PROTO_OFFSET: u32 = 23;
const IPV4_FLAGS_FRAG_OFFSET: u32 = 20;
const ETH_HDR_LEN: u32 = 14;
const TCP_FLAGS_REL_OFFSET: u32 = 13; // within the TCP header, after IHL*4

const ETHERTYPE_IPV4: u32 = 0x0800;
const IP_PROTO_ICMP: u32 = 1;
const IP_PROTO_TCP: u32 = 6;
const IP_PROTO_UDP: u32 = 17;
const IP_MF_OR_FRAGOFF_MASK: u32 = 0x1fff;
const TCP_SYNACK_MASK: u32 = 0x12;
const ICMP_ECHO_REPLY_TYPE: u32 = 0;
const ICMP_UNREACHABLE_TYPE: u32 = 3;
const ICMP_PORT_UNREACHABLE_CODE: u32 = 3;

/// `ret 262144` — an accept verdict large enough to deliver the whole
/// frame; `ret 0` drops it.
const ACCEPT_SNAPLEN: u32 = 262_144;
const REJECT: u32 = 0;

/// A labelled pseudo-instruction. Clauses reference labels rather than raw
/// offsets; [`Assembler::assemble`] resolves them in a second pass.
#[derive(Debug, Clone)]
enum Clause {
    Stmt(u16, u32),
    /// Conditional jump: `code`, `k`, jump-to-label on true, jump-to-label
    /// on false. Either branch may be `None` to mean "fall through".
    Jump {
        code: u16,
        k: u32,
        on_true: Option<Label>,
        on_false: Option<Label>,
    },
    Ret(u32),
    Label(Label),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Label(u32);

/// Two-pass assembler: push labelled clauses, then resolve every jump's
/// target label to a forward displacement counted from the instruction
/// immediately following the jump, per classic-BPF's encoding.
struct Assembler {
    clauses: Vec<Clause>,
    next_label: u32,
}

impl Assembler {
    fn new() -> Self {
        Self {
            clauses: Vec::new(),
            next_label: 0,
        }
    }

    fn fresh_label(&mut self) -> Label {
        let l = Label(self.next_label);
        self.next_label += 1;
        l
    }

    fn stmt(&mut self, code: u16, k: u32) {
        self.clauses.push(Clause::Stmt(code, k));
    }

    fn jump(&mut self, code: u16, k: u32, on_true: Option<Label>, on_false: Option<Label>) {
        self.clauses.push(Clause::Jump {
            code,
            k,
            on_true,
            on_false,
        });
    }

    fn mark(&mut self, label: Label) {
        self.clauses.push(Clause::Label(label));
    }

    fn ret(&mut self, k: u32) {
        self.clauses.push(Clause::Ret(k));
    }

    /// Resolve labels to displacements and produce the final program.
    ///
    /// Pass 1: walk the clause list, assigning each non-`Label` clause an
    /// instruction index and recording the index assigned to each `Label`
    /// marker. Pass 2: for each jump, compute `target_index - (jump_index +
    /// 1)` and reject programs whose displacement does not fit in a `u8`
    /// or whose instruction count exceeds [`MAX_BPF_INSNS`].
    fn assemble(self) -> Result<BpfProgram> {
        let mut label_index = std::collections::HashMap::new();
        let mut insn_count = 0usize;
        for clause in &self.clauses {
            match clause {
                Clause::Label(l) => {
                    label_index.insert(*l, insn_count);
                }
                _ => insn_count += 1,
            }
        }

        if insn_count > MAX_BPF_INSNS {
            return Err(Error::Filter(format!(
                "compiled program has {insn_count} instructions, exceeding the {MAX_BPF_INSNS} limit"
            )));
        }

        let mut insns = Vec::with_capacity(insn_count);
        let mut index = 0usize;
        for clause in &self.clauses {
            match clause {
                Clause::Label(_) => continue,
                Clause::Stmt(code, k) => {
                    insns.push(BpfInsn::stmt(*code, *k));
                    index += 1;
                }
                Clause::Ret(k) => {
                    insns.push(BpfInsn::stmt(BPF_RET_K, *k));
                    index += 1;
                }
                Clause::Jump {
                    code,
                    k,
                    on_true,
                    on_false,
                } => {
                    let jt = resolve_displacement(index, *on_true, &label_index)?;
                    let jf = resolve_displacement(index, *on_false, &label_index)?;
                    insns.push(BpfInsn::jump(*code, *k, jt, jf));
                    index += 1;
                }
            }
        }

        Ok(BpfProgram { insns })
    }
}

fn resolve_displacement(
    jump_index: usize,
    label: Option<Label>,
    label_index: &std::collections::HashMap<Label, usize>,
) -> Result<u8> {
    let Some(label) = label else {
        return Ok(0); // fall through to the very next instruction
    };
    let target = *label_index
        .get(&label)
        .ok_or_else(|| Error::Filter("unresolved jump label in compiled BPF program".to_string()))?;
    let disp = target as isize - (jump_index as isize + 1);
    if disp < 0 || disp > u8::MAX as isize {
        return Err(Error::Filter(format!(
            "jump displacement {disp} out of BPF's 8-bit range"
        )));
    }
    Ok(disp as u8)
}

/// Emit the shared "is this an IPv4 frame addressed to `local_ip`, with
/// protocol `ip_proto`, and not an IPv4 fragment" prefix used by every
/// filter mode. `reject` is the label every failing branch jumps to.
fn emit_ipv4_unfragmented_proto_prefix(
    asm: &mut Assembler,
    local_ip: Ipv4Addr,
    ip_proto: u32,
    reject: Label,
) {
    asm.stmt(BPF_LD_H_ABS, ETHERTYPE_OFFSET);
    let ok_after_ethertype = asm.fresh_label();
    asm.jump(BPF_JMP_JEQ_K, ETHERTYPE_IPV4, Some(ok_after_ethertype), Some(reject));
    asm.mark(ok_after_ethertype);

    asm.stmt(BPF_LD_W_ABS, IPV4_DST_OFFSET);
    let ok_after_dst = asm.fresh_label();
    asm.jump(
        BPF_JMP_JEQ_K,
        u32::from_be_bytes(local_ip.octets()),
        Some(ok_after_dst),
        Some(reject),
    );
    asm.mark(ok_after_dst);

    asm.stmt(BPF_LD_B_ABS, IPV4_PROTO_OFFSET);
    let ok_after_proto = asm.fresh_label();
    asm.jump(BPF_JMP_JEQ_K, ip_proto, Some(ok_after_proto), Some(reject));
    asm.mark(ok_after_proto);

    asm.stmt(BPF_LD_H_ABS, IPV4_FLAGS_FRAG_OFFSET);
    let not_fragment = asm.fresh_label();
    // jset: non-zero fragment offset bits means this is a fragment, reject.
    asm.jump(BPF_JMP_JSET_K, IP_MF_OR_FRAGOFF_MASK, Some(reject), Some(not_fragment));
    asm.mark(not_fragment);
}

/// Emit the "TCP flags byte at `14 + IHL + 13`, masked with 0x12, equals
/// 0x12" test (SYN+ACK), assuming the IPv4/TCP/non-fragment prefix already
/// matched. Falls through to `accept` on match, jumps to `reject` otherwise.
fn emit_tcp_synack_suffix(asm: &mut Assembler, accept: Label, reject: Label) {
    asm.stmt(BPF_LDX_B_MSH, ETH_HDR_LEN); // X = IHL*4, loaded relative to offset 14
    asm.stmt(BPF_LD_B_IND, ETH_HDR_LEN + TCP_FLAGS_REL_OFFSET); // A = data[X + 14+13]
    asm.stmt(BPF_ALU_AND_K, TCP_SYNACK_MASK);
    asm.jump(BPF_JMP_JEQ_K, TCP_SYNACK_MASK, Some(accept), Some(reject));
}

/// Compile the TCP SYN-response filter: IPv4/TCP frames to `local_ip`,
/// non-fragment, with `(flags & 0x12) == 0x12`.
pub fn tcp_syn_filter(local_ip: Ipv4Addr) -> Result<BpfProgram> {
    let mut asm = Assembler::new();
    let reject = asm.fresh_label();
    let accept = asm.fresh_label();

    emit_ipv4_unfragmented_proto_prefix(&mut asm, local_ip, IP_PROTO_TCP, reject);
    emit_tcp_synack_suffix(&mut asm, accept, reject);

    asm.mark(accept);
    asm.ret(ACCEPT_SNAPLEN);
    asm.mark(reject);
    asm.ret(REJECT);

    asm.assemble()
}

/// Compile the combined TCP+ICMP filter for host discovery: accept an ICMP
/// Echo Reply to `local_ip`, OR a TCP SYN+ACK/RST matching the SYN-scan
/// conditions. Length is fixed and does not depend on port count — host
/// discovery does not filter by source port.
pub fn discovery_filter(local_ip: Ipv4Addr) -> Result<BpfProgram> {
    let mut asm = Assembler::new();
    let reject = asm.fresh_label();
    let accept = asm.fresh_label();
    let try_tcp = asm.fresh_label();

    // Ethertype + dst-IP prefix shared by both branches.
    asm.stmt(BPF_LD_H_ABS, ETHERTYPE_OFFSET);
    let after_ethertype = asm.fresh_label();
    asm.jump(BPF_JMP_JEQ_K, ETHERTYPE_IPV4, Some(after_ethertype), Some(reject));
    asm.mark(after_ethertype);

    asm.stmt(BPF_LD_W_ABS, IPV4_DST_OFFSET);
    let after_dst = asm.fresh_label();
    asm.jump(
        BPF_JMP_JEQ_K,
        u32::from_be_bytes(local_ip.octets()),
        Some(after_dst),
        Some(reject),
    );
    asm.mark(after_dst);

    asm.stmt(BPF_LD_H_ABS, IPV4_FLAGS_FRAG_OFFSET);
    let not_fragment = asm.fresh_label();
    asm.jump(BPF_JMP_JSET_K, IP_MF_OR_FRAGOFF_MASK, Some(reject), Some(not_fragment));
    asm.mark(not_fragment);

    // Branch on protocol: ICMP -> echo-reply check; TCP -> SYN+ACK/RST check.
    asm.stmt(BPF_LD_B_ABS, IPV4_PROTO_OFFSET);
    let is_icmp = asm.fresh_label();
    asm.jump(BPF_JMP_JEQ_K, IP_PROTO_ICMP, Some(is_icmp), Some(try_tcp));
    asm.mark(is_icmp);

    asm.stmt(BPF_LD_B_ABS, ETH_HDR_LEN + 20); // ICMP type is the first byte after a 20-byte IPv4 header
    asm.jump(BPF_JMP_JEQ_K, ICMP_ECHO_REPLY_TYPE, Some(accept), Some(reject));

    asm.mark(try_tcp);
    asm.stmt(BPF_LD_B_ABS, IPV4_PROTO_OFFSET);
    let is_tcp = asm.fresh_label();
    asm.jump(BPF_JMP_JEQ_K, IP_PROTO_TCP, Some(is_tcp), Some(reject));
    asm.mark(is_tcp);

    emit_tcp_synack_or_rst_suffix(&mut asm, accept, reject);

    asm.mark(accept);
    asm.ret(ACCEPT_SNAPLEN);
    asm.mark(reject);
    asm.ret(REJECT);

    asm.assemble()
}

/// SYN+ACK (exactly 0x12) or RST (any of 0x04/0x14): the discovery
/// variant's TCP acceptance condition. The SYN+ACK test masks with 0x12
/// before comparing equal, same as
/// `emit_tcp_synack_suffix` — a bare `jset` on 0x12 would also accept a
/// plain ACK or a plain SYN, which is not what this filter is meant to pass.
/// The flags byte is reloaded before the RST test because `BPF_ALU_AND_K`
/// overwrites the accumulator with the masked value.
fn emit_tcp_synack_or_rst_suffix(asm: &mut Assembler, accept: Label, reject: Label) {
    asm.stmt(BPF_LDX_B_MSH, ETH_HDR_LEN);
    asm.stmt(BPF_LD_B_IND, ETH_HDR_LEN + TCP_FLAGS_REL_OFFSET);
    asm.stmt(BPF_ALU_AND_K, TCP_SYNACK_MASK);
    let check_rst = asm.fresh_label();
    asm.jump(BPF_JMP_JEQ_K, TCP_SYNACK_MASK, Some(accept), Some(check_rst));
    asm.mark(check_rst);
    asm.stmt(BPF_LDX_B_MSH, ETH_HDR_LEN);
    asm.stmt(BPF_LD_B_IND, ETH_HDR_LEN + TCP_FLAGS_REL_OFFSET);
    asm.jump(BPF_JMP_JSET_K, 0x04, Some(accept), Some(reject));
}

/// Compile the ICMP-Port-Unreachable filter used after UDP probing: IPv4
/// ICMP type 3 code 3 to `local_ip`.
pub fn icmp_unreachable_filter(local_ip: Ipv4Addr) -> Result<BpfProgram> {
    let mut asm = Assembler::new();
    let reject = asm.fresh_label();
    let accept = asm.fresh_label();

    emit_ipv4_unfragmented_proto_prefix(&mut asm, local_ip, IP_PROTO_ICMP, reject);

    asm.stmt(BPF_LD_B_ABS, ETH_HDR_LEN + 20); // ICMP type
    let type_ok = asm.fresh_label();
    asm.jump(BPF_JMP_JEQ_K, ICMP_UNREACHABLE_TYPE, Some(type_ok), Some(reject));
    asm.mark(type_ok);

    asm.stmt(BPF_LD_B_ABS, ETH_HDR_LEN + 21); // ICMP code
    asm.jump(
        BPF_JMP_JEQ_K,
        ICMP_PORT_UNREACHABLE_CODE,
        Some(accept),
        Some(reject),
    );

    asm.mark(accept);
    asm.ret(ACCEPT_SNAPLEN);
    asm.mark(reject);
    asm.ret(REJECT);

    asm.assemble()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> Ipv4Addr {
        "192.168.1.10".parse().unwrap()
    }

    #[test]
    fn tcp_syn_filter_compiles_within_limit() {
        let prog = tcp_syn_filter(local()).unwrap();
        assert!(!prog.is_empty());
        assert!(prog.len() <= MAX_BPF_INSNS);
    }

    #[test]
    fn tcp_syn_filter_ends_in_two_returns() {
        let prog = tcp_syn_filter(local()).unwrap();
        let rets: Vec<_> = prog
            .instructions()
            .iter()
            .filter(|i| i.code == BPF_RET_K)
            .collect();
        assert_eq!(rets.len(), 2);
        assert!(rets.iter().any(|i| i.k == ACCEPT_SNAPLEN));
        assert!(rets.iter().any(|i| i.k == REJECT));
    }

    #[test]
    fn all_jump_displacements_are_forward_and_in_range() {
        for prog in [
            tcp_syn_filter(local()).unwrap(),
            discovery_filter(local()).unwrap(),
            icmp_unreachable_filter(local()).unwrap(),
        ] {
            for (i, insn) in prog.instructions().iter().enumerate() {
                if insn.code == BPF_JMP_JEQ_K || insn.code == BPF_JMP_JSET_K {
                    let jt_target = i + 1 + insn.jt as usize;
                    let jf_target = i + 1 + insn.jf as usize;
                    assert!(jt_target <= prog.len());
                    assert!(jf_target <= prog.len());
                }
            }
        }
    }

    #[test]
    fn discovery_filter_does_not_grow_with_port_count() {
        // The discovery filter never references a port set at all; this is
        // a fixed-shape program regardless of how many ports pscan might
        // use elsewhere in the run.
        let a = discovery_filter(local()).unwrap();
        let b = discovery_filter("10.1.1.1".parse().unwrap()).unwrap();
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn icmp_unreachable_filter_checks_type_and_code() {
        let prog = icmp_unreachable_filter(local()).unwrap();
        assert!(prog
            .instructions()
            .iter()
            .any(|i| i.code == BPF_JMP_JEQ_K && i.k == ICMP_UNREACHABLE_TYPE));
        assert!(prog
            .instructions()
            .iter()
            .any(|i| i.code == BPF_JMP_JEQ_K && i.k == ICMP_PORT_UNREACHABLE_CODE));
    }

    #[test]
    fn tcp_flags_byte_is_loaded_indexed_by_ihl() {
        // The TCP flags byte sits at 14+IHL+13, and IHL varies per packet
        // (options aside, usually 20 but never hard-coded); the compiler
        // must load it with the X-indexed form (BPF_LD_B_IND), not a fixed
        // absolute offset, or every reply with IHL != 0 would be misread.
        for prog in [tcp_syn_filter(local()).unwrap(), discovery_filter(local()).unwrap()] {
            assert!(
                prog.instructions().iter().any(|i| i.code == BPF_LDX_B_MSH),
                "expected an X = IHL*4 load"
            );
            assert!(
                prog.instructions()
                    .iter()
                    .any(|i| i.code == BPF_LD_B_IND && i.k == ETH_HDR_LEN + TCP_FLAGS_REL_OFFSET),
                "expected an indexed load of the TCP flags byte"
            );
            assert!(
                !prog
                    .instructions()
                    .iter()
                    .any(|i| i.code == BPF_LD_B_ABS && i.k == ETH_HDR_LEN + TCP_FLAGS_REL_OFFSET),
                "flags byte must not be loaded with a fixed absolute offset"
            );
        }
    }

    #[test]
    fn discovery_filter_matches_synack_exactly_not_any_set_bit() {
        // A bare `jset 0x12` would also accept a plain ACK or a plain SYN;
        // the SYN+ACK branch must mask with 0x12 and compare equal, the
        // same pattern `tcp_syn_filter` uses, and must never test 0x12 with
        // a bare jset.
        let prog = discovery_filter(local()).unwrap();
        assert!(
            prog.instructions()
                .iter()
                .any(|i| i.code == BPF_ALU_AND_K && i.k == TCP_SYNACK_MASK),
            "expected an AND(0x12) before the SYN+ACK equality test"
        );
        assert!(
            !prog
                .instructions()
                .iter()
                .any(|i| i.code == BPF_JMP_JSET_K && i.k == TCP_SYNACK_MASK),
            "SYN+ACK must not be tested with a bare jset, it over-matches ACK-only/SYN-only packets"
        );
        assert!(
            prog.instructions()
                .iter()
                .any(|i| i.code == BPF_JMP_JSET_K && i.k == 0x04),
            "RST must still be tested with a bare jset (0x04 alone or with ACK both count)"
        );
    }

    #[test]
    fn ethertype_load_is_first_instruction() {
        for prog in [
            tcp_syn_filter(local()).unwrap(),
            discovery_filter(local()).unwrap(),
            icmp_unreachable_filter(local()).unwrap(),
        ] {
            assert_eq!(prog.instructions()[0].code, BPF_LD_H_ABS);
            assert_eq!(prog.instructions()[0].k, ETHERTYPE_OFFSET);
        }
    }
}
