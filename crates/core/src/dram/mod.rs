//! The DRAM device model.
//!
//! A [`Dram`] owns the organization tree for one channel and answers the
//! controller's five questions:
//! 1. **issue_command:** Update node states, then timing, along the address walk.
//! 2. **get_preq_command:** Which preparatory command does this request need right now?
//! 3. **check_ready:** Do all timing constraints on the path allow the command this cycle?
//! 4. **check_rowbuffer_hit / check_node_open:** Row-buffer classification for statistics.
//! 5. **notify:** Runtime reconfiguration side channel.
//!
//! Recursion policy: a walk stops at the command's scope level; an address
//! slot of `-1` above the scope fans out to every child at that level
//! (all-bank commands). All recursion is over arena indices.

pub mod node;
pub mod preset;
pub mod spec;

use log::warn;

use crate::dram::node::NodeArena;
use crate::dram::spec::{DramSpec, TimingEntry};
use crate::request::{AddrVec, Clk};

/// One channel's DRAM device: spec tables plus the node tree.
pub struct Dram {
    /// The static descriptor this device was built from.
    pub spec: DramSpec,
    nodes: NodeArena,
    clk: Clk,

    /// Issued-command trace `(cycle, command, addr_vec)`, kept only when
    /// recording is enabled.
    command_log: Vec<(Clk, usize, AddrVec)>,
    record_commands: bool,

    /// Per-command issue counts.
    cmd_counts: Vec<u64>,
    /// Accumulated command energy in pJ (power model enabled only).
    energy_pj: f64,
}

impl Dram {
    /// Builds the device for `channel_id` from a validated spec.
    pub fn new(spec: DramSpec, channel_id: usize) -> Self {
        spec.validate();
        let nodes = NodeArena::build(&spec, channel_id);
        let cmd_counts = vec![0; spec.num_commands()];
        Self {
            spec,
            nodes,
            clk: 0,
            command_log: Vec::new(),
            record_commands: false,
            cmd_counts,
            energy_pj: 0.0,
        }
    }

    /// Advances the device clock by one cycle.
    pub fn tick(&mut self) {
        self.clk += 1;
    }

    /// Current device cycle.
    #[inline]
    pub fn clk(&self) -> Clk {
        self.clk
    }

    /// Enables or disables the issued-command trace.
    pub fn set_record_commands(&mut self, on: bool) {
        self.record_commands = on;
    }

    /// The issued-command trace recorded so far.
    pub fn command_log(&self) -> &[(Clk, usize, AddrVec)] {
        &self.command_log
    }

    /// Per-command issue counts, indexed by command ordinal.
    pub fn cmd_counts(&self) -> &[u64] {
        &self.cmd_counts
    }

    /// Accumulated command energy in pJ.
    pub fn energy_pj(&self) -> f64 {
        self.energy_pj
    }

    /// Issues `cmd` at `addr_vec`: runs the action walk, then the timing
    /// walk, then (if enabled) energy accounting.
    pub fn issue_command(&mut self, cmd: usize, addr_vec: &AddrVec) {
        debug_assert_eq!(addr_vec.len(), self.spec.num_levels());
        let root = self.nodes.root();
        update_states(&self.spec, &mut self.nodes, root, cmd, addr_vec, self.clk);
        update_timing(&self.spec, &mut self.nodes, root, cmd, addr_vec, self.clk);

        self.cmd_counts[cmd] += 1;
        if self.spec.power_enable {
            self.energy_pj += self.spec.cmd_energy[cmd];
        }
        if self.record_commands {
            self.command_log.push((self.clk, cmd, addr_vec.clone()));
        }
    }

    /// Returns the deepest prerequisite the request currently needs, or
    /// `cmd` itself when nothing intervenes.
    pub fn get_preq_command(&self, cmd: usize, addr_vec: &AddrVec) -> usize {
        get_preq(&self.spec, &self.nodes, self.nodes.root(), cmd, addr_vec, self.clk)
    }

    /// Returns true when every node on the path (and, under a broadcast
    /// slot, every fanned-out sibling) allows `cmd` this cycle.
    pub fn check_ready(&self, cmd: usize, addr_vec: &AddrVec) -> bool {
        check_ready(&self.spec, &self.nodes, self.nodes.root(), cmd, addr_vec, self.clk)
    }

    /// Returns true when the access would hit an already-open row.
    pub fn check_rowbuffer_hit(&self, cmd: usize, addr_vec: &AddrVec) -> bool {
        check_row(
            &self.spec.rowhits,
            &self.spec,
            &self.nodes,
            self.nodes.root(),
            cmd,
            addr_vec,
            self.clk,
        )
    }

    /// Returns true when the addressed bank has any row open.
    pub fn check_node_open(&self, cmd: usize, addr_vec: &AddrVec) -> bool {
        check_row(
            &self.spec.rowopens,
            &self.spec,
            &self.nodes,
            self.nodes.root(),
            cmd,
            addr_vec,
            self.clk,
        )
    }

    /// Runtime reconfiguration side channel.
    ///
    /// Known keys: `refresh_interval` (cycles, overrides the spec value read
    /// by the refresh manager) and `power_enable` (0/1). Unknown keys are
    /// logged and ignored.
    pub fn notify(&mut self, key: &str, value: u64) {
        match key {
            "refresh_interval" => self.spec.refresh_interval = value as Clk,
            "power_enable" => self.spec.power_enable = value != 0,
            _ => warn!("dram notify: unknown key {:?} (value {})", key, value),
        }
    }
}

fn update_states(
    spec: &DramSpec,
    nodes: &mut NodeArena,
    idx: usize,
    cmd: usize,
    addr_vec: &AddrVec,
    clk: Clk,
) {
    let level = nodes.node(idx).level;
    let child_slot = addr_vec.get(level + 1).copied().unwrap_or(-1);
    if let Some(action) = spec.actions[level][cmd] {
        action(nodes, idx, spec, cmd, child_slot, clk);
    }

    if level == spec.scope[cmd] || nodes.node(idx).children.is_empty() {
        return;
    }
    if child_slot == -1 {
        let children = nodes.node(idx).children.clone();
        for child in children {
            update_states(spec, nodes, child, cmd, addr_vec, clk);
        }
    } else {
        let child = nodes.node(idx).children[child_slot as usize];
        update_states(spec, nodes, child, cmd, addr_vec, clk);
    }
}

fn update_timing(
    spec: &DramSpec,
    nodes: &mut NodeArena,
    idx: usize,
    cmd: usize,
    addr_vec: &AddrVec,
    clk: Clk,
) {
    let level = nodes.node(idx).level;
    let slot = addr_vec.get(level).copied().unwrap_or(-1);

    // Off-path node: only sibling-flagged constraints apply, and the walk
    // does not descend further.
    if nodes.node(idx).node_id != slot && slot != -1 {
        let node = nodes.node_mut(idx);
        for t in spec.timing[level][cmd].iter().filter(|t| t.sibling) {
            apply_constraint(&mut node.cmd_ready_clk, t, clk + t.val);
        }
        return;
    }

    // Target path: record the issuance, then push out ready-clocks anchored
    // on this command's own history.
    {
        let node = nodes.node_mut(idx);
        node.record_issue(cmd, clk);
        for t in spec.timing[level][cmd].iter().filter(|t| !t.sibling) {
            let past = node.past_issue(cmd, t.window);
            if past < 0 {
                continue;
            }
            apply_constraint(&mut node.cmd_ready_clk, t, past + t.val);
        }
    }

    // Every child is visited; off-path children take the sibling branch.
    let children = nodes.node(idx).children.clone();
    for child in children {
        update_timing(spec, nodes, child, cmd, addr_vec, clk);
    }
}

/// Independent constraints on the same command compose by maximum.
fn apply_constraint(ready: &mut [Clk], t: &TimingEntry, future: Clk) {
    if future > ready[t.cmd] {
        ready[t.cmd] = future;
    }
}

fn get_preq(
    spec: &DramSpec,
    nodes: &NodeArena,
    idx: usize,
    cmd: usize,
    addr_vec: &AddrVec,
    clk: Clk,
) -> usize {
    let node = nodes.node(idx);
    if let Some(preq) = spec.preqs[node.level][cmd] {
        if let Some(required) = preq(nodes, idx, spec, cmd, addr_vec, clk) {
            return required;
        }
    }
    if node.children.is_empty() {
        return cmd;
    }
    let child_slot = addr_vec[node.level + 1];
    debug_assert!(
        child_slot >= 0,
        "broadcast slot below the level answering prerequisites for {}",
        spec.commands.name(cmd)
    );
    get_preq(spec, nodes, node.children[child_slot as usize], cmd, addr_vec, clk)
}

fn check_ready(
    spec: &DramSpec,
    nodes: &NodeArena,
    idx: usize,
    cmd: usize,
    addr_vec: &AddrVec,
    clk: Clk,
) -> bool {
    let node = nodes.node(idx);
    let ready = node.cmd_ready_clk[cmd];
    if ready != -1 && clk < ready {
        return false;
    }
    if node.level == spec.scope[cmd] || node.children.is_empty() {
        return true;
    }
    let child_slot = addr_vec.get(node.level + 1).copied().unwrap_or(-1);
    if child_slot == -1 {
        node.children
            .iter()
            .all(|&child| check_ready(spec, nodes, child, cmd, addr_vec, clk))
    } else {
        check_ready(
            spec,
            nodes,
            node.children[child_slot as usize],
            cmd,
            addr_vec,
            clk,
        )
    }
}

fn check_row(
    table: &crate::dram::spec::FuncMatrix<crate::dram::spec::RowFn>,
    spec: &DramSpec,
    nodes: &NodeArena,
    idx: usize,
    cmd: usize,
    addr_vec: &AddrVec,
    clk: Clk,
) -> bool {
    let node = nodes.node(idx);
    let child_slot = addr_vec.get(node.level + 1).copied().unwrap_or(-1);
    if let Some(f) = table[node.level][cmd] {
        return f(nodes, idx, spec, cmd, child_slot, clk);
    }
    if node.children.is_empty() {
        return false;
    }
    debug_assert!(child_slot >= 0, "row query under a broadcast address slot");
    check_row(
        table,
        spec,
        nodes,
        node.children[child_slot as usize],
        cmd,
        addr_vec,
        clk,
    )
}
