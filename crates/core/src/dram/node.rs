//! Nodes of the DRAM organization tree.
//!
//! The device tree (channel → rank → bankgroup → bank) is stored as an arena
//! of nodes addressed by integer index, with parent/child links as indices.
//! Rows are not materialized: a bank-level node carries a row-state map that
//! is populated on demand. Each node tracks, per command, the next cycle the
//! command may issue here and a ring of past issuance cycles sized to the
//! largest timing window that consults it.

use std::collections::{HashMap, VecDeque};

use crate::dram::spec::DramSpec;
use crate::request::Clk;

/// One node in the organization tree.
pub struct Node {
    /// Organization level of this node (0 = channel).
    pub level: usize,
    /// Id of this node among its siblings.
    pub node_id: i64,
    /// Arena index of the parent; `None` for the channel root.
    pub parent: Option<usize>,
    /// Arena indices of the children, ordered by child id.
    pub children: Vec<usize>,

    /// Current state, drawn from the spec's state table.
    pub state: i32,

    /// Next cycle each command may issue at this node; `-1` = unconstrained.
    pub cmd_ready_clk: Vec<Clk>,
    /// Issue history per command, most recent first; empty when no
    /// constraint at this level keeps history for the command.
    pub cmd_history: Vec<VecDeque<Clk>>,

    /// Row states, present only at bank-level nodes; keyed by row id.
    pub row_state: HashMap<i64, i32>,
}

impl Node {
    fn new(spec: &DramSpec, level: usize, node_id: i64, parent: Option<usize>) -> Self {
        let num_cmds = spec.num_commands();
        let mut cmd_history = Vec::with_capacity(num_cmds);
        for cmd in 0..num_cmds {
            let window = spec.max_window(level, cmd);
            let mut ring = VecDeque::new();
            if window > 0 {
                ring.resize(window, -1);
            }
            cmd_history.push(ring);
        }
        Self {
            level,
            node_id,
            parent,
            children: Vec::new(),
            state: spec.init_states[level],
            cmd_ready_clk: vec![-1; num_cmds],
            cmd_history,
            row_state: HashMap::new(),
        }
    }

    /// Records an issuance of `cmd` at `clk`, evicting the oldest entry.
    /// No-op for commands without history at this level.
    pub fn record_issue(&mut self, cmd: usize, clk: Clk) {
        let ring = &mut self.cmd_history[cmd];
        if !ring.is_empty() {
            ring.pop_back();
            ring.push_front(clk);
        }
    }

    /// The `window`-th most recent issuance of `cmd` (1 = newest), or `-1`
    /// when the history is not yet that deep.
    pub fn past_issue(&self, cmd: usize, window: usize) -> Clk {
        self.cmd_history[cmd].get(window - 1).copied().unwrap_or(-1)
    }
}

/// Arena of tree nodes; index 0 is the channel root.
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    /// Builds the tree for one channel, materializing levels down to the one
    /// just above the spec's row level.
    pub fn build(spec: &DramSpec, channel_id: usize) -> Self {
        let mut arena = Self { nodes: Vec::new() };
        arena.grow(spec, 0, channel_id as i64, None);
        arena
    }

    fn grow(&mut self, spec: &DramSpec, level: usize, node_id: i64, parent: Option<usize>) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::new(spec, level, node_id, parent));

        let next_level = level + 1;
        if next_level == spec.row_level {
            return idx;
        }
        let count = spec.organization[next_level];
        for child_id in 0..count {
            let child = self.grow(spec, next_level, child_id as i64, Some(idx));
            self.nodes[idx].children.push(child);
        }
        idx
    }

    /// Arena index of the channel root.
    #[inline]
    pub fn root(&self) -> usize {
        0
    }

    /// Number of materialized nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the arena holds no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrows the node at `idx`.
    #[inline]
    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    /// Mutably borrows the node at `idx`.
    #[inline]
    pub fn node_mut(&mut self, idx: usize) -> &mut Node {
        &mut self.nodes[idx]
    }

    /// Collects the arena indices of every strict descendant of `idx`.
    pub fn descendants(&self, idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[idx].children.clone();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend_from_slice(&self.nodes[n].children);
        }
        out
    }
}
