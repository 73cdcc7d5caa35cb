//! Static DRAM device descriptors.
//!
//! A [`DramSpec`] is the data-driven description of one DRAM standard: level
//! names, command names, request-to-command translations, per-command
//! metadata and scopes, the timing-constraint table, initial node states,
//! and the four callback tables (actions, prerequisites, row-hit, row-open)
//! indexed by `(level, command)`.
//!
//! Per-command behaviour is carried by plain function pointers in
//! two-dimensional tables, so new standards are added by building new tables
//! rather than by subclassing anything.

use crate::dram::node::NodeArena;
use crate::request::{AddrVec, Clk};

/// Name table with ordinal lookup (levels, commands, requests, states).
#[derive(Clone, Debug, Default)]
pub struct SpecDef {
    names: Vec<String>,
}

impl SpecDef {
    /// Builds a definition from a name list; ordinals follow list order.
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Number of defined entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no entries are defined.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Ordinal of `name`, if defined.
    pub fn index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Name of ordinal `id`.
    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }
}

/// Per-command metadata flags.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandMeta {
    /// The command opens a row (e.g. ACT).
    pub is_opening: bool,
    /// The command closes one or more rows (e.g. PRE, PREA).
    pub is_closing: bool,
    /// The command is a refresh.
    pub is_refreshing: bool,
    /// The command accesses columns (RD/WR).
    pub is_accessing: bool,
}

/// One timing constraint, attached to `(level, issued-command)`.
///
/// After the trigger command issues at a node of that level, the `window`-th
/// most recent issuance of the trigger plus `val` becomes the earliest legal
/// cycle for `cmd` at the node. With `sibling` set, the constraint instead
/// applies as `clk + val` to every non-target peer at the level.
#[derive(Clone, Copy, Debug)]
pub struct TimingEntry {
    /// Command whose ready-clock is pushed out.
    pub cmd: usize,
    /// Which prior issuance of the trigger anchors the constraint (1 = this one).
    pub window: usize,
    /// Cycle distance from the anchor.
    pub val: Clk,
    /// Apply to non-target siblings instead of the target path.
    pub sibling: bool,
}

/// Node state-machine update, invoked along the action walk.
pub type ActionFn = fn(&mut NodeArena, usize, &DramSpec, usize, i64, Clk);

/// Prerequisite query. `None` continues the walk to the addressed child;
/// `Some(cmd)` terminates the walk with that command (possibly the queried
/// command itself, meaning no prerequisite intervenes).
pub type PreqFn = fn(&NodeArena, usize, &DramSpec, usize, &AddrVec, Clk) -> Option<usize>;

/// Row-buffer predicate (row-hit or row-open), answered at the level that
/// defines it.
pub type RowFn = fn(&NodeArena, usize, &DramSpec, usize, i64, Clk) -> bool;

/// `[level][command]` table of optional callbacks.
pub type FuncMatrix<T> = Vec<Vec<Option<T>>>;

/// Complete static descriptor for one DRAM standard.
pub struct DramSpec {
    /// Organization level names, root first (e.g. channel..column).
    pub levels: SpecDef,
    /// Command names.
    pub commands: SpecDef,
    /// Request-type names; the first three must be read, write, partial-write.
    pub requests: SpecDef,
    /// Node state names.
    pub states: SpecDef,

    /// Instance count per level (slot 0 is the channel count).
    pub organization: Vec<usize>,
    /// Level at which each command directly acts; walks stop here.
    pub scope: Vec<usize>,
    /// Metadata flags per command.
    pub meta: Vec<CommandMeta>,
    /// Final command completing each request type.
    pub translations: Vec<usize>,
    /// Initial node state per level.
    pub init_states: Vec<i32>,

    /// Timing table: `timing[level][command]` lists the constraints that
    /// issuing `command` at a node of `level` imposes.
    pub timing: Vec<Vec<Vec<TimingEntry>>>,

    /// State-machine actions per `(level, command)`.
    pub actions: FuncMatrix<ActionFn>,
    /// Prerequisite queries per `(level, command)`.
    pub preqs: FuncMatrix<PreqFn>,
    /// Row-buffer-hit predicates per `(level, command)`.
    pub rowhits: FuncMatrix<RowFn>,
    /// Row-open predicates per `(level, command)`.
    pub rowopens: FuncMatrix<RowFn>,

    /// Cycles from RD issuance to data return.
    pub read_latency: Clk,
    /// Average refresh interval in controller cycles (drives the refresh manager).
    pub refresh_interval: Clk,

    /// Index of the row level; nodes below the bank are not materialized.
    pub row_level: usize,

    /// Whether the energy accounting walk runs on issue.
    pub power_enable: bool,
    /// Per-command energy increment (pJ), used when `power_enable` is set.
    pub cmd_energy: Vec<f64>,
}

impl DramSpec {
    /// Allocates an empty `[level][command]` callback matrix.
    pub fn empty_matrix<T: Copy>(num_levels: usize, num_commands: usize) -> FuncMatrix<T> {
        vec![vec![None; num_commands]; num_levels]
    }

    /// Number of organization levels.
    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of commands.
    #[inline]
    pub fn num_commands(&self) -> usize {
        self.commands.len()
    }

    /// Ordinal of the named level. Panics if absent; level names are part of
    /// the spec contract, so a miss is a table bug.
    pub fn level(&self, name: &str) -> usize {
        match self.levels.index(name) {
            Some(l) => l,
            None => panic!("spec has no level named {:?}", name),
        }
    }

    /// Ordinal of the named command. Panics if absent.
    pub fn command(&self, name: &str) -> usize {
        match self.commands.index(name) {
            Some(c) => c,
            None => panic!("spec has no command named {:?}", name),
        }
    }

    /// Largest history window any constraint at `(level, cmd)` uses.
    /// Zero means the command keeps no issue history at that level.
    pub fn max_window(&self, level: usize, cmd: usize) -> usize {
        self.timing[level][cmd]
            .iter()
            .filter(|t| !t.sibling)
            .map(|t| t.window)
            .max()
            .unwrap_or(0)
    }

    /// Sanity-checks table shapes against each other. Called once at device
    /// construction; failures indicate a bug in the spec builder.
    pub fn validate(&self) {
        let nl = self.num_levels();
        let nc = self.num_commands();
        assert!(nl > 0, "spec defines no levels");
        assert_eq!(self.organization.len(), nl, "organization count mismatch");
        assert_eq!(self.scope.len(), nc, "command scope table mismatch");
        assert_eq!(self.meta.len(), nc, "command meta table mismatch");
        assert_eq!(self.init_states.len(), nl, "init state table mismatch");
        assert_eq!(
            self.translations.len(),
            self.requests.len(),
            "request translation table mismatch"
        );
        assert_eq!(self.timing.len(), nl, "timing table level mismatch");
        for per_level in &self.timing {
            assert_eq!(per_level.len(), nc, "timing table command mismatch");
        }
        for (cmd, &scope) in self.scope.iter().enumerate() {
            assert!(
                scope < nl,
                "command {} scoped to nonexistent level",
                self.commands.name(cmd)
            );
        }
        for &final_cmd in &self.translations {
            assert!(final_cmd < nc, "request translated to nonexistent command");
        }
        assert!(self.row_level < nl, "row level out of range");
        assert!(self.read_latency >= 0, "read latency unset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_def_lookup() {
        let def = SpecDef::new(&["channel", "rank", "bank"]);
        assert_eq!(def.len(), 3);
        assert_eq!(def.index("rank"), Some(1));
        assert_eq!(def.index("row"), None);
        assert_eq!(def.name(2), "bank");
    }

    #[test]
    fn max_window_ignores_sibling_rows() {
        let spec = crate::dram::preset::generic_ddr(&crate::config::DramConfig::default());
        let rank = spec.level("rank");
        let act = spec.command("ACT");
        // tFAW keeps a four-deep ACT history at rank level.
        assert_eq!(spec.max_window(rank, act), 4);
    }
}
