//! Generic DDR-style device preset.
//!
//! Builds a [`DramSpec`] for a six-level device (channel → rank → bankgroup
//! → bank → row → column) with the classic command set {ACT, PRE, PREA, RD,
//! WR, REFab, REFsb}. Organization counts and timing values come from
//! [`DramConfig`]; the tables below are the engine configuration for a
//! generic device, not a bit-exact rendition of any JEDEC standard.

use crate::config::DramConfig;
use crate::dram::node::NodeArena;
use crate::dram::spec::{ActionFn, CommandMeta, DramSpec, FuncMatrix, PreqFn, RowFn, SpecDef, TimingEntry};
use crate::request::{AddrVec, Clk};

/// Level ordinals of the generic preset.
pub mod level {
    /// Channel (tree root).
    pub const CHANNEL: usize = 0;
    /// Rank.
    pub const RANK: usize = 1;
    /// Bank group.
    pub const BANKGROUP: usize = 2;
    /// Bank.
    pub const BANK: usize = 3;
    /// Row (not materialized; lives in the bank's row-state map).
    pub const ROW: usize = 4;
    /// Column.
    pub const COLUMN: usize = 5;
}

/// Command ordinals of the generic preset.
pub mod cmd {
    /// Activate: open a row into the bank's row buffer.
    pub const ACT: usize = 0;
    /// Precharge: close the open row of one bank.
    pub const PRE: usize = 1;
    /// Precharge-all: close every bank of a rank.
    pub const PREA: usize = 2;
    /// Column read.
    pub const RD: usize = 3;
    /// Column write.
    pub const WR: usize = 4;
    /// All-bank refresh.
    pub const REFAB: usize = 5;
    /// Per-bank refresh.
    pub const REFSB: usize = 6;
}

/// State ordinals of the generic preset.
pub mod state {
    /// A row is open (bank level) / row is the open one (row map).
    pub const OPENED: i32 = 0;
    /// No row open.
    pub const CLOSED: i32 = 1;
    /// Level keeps no state.
    pub const NA: i32 = 2;
}

/// Request-type ordinals of the generic preset. The first three match
/// [`crate::request::req_type`]; the rest are maintenance types.
pub mod reqt {
    /// Read.
    pub const READ: usize = 0;
    /// Write.
    pub const WRITE: usize = 1;
    /// Partial write (completes as a WR on the bus).
    pub const PARTIAL_WRITE: usize = 2;
    /// All-bank refresh (refresh manager).
    pub const ALL_BANK_REFRESH: usize = 3;
    /// Per-bank refresh (refresh manager).
    pub const PER_BANK_REFRESH: usize = 4;
    /// Maintenance precharge (row policies).
    pub const PRECHARGE: usize = 5;
}

/// Builds the generic DDR-style spec from configuration.
pub fn generic_ddr(cfg: &DramConfig) -> DramSpec {
    let levels = SpecDef::new(&["channel", "rank", "bankgroup", "bank", "row", "column"]);
    let commands = SpecDef::new(&["ACT", "PRE", "PREA", "RD", "WR", "REFab", "REFsb"]);
    let requests = SpecDef::new(&[
        "read",
        "write",
        "partial-write",
        "all-bank-refresh",
        "per-bank-refresh",
        "precharge",
    ]);
    let states = SpecDef::new(&["Opened", "Closed", "N/A"]);

    let organization = vec![
        cfg.organization.channel,
        cfg.organization.rank,
        cfg.organization.bankgroup,
        cfg.organization.bank,
        cfg.organization.row,
        cfg.organization.column,
    ];

    let mut scope = vec![0; commands.len()];
    scope[cmd::ACT] = level::ROW;
    scope[cmd::PRE] = level::BANK;
    scope[cmd::PREA] = level::RANK;
    scope[cmd::RD] = level::COLUMN;
    scope[cmd::WR] = level::COLUMN;
    scope[cmd::REFAB] = level::RANK;
    scope[cmd::REFSB] = level::BANK;

    let mut meta = vec![CommandMeta::default(); commands.len()];
    meta[cmd::ACT].is_opening = true;
    meta[cmd::PRE].is_closing = true;
    meta[cmd::PREA].is_closing = true;
    meta[cmd::RD].is_accessing = true;
    meta[cmd::WR].is_accessing = true;
    meta[cmd::REFAB].is_refreshing = true;
    meta[cmd::REFSB].is_refreshing = true;

    let translations = vec![
        cmd::RD,    // read
        cmd::WR,    // write
        cmd::WR,    // partial-write
        cmd::REFAB, // all-bank-refresh
        cmd::REFSB, // per-bank-refresh
        cmd::PRE,   // precharge
    ];

    let mut init_states = vec![state::NA; levels.len()];
    init_states[level::BANK] = state::CLOSED;
    init_states[level::ROW] = state::CLOSED;

    let timing = build_timing(cfg, levels.len(), commands.len());

    let mut actions: FuncMatrix<ActionFn> = DramSpec::empty_matrix(levels.len(), commands.len());
    actions[level::BANK][cmd::ACT] = Some(bank_activate);
    actions[level::BANK][cmd::PRE] = Some(bank_precharge);
    actions[level::BANK][cmd::REFSB] = Some(bank_precharge);
    actions[level::RANK][cmd::PREA] = Some(rank_close_all);
    actions[level::RANK][cmd::REFAB] = Some(rank_close_all);

    let mut preqs: FuncMatrix<PreqFn> = DramSpec::empty_matrix(levels.len(), commands.len());
    preqs[level::BANK][cmd::RD] = Some(bank_column_preq);
    preqs[level::BANK][cmd::WR] = Some(bank_column_preq);
    preqs[level::BANK][cmd::REFSB] = Some(bank_refresh_preq);
    preqs[level::RANK][cmd::REFAB] = Some(rank_refresh_preq);

    let mut rowhits: FuncMatrix<RowFn> = DramSpec::empty_matrix(levels.len(), commands.len());
    rowhits[level::BANK][cmd::RD] = Some(bank_row_hit);
    rowhits[level::BANK][cmd::WR] = Some(bank_row_hit);

    let mut rowopens: FuncMatrix<RowFn> = DramSpec::empty_matrix(levels.len(), commands.len());
    rowopens[level::BANK][cmd::RD] = Some(bank_row_open);
    rowopens[level::BANK][cmd::WR] = Some(bank_row_open);

    let mut cmd_energy = vec![0.0; commands.len()];
    cmd_energy[cmd::ACT] = 90.0;
    cmd_energy[cmd::PRE] = 45.0;
    cmd_energy[cmd::PREA] = 60.0;
    cmd_energy[cmd::RD] = 150.0;
    cmd_energy[cmd::WR] = 165.0;
    cmd_energy[cmd::REFAB] = 2400.0;
    cmd_energy[cmd::REFSB] = 320.0;

    DramSpec {
        levels,
        commands,
        requests,
        states,
        organization,
        scope,
        meta,
        translations,
        init_states,
        timing,
        actions,
        preqs,
        rowhits,
        rowopens,
        read_latency: cfg.timing.read_latency,
        refresh_interval: cfg.timing.t_refi,
        row_level: level::ROW,
        power_enable: cfg.power_enable,
        cmd_energy,
    }
}

fn build_timing(cfg: &DramConfig, num_levels: usize, num_cmds: usize) -> Vec<Vec<Vec<TimingEntry>>> {
    let t = &cfg.timing;
    let mut table: Vec<Vec<Vec<TimingEntry>>> = vec![vec![Vec::new(); num_cmds]; num_levels];

    let mut row = |lvl: usize, on: usize, affected: usize, window: usize, val: Clk, sibling: bool| {
        if val > 0 {
            table[lvl][on].push(TimingEntry {
                cmd: affected,
                window,
                val,
                sibling,
            });
        }
    };

    // Bank level: row-cycle core.
    row(level::BANK, cmd::ACT, cmd::RD, 1, t.t_rcd, false);
    row(level::BANK, cmd::ACT, cmd::WR, 1, t.t_rcd, false);
    row(level::BANK, cmd::ACT, cmd::PRE, 1, t.t_ras, false);
    row(level::BANK, cmd::ACT, cmd::ACT, 1, t.t_rc, false);
    row(level::BANK, cmd::ACT, cmd::REFSB, 1, t.t_rc, false);
    row(level::BANK, cmd::ACT, cmd::ACT, 1, t.t_rrd_l, true); // same-bankgroup spacing
    row(level::BANK, cmd::PRE, cmd::ACT, 1, t.t_rp, false);
    row(level::BANK, cmd::PRE, cmd::REFSB, 1, t.t_rp, false);
    row(level::BANK, cmd::RD, cmd::PRE, 1, t.t_rtp, false);
    row(level::BANK, cmd::WR, cmd::PRE, 1, t.t_wr, false);
    row(level::BANK, cmd::REFSB, cmd::ACT, 1, t.t_rfc_pb, false);
    row(level::BANK, cmd::REFSB, cmd::REFSB, 1, t.t_rfc_pb, false);

    // Rank level: inter-bank and bus turnaround.
    row(level::RANK, cmd::ACT, cmd::ACT, 1, t.t_rrd_s, false);
    row(level::RANK, cmd::ACT, cmd::ACT, 4, t.t_faw, false);
    row(level::RANK, cmd::ACT, cmd::REFAB, 1, t.t_rc, false);
    row(level::RANK, cmd::ACT, cmd::PREA, 1, t.t_ras, false);
    row(level::RANK, cmd::RD, cmd::PREA, 1, t.t_rtp, false);
    row(level::RANK, cmd::WR, cmd::PREA, 1, t.t_wr, false);
    row(level::RANK, cmd::RD, cmd::RD, 1, t.t_ccd, false);
    row(level::RANK, cmd::RD, cmd::WR, 1, t.t_rtw, false);
    row(level::RANK, cmd::WR, cmd::WR, 1, t.t_ccd, false);
    row(level::RANK, cmd::WR, cmd::RD, 1, t.t_wtr, false);
    row(level::RANK, cmd::PRE, cmd::REFAB, 1, t.t_rp, false);
    row(level::RANK, cmd::PREA, cmd::ACT, 1, t.t_rp, false);
    row(level::RANK, cmd::PREA, cmd::REFAB, 1, t.t_rp, false);
    row(level::RANK, cmd::REFAB, cmd::ACT, 1, t.t_rfc, false);
    row(level::RANK, cmd::REFAB, cmd::REFAB, 1, t.t_rfc, false);

    table
}

// Action: ACT opens the addressed row in this bank.
fn bank_activate(
    nodes: &mut NodeArena,
    idx: usize,
    _spec: &DramSpec,
    _cmd: usize,
    target_row: i64,
    _clk: Clk,
) {
    let node = nodes.node_mut(idx);
    node.state = state::OPENED;
    node.row_state.insert(target_row, state::OPENED);
}

// Action: PRE / REFsb close this bank.
fn bank_precharge(
    nodes: &mut NodeArena,
    idx: usize,
    _spec: &DramSpec,
    _cmd: usize,
    _target: i64,
    _clk: Clk,
) {
    let node = nodes.node_mut(idx);
    node.row_state.clear();
    node.state = state::CLOSED;
}

// Action: PREA / REFab close every bank under this rank.
fn rank_close_all(
    nodes: &mut NodeArena,
    idx: usize,
    _spec: &DramSpec,
    _cmd: usize,
    _target: i64,
    _clk: Clk,
) {
    for d in nodes.descendants(idx) {
        if nodes.node(d).level == level::BANK {
            let bank = nodes.node_mut(d);
            bank.row_state.clear();
            bank.state = state::CLOSED;
        }
    }
}

// Prerequisite for a column access at a bank: activate when closed,
// precharge when a different row is open.
fn bank_column_preq(
    nodes: &NodeArena,
    idx: usize,
    _spec: &DramSpec,
    cmd_in: usize,
    addr_vec: &AddrVec,
    _clk: Clk,
) -> Option<usize> {
    let node = nodes.node(idx);
    let target_row = addr_vec[level::ROW];
    match node.state {
        state::CLOSED => Some(cmd::ACT),
        state::OPENED => {
            if node.row_state.contains_key(&target_row) {
                Some(cmd_in)
            } else {
                Some(cmd::PRE)
            }
        }
        _ => None,
    }
}

// Prerequisite for per-bank refresh: the bank must be closed first.
fn bank_refresh_preq(
    nodes: &NodeArena,
    idx: usize,
    _spec: &DramSpec,
    cmd_in: usize,
    _addr_vec: &AddrVec,
    _clk: Clk,
) -> Option<usize> {
    if nodes.node(idx).state == state::OPENED {
        Some(cmd::PRE)
    } else {
        Some(cmd_in)
    }
}

// Prerequisite for all-bank refresh: precharge-all while any bank is open.
fn rank_refresh_preq(
    nodes: &NodeArena,
    idx: usize,
    _spec: &DramSpec,
    cmd_in: usize,
    _addr_vec: &AddrVec,
    _clk: Clk,
) -> Option<usize> {
    let any_open = nodes
        .descendants(idx)
        .into_iter()
        .any(|d| nodes.node(d).level == level::BANK && nodes.node(d).state == state::OPENED);
    if any_open {
        Some(cmd::PREA)
    } else {
        Some(cmd_in)
    }
}

// The access hits iff the addressed row is the open one.
fn bank_row_hit(
    nodes: &NodeArena,
    idx: usize,
    _spec: &DramSpec,
    _cmd: usize,
    target_row: i64,
    _clk: Clk,
) -> bool {
    let node = nodes.node(idx);
    node.state == state::OPENED && node.row_state.contains_key(&target_row)
}

// The bank is open, whichever row it holds.
fn bank_row_open(
    nodes: &NodeArena,
    idx: usize,
    _spec: &DramSpec,
    _cmd: usize,
    _target_row: i64,
    _clk: Clk,
) -> bool {
    nodes.node(idx).state == state::OPENED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DramConfig;

    #[test]
    fn preset_tables_validate() {
        let spec = generic_ddr(&DramConfig::default());
        spec.validate();
        assert_eq!(spec.num_levels(), 6);
        assert_eq!(spec.command("REFab"), cmd::REFAB);
        assert_eq!(spec.scope[cmd::RD], level::COLUMN);
        assert_eq!(spec.translations[reqt::ALL_BANK_REFRESH], cmd::REFAB);
        assert!(spec.meta[cmd::PREA].is_closing);
        assert!(spec.meta[cmd::ACT].is_opening);
    }

    #[test]
    fn zero_valued_timings_emit_no_rows() {
        let mut cfg = DramConfig::default();
        cfg.timing.t_faw = 0;
        let spec = generic_ddr(&cfg);
        assert!(spec.timing[level::RANK][cmd::ACT]
            .iter()
            .all(|t| t.window == 1));
    }
}
