//! PRAC activation-counter plugin.
//!
//! Tracks per-bank activation counts and schedules a recovery window once
//! any bank crosses the alert threshold. The PRAC scheduler consults the
//! shared [`PracState`] to prefer requests that can finish (including a
//! precharge-all) before the window opens.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::PracConfig;
use crate::controller::plugin::ControllerPlugin;
use crate::dram::spec::DramSpec;
use crate::request::{req_type, Clk, Request};
use crate::stats::StatsReport;

/// State shared between the PRAC plugin and the PRAC scheduler.
pub struct PracState {
    next_recovery_cycle: Clk,
    min_read_cycles: Clk,
    min_write_cycles: Clk,
}

impl PracState {
    /// Derives the completion estimates from the spec's timing table.
    pub fn for_spec(spec: &DramSpec) -> Self {
        let bank = spec.level("bank");
        let act = spec.command("ACT");
        let pre = spec.command("PRE");
        let rd = spec.command("RD");
        let wr = spec.command("WR");

        let row_val = |on: usize, affected: usize| -> Clk {
            spec.timing[bank][on]
                .iter()
                .find(|t| t.cmd == affected && !t.sibling)
                .map(|t| t.val)
                .unwrap_or(0)
        };
        let t_rp = row_val(pre, act);
        let t_rcd = row_val(act, rd);
        let t_wr = row_val(wr, pre);

        Self {
            next_recovery_cycle: Clk::MAX,
            min_read_cycles: t_rp + t_rcd + spec.read_latency,
            min_write_cycles: t_rp + t_rcd + t_wr,
        }
    }

    /// Cycle at which the next recovery window opens; `Clk::MAX` when none
    /// is scheduled.
    #[inline]
    pub fn next_recovery_cycle(&self) -> Clk {
        self.next_recovery_cycle
    }

    /// Schedules the next recovery window.
    pub fn set_next_recovery(&mut self, clk: Clk) {
        self.next_recovery_cycle = clk;
    }

    /// Clears the scheduled window after it has been served.
    pub fn clear_recovery(&mut self) {
        self.next_recovery_cycle = Clk::MAX;
    }

    /// Cycles this request needs to complete if a precharge-all has to run
    /// first.
    pub fn min_cycles_with_preall(&self, req: &Request) -> Clk {
        if req.type_id == req_type::READ {
            self.min_read_cycles
        } else {
            self.min_write_cycles
        }
    }
}

/// The plugin half: counts activations, opens and closes recovery windows.
pub struct PracPlugin {
    state: Rc<RefCell<PracState>>,
    cmd_act: usize,
    alert_threshold: u64,
    recovery_cycles: Clk,
    counts: HashMap<(i64, i64, i64), u64>,

    s_alerts: u64,
    s_recoveries: u64,
}

impl PracPlugin {
    /// Builds the plugin and its shared state.
    pub fn new(cfg: &PracConfig, spec: &DramSpec) -> Self {
        Self {
            state: Rc::new(RefCell::new(PracState::for_spec(spec))),
            cmd_act: spec.command("ACT"),
            alert_threshold: cfg.alert_threshold,
            recovery_cycles: cfg.recovery_cycles,
            counts: HashMap::new(),
            s_alerts: 0,
            s_recoveries: 0,
        }
    }

    /// Shared state handle for the PRAC scheduler.
    pub fn state(&self) -> Rc<RefCell<PracState>> {
        Rc::clone(&self.state)
    }
}

impl ControllerPlugin for PracPlugin {
    fn update(&mut self, found: Option<&mut Request>, clk: Clk) {
        {
            let mut state = self.state.borrow_mut();
            let next = state.next_recovery_cycle();
            if next != Clk::MAX && clk >= next + self.recovery_cycles {
                // The recovery window has elapsed; counters start over.
                state.clear_recovery();
                self.counts.clear();
                self.s_recoveries += 1;
            }
        }

        let req = match found {
            Some(req) => req,
            None => return,
        };
        if req.command != Some(self.cmd_act) {
            return;
        }
        let key = (req.addr_vec[1], req.addr_vec[2], req.addr_vec[3]);
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        if *count >= self.alert_threshold {
            let mut state = self.state.borrow_mut();
            if state.next_recovery_cycle() == Clk::MAX {
                state.set_next_recovery(clk + self.recovery_cycles);
                self.s_alerts += 1;
            }
        }
    }

    fn finalize(&mut self, report: &mut StatsReport) {
        let section = report.section("prac");
        section.add("alerts", self.s_alerts);
        section.add("recoveries", self.s_recoveries);
        let max_count = self.counts.values().copied().max().unwrap_or(0);
        section.add("max_open_activation_count", max_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DramConfig;
    use crate::dram::preset;

    #[test]
    fn alert_fires_at_threshold_and_window_closes() {
        let spec = preset::generic_ddr(&DramConfig::default());
        let cfg = PracConfig {
            alert_threshold: 3,
            recovery_cycles: 50,
        };
        let mut plugin = PracPlugin::new(&cfg, &spec);
        let state = plugin.state();
        let act = spec.command("ACT");

        let mut act_req = Request::from_vec(vec![0, 0, 0, 0, 1, 0], req_type::READ);
        act_req.command = Some(act);

        for clk in 0..2 {
            plugin.update(Some(&mut act_req), clk);
            assert_eq!(state.borrow().next_recovery_cycle(), Clk::MAX);
        }
        plugin.update(Some(&mut act_req), 2);
        assert_eq!(state.borrow().next_recovery_cycle(), 52);

        // After the window has elapsed the counters reset.
        plugin.update(None, 103);
        assert_eq!(state.borrow().next_recovery_cycle(), Clk::MAX);
        plugin.update(Some(&mut act_req), 104);
        assert_eq!(state.borrow().next_recovery_cycle(), Clk::MAX);
    }

    #[test]
    fn completion_estimates_cover_reads_and_writes() {
        let cfg = DramConfig::default();
        let spec = preset::generic_ddr(&cfg);
        let state = PracState::for_spec(&spec);
        let read = Request::from_vec(vec![0; 6], req_type::READ);
        let write = Request::from_vec(vec![0; 6], req_type::WRITE);
        let t = &cfg.timing;
        assert_eq!(
            state.min_cycles_with_preall(&read),
            t.t_rp + t.t_rcd + t.read_latency
        );
        assert_eq!(state.min_cycles_with_preall(&write), t.t_rp + t.t_rcd + t.t_wr);
    }
}
