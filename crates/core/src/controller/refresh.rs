//! Refresh managers.
//!
//! A refresh manager watches the controller clock and, when a deadline
//! passes, synthesizes refresh requests for the controller to route through
//! its priority buffer. The only contract is that refresh pressure appears
//! on the priority buffer in time; the cadence below reads the interval from
//! the device each tick, so `notify("refresh_interval", …)` takes effect
//! mid-run.

use crate::dram::Dram;
use crate::request::{Clk, Request};

/// Produces refresh requests to inject this cycle.
pub trait RefreshManager {
    /// Called once per controller tick, before scheduling.
    fn tick(&mut self, clk: Clk, dram: &Dram) -> Vec<Request>;
}

/// No refresh at all. Retention is violated; traffic studies only.
#[derive(Default)]
pub struct NoRefresh;

impl RefreshManager for NoRefresh {
    fn tick(&mut self, _clk: Clk, _dram: &Dram) -> Vec<Request> {
        Vec::new()
    }
}

/// One all-bank refresh per rank every tREFI.
pub struct AllBankRefresh {
    channel_id: usize,
    num_ranks: usize,
    req_type: usize,
    next_refresh: Clk,
}

impl AllBankRefresh {
    /// Builds the manager for one channel.
    pub fn new(dram: &Dram, channel_id: usize) -> Self {
        let num_ranks = dram.spec.organization[dram.spec.level("rank")];
        let req_type = dram
            .spec
            .requests
            .index("all-bank-refresh")
            .expect("spec defines no all-bank-refresh request");
        Self {
            channel_id,
            num_ranks,
            req_type,
            next_refresh: dram.spec.refresh_interval,
        }
    }
}

impl RefreshManager for AllBankRefresh {
    fn tick(&mut self, clk: Clk, dram: &Dram) -> Vec<Request> {
        if clk < self.next_refresh {
            return Vec::new();
        }
        self.next_refresh += dram.spec.refresh_interval;

        let mut out = Vec::with_capacity(self.num_ranks);
        for rank in 0..self.num_ranks {
            let mut addr_vec = vec![-1; dram.spec.num_levels()];
            addr_vec[0] = self.channel_id as i64;
            addr_vec[1] = rank as i64;
            out.push(Request::from_vec(addr_vec, self.req_type));
        }
        out
    }
}

/// Per-bank refreshes staggered across the tREFI window.
///
/// Each bank is refreshed once per interval; deadlines are spread so the
/// bus sees one small refresh every `tREFI / total_banks` cycles instead of
/// one long lockout per rank.
pub struct PerBankRefresh {
    channel_id: usize,
    num_ranks: usize,
    num_bankgroups: usize,
    num_banks: usize,
    req_type: usize,
    next_refresh: Clk,
    cursor: usize,
}

impl PerBankRefresh {
    /// Builds the manager for one channel.
    pub fn new(dram: &Dram, channel_id: usize) -> Self {
        let spec = &dram.spec;
        let num_ranks = spec.organization[spec.level("rank")];
        let num_bankgroups = spec.organization[spec.level("bankgroup")];
        let num_banks = spec.organization[spec.level("bank")];
        let req_type = spec
            .requests
            .index("per-bank-refresh")
            .expect("spec defines no per-bank-refresh request");
        let total = (num_ranks * num_bankgroups * num_banks) as i64;
        Self {
            channel_id,
            num_ranks,
            num_bankgroups,
            num_banks,
            req_type,
            next_refresh: (dram.spec.refresh_interval / total).max(1),
            cursor: 0,
        }
    }

    fn slice(&self, dram: &Dram) -> Clk {
        let total = (self.num_ranks * self.num_bankgroups * self.num_banks) as i64;
        (dram.spec.refresh_interval / total).max(1)
    }
}

impl RefreshManager for PerBankRefresh {
    fn tick(&mut self, clk: Clk, dram: &Dram) -> Vec<Request> {
        if clk < self.next_refresh {
            return Vec::new();
        }
        self.next_refresh += self.slice(dram);

        let banks_per_rank = self.num_bankgroups * self.num_banks;
        let rank = self.cursor / banks_per_rank;
        let in_rank = self.cursor % banks_per_rank;
        let bankgroup = in_rank / self.num_banks;
        let bank = in_rank % self.num_banks;
        self.cursor = (self.cursor + 1) % (self.num_ranks * banks_per_rank);

        let mut addr_vec = vec![-1; dram.spec.num_levels()];
        addr_vec[0] = self.channel_id as i64;
        addr_vec[1] = rank as i64;
        addr_vec[2] = bankgroup as i64;
        addr_vec[3] = bank as i64;
        vec![Request::from_vec(addr_vec, self.req_type)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DramConfig;
    use crate::dram::preset;

    fn device(t_refi: Clk, ranks: usize) -> Dram {
        let mut cfg = DramConfig::default();
        cfg.timing.t_refi = t_refi;
        cfg.organization.rank = ranks;
        Dram::new(preset::generic_ddr(&cfg), 0)
    }

    #[test]
    fn all_bank_fires_once_per_interval_per_rank() {
        let dram = device(100, 2);
        let mut mgr = AllBankRefresh::new(&dram, 0);

        let mut fired = Vec::new();
        for clk in 0..=305 {
            let reqs = mgr.tick(clk, &dram);
            if !reqs.is_empty() {
                fired.push((clk, reqs.len()));
            }
        }
        assert_eq!(fired, vec![(100, 2), (200, 2), (300, 2)]);
    }

    #[test]
    fn all_bank_addresses_broadcast_below_rank() {
        let dram = device(50, 1);
        let mut mgr = AllBankRefresh::new(&dram, 0);
        let reqs = mgr.tick(50, &dram);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].addr_vec, vec![0, 0, -1, -1, -1, -1]);
    }

    #[test]
    fn per_bank_covers_every_bank_each_interval() {
        let dram = device(3200, 1);
        let mut mgr = PerBankRefresh::new(&dram, 0);
        let mut seen = std::collections::HashSet::new();
        for clk in 0..=3200 {
            for req in mgr.tick(clk, &dram) {
                seen.insert((req.addr_vec[1], req.addr_vec[2], req.addr_vec[3]));
            }
        }
        // 1 rank x 4 bankgroups x 4 banks.
        assert_eq!(seen.len(), 16);
    }
}
