//! Row-buffer management policies.
//!
//! A row policy observes the candidate selected each tick and may synthesize
//! maintenance precharges, which the controller routes through its priority
//! buffer. Policies never touch buffer order themselves. The open-page
//! policy is a pure observer; the closed-page and timeout policies declare
//! request injection.

use std::collections::HashMap;

use crate::dram::Dram;
use crate::request::{Clk, Request};

/// Observes each tick's candidate and returns precharges to inject.
pub trait RowPolicy {
    /// Called once per controller tick with the selected request, if any,
    /// before the command is issued.
    fn update(&mut self, found: Option<&Request>, clk: Clk, dram: &Dram) -> Vec<Request>;
}

/// Leave rows open until a conflicting access closes them.
#[derive(Default)]
pub struct OpenPage;

impl RowPolicy for OpenPage {
    fn update(&mut self, _found: Option<&Request>, _clk: Clk, _dram: &Dram) -> Vec<Request> {
        Vec::new()
    }
}

/// Bank-prefix address vector (`row` and below forced to broadcast).
fn bank_prefix(dram: &Dram, addr_vec: &[i64]) -> Vec<i64> {
    let bank_level = dram.spec.level("bank");
    let mut vec = vec![-1; dram.spec.num_levels()];
    vec[..=bank_level].copy_from_slice(&addr_vec[..=bank_level]);
    vec
}

fn precharge_request(dram: &Dram, addr_vec: Vec<i64>) -> Request {
    let req_type = dram
        .spec
        .requests
        .index("precharge")
        .expect("spec defines no precharge request");
    Request::from_vec(addr_vec, req_type)
}

/// Close a row as soon as its column access has been issued.
#[derive(Default)]
pub struct ClosedPage;

impl RowPolicy for ClosedPage {
    fn update(&mut self, found: Option<&Request>, _clk: Clk, dram: &Dram) -> Vec<Request> {
        let req = match found {
            Some(req) => req,
            None => return Vec::new(),
        };
        // Inject once, on the cycle the terminal column command goes out.
        let is_final_access = match (req.command, req.final_command) {
            (Some(cmd), Some(final_cmd)) => cmd == final_cmd && dram.spec.meta[cmd].is_accessing,
            _ => false,
        };
        if !is_final_access {
            return Vec::new();
        }
        vec![precharge_request(dram, bank_prefix(dram, &req.addr_vec))]
    }
}

/// Close a row after a configurable idle window.
pub struct TimeoutOpenPage {
    timeout: Clk,
    last_access: HashMap<Vec<i64>, Clk>,
}

impl TimeoutOpenPage {
    /// Creates the policy with the given idle window.
    pub fn new(timeout: Clk) -> Self {
        Self {
            timeout,
            last_access: HashMap::new(),
        }
    }
}

impl RowPolicy for TimeoutOpenPage {
    fn update(&mut self, found: Option<&Request>, clk: Clk, dram: &Dram) -> Vec<Request> {
        if let Some(req) = found {
            if let Some(cmd) = req.command {
                if dram.spec.meta[cmd].is_accessing || dram.spec.meta[cmd].is_opening {
                    self.last_access.insert(bank_prefix(dram, &req.addr_vec), clk);
                }
            }
        }

        let mut expired: Vec<Vec<i64>> = self
            .last_access
            .iter()
            .filter(|(_, &last)| clk - last > self.timeout)
            .map(|(prefix, _)| prefix.clone())
            .collect();
        // Deterministic injection order regardless of map iteration.
        expired.sort();

        let rd = dram.spec.command("RD");
        let mut out = Vec::new();
        for prefix in expired {
            self.last_access.remove(&prefix);
            // Only close banks that are actually still open.
            if dram.check_node_open(rd, &prefix) {
                out.push(precharge_request(dram, prefix));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DramConfig;
    use crate::dram::preset::{self, reqt};

    fn device() -> Dram {
        Dram::new(preset::generic_ddr(&DramConfig::default()), 0)
    }

    fn final_read(dram: &Dram, addr_vec: Vec<i64>) -> Request {
        let mut req = Request::from_vec(addr_vec, reqt::READ);
        let rd = dram.spec.command("RD");
        req.final_command = Some(rd);
        req.command = Some(rd);
        req
    }

    #[test]
    fn open_page_never_injects() {
        let dram = device();
        let req = final_read(&dram, vec![0, 0, 0, 0, 1, 0]);
        let mut policy = OpenPage;
        assert!(policy.update(Some(&req), 10, &dram).is_empty());
        assert!(policy.update(None, 11, &dram).is_empty());
    }

    #[test]
    fn closed_page_injects_on_terminal_column_access() {
        let dram = device();
        let mut policy = ClosedPage;

        let req = final_read(&dram, vec![0, 0, 1, 2, 7, 3]);
        let injected = policy.update(Some(&req), 10, &dram);
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].addr_vec, vec![0, 0, 1, 2, -1, -1]);
        assert_eq!(injected[0].type_id, reqt::PRECHARGE);

        // An ACT on the way to the column access must not trigger a close.
        let mut opening = final_read(&dram, vec![0, 0, 1, 2, 7, 3]);
        opening.command = Some(dram.spec.command("ACT"));
        assert!(policy.update(Some(&opening), 11, &dram).is_empty());
    }

    #[test]
    fn timeout_policy_closes_idle_open_bank() {
        let mut dram = device();
        let act = dram.spec.command("ACT");
        dram.issue_command(act, &vec![0, 0, 0, 0, 5, 0]);

        let mut policy = TimeoutOpenPage::new(20);
        let mut opening = final_read(&dram, vec![0, 0, 0, 0, 5, 0]);
        opening.command = Some(act);
        assert!(policy.update(Some(&opening), 100, &dram).is_empty());

        // Still inside the window: nothing.
        assert!(policy.update(None, 110, &dram).is_empty());
        // Window expired: one precharge for the open bank.
        let injected = policy.update(None, 121, &dram);
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].addr_vec, vec![0, 0, 0, 0, -1, -1]);
        // Entry consumed; no repeat injection.
        assert!(policy.update(None, 200, &dram).is_empty());
    }
}
