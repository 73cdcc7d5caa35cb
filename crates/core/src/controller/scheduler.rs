//! Request schedulers (FRFCFS family).
//!
//! A scheduler ranks the requests of one buffer and returns the index of the
//! preferred candidate. Before ranking it refreshes every request's
//! `command` field from the device's prerequisite tables, so the comparison
//! always sees what the request needs *this* cycle.

use std::cell::RefCell;
use std::rc::Rc;

use crate::controller::plugins::prac::PracState;
use crate::dram::Dram;
use crate::request::{Clk, ReqBuffer, Request};

/// Scratchpad slot holding the PRAC "fits before recovery" bit.
const FITS_IDX: usize = 0;
/// Scratchpad slot holding the cached readiness bit.
const READY_IDX: usize = 1;

/// Ranks requests in a buffer; returns the index of the best, or `None` for
/// an empty buffer.
pub trait Scheduler {
    /// Refreshes each request's current command and picks the preferred one.
    fn best(&mut self, dram: &Dram, buffer: &mut ReqBuffer, clk: Clk) -> Option<usize>;
}

/// First-ready, first-come-first-serve.
///
/// Readiness is primary; among equals the earlier arrival wins.
#[derive(Default)]
pub struct Frfcfs;

impl Frfcfs {
    /// Returns true when `req1` is preferred; ties keep the earlier index.
    fn compare(&self, dram: &Dram, req1: &Request, req2: &Request) -> bool {
        let cmd1 = req1.command.expect("command refreshed before compare");
        let cmd2 = req2.command.expect("command refreshed before compare");
        let ready1 = dram.check_ready(cmd1, &req1.addr_vec);
        let ready2 = dram.check_ready(cmd2, &req2.addr_vec);
        if ready1 != ready2 {
            return ready1;
        }
        req1.arrive <= req2.arrive
    }
}

impl Scheduler for Frfcfs {
    fn best(&mut self, dram: &Dram, buffer: &mut ReqBuffer, _clk: Clk) -> Option<usize> {
        if buffer.is_empty() {
            return None;
        }
        for req in buffer.iter_mut() {
            let final_cmd = req.final_command.expect("request enqueued without final command");
            req.command = Some(dram.get_preq_command(final_cmd, &req.addr_vec));
        }

        let mut candidate = 0;
        for next in 1..buffer.len() {
            if !self.compare(dram, buffer.get(candidate), buffer.get(next)) {
                candidate = next;
            }
        }
        Some(candidate)
    }
}

/// PRAC-aware FRFCFS.
///
/// Before comparing, each request gets two scratchpad bits: whether it can
/// complete (including a precharge-all) before the next recovery window, and
/// whether it is ready now. Priority is fits > ready > earliest arrival.
pub struct PracScheduler {
    state: Rc<RefCell<PracState>>,
}

impl PracScheduler {
    /// Creates the scheduler around the PRAC plugin's shared state.
    pub fn new(state: Rc<RefCell<PracState>>) -> Self {
        Self { state }
    }

    fn compare(req1: &Request, req2: &Request) -> bool {
        let fits1 = req1.scratchpad[FITS_IDX] != 0;
        let fits2 = req2.scratchpad[FITS_IDX] != 0;
        if fits1 != fits2 {
            return fits1;
        }
        let ready1 = req1.scratchpad[READY_IDX] != 0;
        let ready2 = req2.scratchpad[READY_IDX] != 0;
        if ready1 != ready2 {
            return ready1;
        }
        req1.arrive <= req2.arrive
    }
}

impl Scheduler for PracScheduler {
    fn best(&mut self, dram: &Dram, buffer: &mut ReqBuffer, clk: Clk) -> Option<usize> {
        if buffer.is_empty() {
            return None;
        }
        let state = self.state.borrow();
        let next_recovery = state.next_recovery_cycle();
        for req in buffer.iter_mut() {
            let final_cmd = req.final_command.expect("request enqueued without final command");
            let cmd = dram.get_preq_command(final_cmd, &req.addr_vec);
            req.command = Some(cmd);
            let fits = clk + state.min_cycles_with_preall(req) < next_recovery;
            req.scratchpad[FITS_IDX] = fits as i64;
            req.scratchpad[READY_IDX] = dram.check_ready(cmd, &req.addr_vec) as i64;
        }

        let mut candidate = 0;
        for next in 1..buffer.len() {
            if !Self::compare(buffer.get(candidate), buffer.get(next)) {
                candidate = next;
            }
        }
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DramConfig;
    use crate::dram::preset::{self, reqt};
    use crate::request::Request;

    fn device() -> Dram {
        Dram::new(preset::generic_ddr(&DramConfig::default()), 0)
    }

    fn read_req(addr_vec: Vec<i64>, arrive: Clk, dram: &Dram) -> Request {
        let mut req = Request::from_vec(addr_vec, reqt::READ);
        req.final_command = Some(dram.spec.translations[reqt::READ]);
        req.arrive = arrive;
        req
    }

    #[test]
    fn ready_request_beats_earlier_unready_one() {
        let mut dram = device();
        let act = dram.spec.command("ACT");
        let rd = dram.spec.command("RD");
        dram.issue_command(act, &vec![0, 0, 0, 0, 7, 0]);
        for _ in 0..DramConfig::default().timing.t_rcd {
            dram.tick();
        }

        let mut buffer = ReqBuffer::new(8);
        // Arrives first but conflicts with the open row: its PRE is still
        // held back by tRAS, so it is not ready.
        buffer
            .enqueue(read_req(vec![0, 0, 0, 0, 9, 0], 0, &dram))
            .unwrap();
        // Arrives later but hits the open row.
        buffer
            .enqueue(read_req(vec![0, 0, 0, 0, 7, 3], 5, &dram))
            .unwrap();

        let mut sched = Frfcfs;
        let clk = dram.clk();
        let best = sched.best(&dram, &mut buffer, clk).unwrap();
        assert_eq!(best, 1);
        assert_eq!(buffer.get(1).command, Some(rd));
    }

    #[test]
    fn fcfs_tiebreak_on_equal_readiness() {
        let dram = device();
        let mut buffer = ReqBuffer::new(8);
        buffer
            .enqueue(read_req(vec![0, 0, 0, 0, 1, 0], 4, &dram))
            .unwrap();
        buffer
            .enqueue(read_req(vec![0, 0, 1, 0, 2, 0], 2, &dram))
            .unwrap();

        let mut sched = Frfcfs;
        assert_eq!(sched.best(&dram, &mut buffer, 0), Some(1));
    }

    #[test]
    fn empty_buffer_yields_none() {
        let dram = device();
        let mut buffer = ReqBuffer::new(8);
        let mut sched = Frfcfs;
        assert_eq!(sched.best(&dram, &mut buffer, 0), None);
    }

    #[test]
    fn prac_prefers_request_fitting_before_recovery() {
        let dram = device();
        let state = Rc::new(RefCell::new(PracState::for_spec(&dram.spec)));
        // Recovery imminent: nothing fits, order falls back to ready/arrive.
        state.borrow_mut().set_next_recovery(10);

        let mut buffer = ReqBuffer::new(8);
        buffer
            .enqueue(read_req(vec![0, 0, 0, 0, 1, 0], 0, &dram))
            .unwrap();
        buffer
            .enqueue(read_req(vec![0, 0, 1, 0, 1, 0], 1, &dram))
            .unwrap();

        let mut sched = PracScheduler::new(Rc::clone(&state));
        assert_eq!(sched.best(&dram, &mut buffer, 0), Some(0));
        assert_eq!(buffer.get(0).scratchpad[FITS_IDX], 0);

        // Recovery far away: both fit, earliest arrival still wins.
        state.borrow_mut().set_next_recovery(1_000_000);
        assert_eq!(sched.best(&dram, &mut buffer, 0), Some(0));
        assert_eq!(buffer.get(0).scratchpad[FITS_IDX], 1);
    }
}
