//! End-to-end controller scenarios.
//!
//! Drives a controller with its device model through the canonical
//! single-channel situations: cold read, row hit, row conflict, write-mode
//! switch, read forwarding, refresh cadence, and the cross-cutting
//! invariants (timing legality of every issued command, read FIFO order,
//! single-shot row classification).

use std::cell::RefCell;
use std::rc::Rc;

use dram_core::config::{
    ControllerConfig, DramConfig, EccConfig, PluginConfig, PracConfig, RefreshKind, SchedulerKind,
};
use dram_core::controller::Controller;
use dram_core::dram::preset::{self, cmd, reqt};
use dram_core::dram::Dram;
use dram_core::request::{Clk, Request};
use dram_core::stats::StatsReport;

fn make_controller(dram_cfg: &DramConfig, ctrl_cfg: &ControllerConfig) -> Controller {
    let mut dram = Dram::new(preset::generic_ddr(dram_cfg), 0);
    dram.set_record_commands(true);
    Controller::new(ctrl_cfg, dram, 0, 1).unwrap()
}

fn quiet_cfg() -> ControllerConfig {
    ControllerConfig {
        refresh: RefreshKind::Disabled,
        ..ControllerConfig::default()
    }
}

type Completions = Rc<RefCell<Vec<(usize, Clk)>>>;

fn tagged_read(addr: i64, addr_vec: Vec<i64>, tag: usize, done: &Completions) -> Request {
    let done = Rc::clone(done);
    let mut req = Request::with_callback(
        addr,
        reqt::READ,
        0,
        Box::new(move |r| done.borrow_mut().push((tag, r.depart))),
    );
    req.addr_vec = addr_vec;
    req
}

fn run_until_idle(ctrl: &mut Controller, bound: usize) {
    for _ in 0..bound {
        if !ctrl.has_work() {
            return;
        }
        ctrl.tick();
    }
    panic!("controller did not drain within {} cycles", bound);
}

fn finalize(ctrl: &mut Controller) -> StatsReport {
    let mut report = StatsReport::new();
    ctrl.finalize(&mut report);
    report
}

fn count(report: &StatsReport, name: &str) -> i64 {
    match report.get("controller_0", name) {
        Some(dram_core::stats::StatValue::Int(v)) => v,
        other => panic!("missing counter {}: {:?}", name, other),
    }
}

#[test]
fn cold_read_then_hit_then_conflict() {
    let dram_cfg = DramConfig::default();
    let t = dram_cfg.timing.clone();
    let mut ctrl = make_controller(&dram_cfg, &quiet_cfg());
    let done: Completions = Rc::new(RefCell::new(Vec::new()));

    // Scenario 1: cold bank. ACT on the first tick, RD once tRCD elapses,
    // data back read_latency later; classified as a row miss.
    ctrl.send(tagged_read(0, vec![0, 0, 0, 0, 0, 0], 1, &done))
        .unwrap();
    run_until_idle(&mut ctrl, 1_000);

    {
        let log = ctrl.dram.command_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], (1, cmd::ACT, vec![0, 0, 0, 0, 0, 0]));
        assert_eq!(log[1].0, 1 + t.t_rcd);
        assert_eq!(log[1].1, cmd::RD);
        assert_eq!(
            done.borrow().as_slice(),
            &[(1, 1 + t.t_rcd + t.read_latency)]
        );
    }

    // Scenario 2: same row again. The RD goes straight out, no ACT.
    ctrl.send(tagged_read(0, vec![0, 0, 0, 0, 0, 0], 2, &done))
        .unwrap();
    run_until_idle(&mut ctrl, 1_000);
    {
        let log = ctrl.dram.command_log();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].1, cmd::RD);
    }

    // Scenario 3: different row, same bank. PRE, ACT, RD; a row conflict.
    ctrl.send(tagged_read(64, vec![0, 0, 0, 0, 1, 0], 3, &done))
        .unwrap();
    run_until_idle(&mut ctrl, 1_000);
    {
        let log = ctrl.dram.command_log();
        let tail: Vec<usize> = log[3..].iter().map(|e| e.1).collect();
        assert_eq!(tail, vec![cmd::PRE, cmd::ACT, cmd::RD]);
    }

    // Each request was classified exactly once.
    let report = finalize(&mut ctrl);
    assert_eq!(count(&report, "read_row_misses"), 1);
    assert_eq!(count(&report, "read_row_hits"), 1);
    assert_eq!(count(&report, "read_row_conflicts"), 1);
    assert_eq!(count(&report, "row_hits"), 1);
    assert_eq!(count(&report, "read_row_hits_core_0"), 1);
}

#[test]
fn high_watermark_switches_to_write_mode() {
    let dram_cfg = DramConfig::default();
    let mut ctrl = make_controller(&dram_cfg, &quiet_cfg());

    // One read queued; write buffer filled to 26/32 ≥ 0.8.
    ctrl.send(Request::from_vec(vec![0, 0, 0, 0, 0, 0], reqt::READ))
        .unwrap();
    for i in 0..26 {
        let mut w = Request::new(0x1000 + 64 * i, reqt::WRITE);
        w.addr_vec = vec![0, 0, 0, 1, i, 0];
        ctrl.send(w).unwrap();
    }

    ctrl.tick();
    assert!(ctrl.is_write_mode());
    // The scheduled request is a write: its ACT targets bank 1.
    let log = ctrl.dram.command_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].1, cmd::ACT);
    assert_eq!(log[0].2[3], 1);
}

#[test]
fn pending_write_forwards_a_matching_read() {
    let dram_cfg = DramConfig::default();
    let mut ctrl = make_controller(&dram_cfg, &quiet_cfg());
    let done: Completions = Rc::new(RefCell::new(Vec::new()));

    // Background read so the early cycles look normal.
    ctrl.send(tagged_read(0, vec![0, 0, 0, 0, 0, 0], 1, &done))
        .unwrap();
    while ctrl.clk() < 60 {
        ctrl.tick();
    }

    // Write to X sits in the write buffer; a read to X arriving at cycle 60
    // bypasses the device with depart = 61.
    let mut write = Request::new(0x2000, reqt::WRITE);
    write.addr_vec = vec![0, 0, 1, 0, 2, 5];
    ctrl.send(write).unwrap();
    ctrl.send(tagged_read(0x2000, vec![0, 0, 1, 0, 2, 5], 2, &done))
        .unwrap();

    ctrl.tick();
    assert!(done.borrow().contains(&(2, 61)));
}

#[test]
fn refresh_fires_once_per_interval() {
    let mut dram_cfg = DramConfig::default();
    dram_cfg.timing.t_refi = 7_800;
    let ctrl_cfg = ControllerConfig::default(); // AllBank refresh
    let mut ctrl = make_controller(&dram_cfg, &ctrl_cfg);

    for _ in 0..15_700 {
        ctrl.tick();
    }
    let refresh_cycles: Vec<Clk> = ctrl
        .dram
        .command_log()
        .iter()
        .filter(|e| e.1 == cmd::REFAB)
        .map(|e| e.0)
        .collect();
    assert_eq!(refresh_cycles, vec![7_800, 15_600]);
}

#[test]
fn clock_advances_by_one_per_tick() {
    let dram_cfg = DramConfig::default();
    let mut ctrl = make_controller(&dram_cfg, &quiet_cfg());
    for expected in 1..=100 {
        ctrl.tick();
        assert_eq!(ctrl.clk(), expected);
    }
}

#[test]
fn every_issued_command_was_timing_legal() {
    let dram_cfg = DramConfig::default();
    let mut ctrl = make_controller(&dram_cfg, &ControllerConfig::default());
    let done: Completions = Rc::new(RefCell::new(Vec::new()));

    // Mixed workload: hits, conflicts, cross-bank traffic, writes.
    let vectors = [
        vec![0, 0, 0, 0, 0, 0],
        vec![0, 0, 0, 0, 1, 0],
        vec![0, 0, 1, 2, 0, 0],
        vec![0, 0, 2, 1, 3, 4],
        vec![0, 0, 0, 0, 0, 8],
        vec![0, 0, 3, 3, 9, 1],
    ];
    for (i, v) in vectors.iter().enumerate() {
        ctrl.send(tagged_read(64 * i as i64, v.clone(), i, &done))
            .unwrap();
        let mut w = Request::new(0x8000 + 64 * i as i64, reqt::WRITE);
        w.addr_vec = v.clone();
        w.addr_vec[5] += 16;
        ctrl.send(w).unwrap();
    }
    run_until_idle(&mut ctrl, 100_000);

    // Replay the issue trace against a fresh device: every command must be
    // ready at its recorded cycle.
    let mut fresh = Dram::new(preset::generic_ddr(&dram_cfg), 0);
    for (clk, command, addr_vec) in ctrl.dram.command_log() {
        while fresh.clk() < *clk {
            fresh.tick();
        }
        assert!(
            fresh.check_ready(*command, addr_vec),
            "command {} at cycle {} violates timing",
            command,
            clk
        );
        fresh.issue_command(*command, addr_vec);
    }
}

#[test]
fn reads_complete_in_issue_order() {
    let dram_cfg = DramConfig::default();
    let mut ctrl = make_controller(&dram_cfg, &quiet_cfg());
    let done: Completions = Rc::new(RefCell::new(Vec::new()));

    // Bank-0 conflict keeps request 1 slow while bank-1 request 2 is fast;
    // completion order must still follow RD issue order.
    let vectors = [
        vec![0, 0, 0, 0, 0, 0],
        vec![0, 0, 0, 0, 5, 0],
        vec![0, 0, 1, 0, 0, 0],
    ];
    for (i, v) in vectors.iter().enumerate() {
        ctrl.send(tagged_read(64 * i as i64, v.clone(), i, &done))
            .unwrap();
    }
    run_until_idle(&mut ctrl, 10_000);

    let rd_order: Vec<usize> = ctrl
        .dram
        .command_log()
        .iter()
        .filter(|e| e.1 == cmd::RD)
        .map(|e| vectors.iter().position(|v| *v == e.2).unwrap())
        .collect();
    let completion_order: Vec<usize> = done.borrow().iter().map(|(tag, _)| *tag).collect();
    assert_eq!(rd_order.len(), 3);
    assert_eq!(completion_order, rd_order);

    // Departure cycles are monotone: strict FIFO on the pending queue.
    let departs: Vec<Clk> = done.borrow().iter().map(|(_, d)| *d).collect();
    assert!(departs.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn read_only_run_toggles_write_mode_at_most_twice() {
    let dram_cfg = DramConfig::default();
    let mut ctrl = make_controller(&dram_cfg, &quiet_cfg());
    let done: Completions = Rc::new(RefCell::new(Vec::new()));
    for i in 0..8 {
        ctrl.send(tagged_read(
            64 * i,
            vec![0, 0, (i % 4), 0, i, 0],
            i as usize,
            &done,
        ))
        .unwrap();
    }
    run_until_idle(&mut ctrl, 10_000);

    let report = finalize(&mut ctrl);
    assert!(count(&report, "write_mode_toggles") <= 2);
}

#[test]
fn ecc_plugin_rides_the_request_pipeline() {
    let dram_cfg = DramConfig::default();
    let mut ctrl_cfg = quiet_cfg();
    ctrl_cfg.plugins.push(PluginConfig::Ecc(EccConfig {
        bit_error_rate: 0.0,
        ..EccConfig::default()
    }));
    let mut ctrl = make_controller(&dram_cfg, &ctrl_cfg);
    let done: Completions = Rc::new(RefCell::new(Vec::new()));

    let payload: Vec<u8> = (0..128u32).map(|i| i as u8).collect();
    let mut write = Request::new(0x40, reqt::WRITE);
    write.addr_vec = vec![0, 0, 0, 0, 3, 0];
    write.payload = Some(Box::new(payload));
    ctrl.send(write).unwrap();
    run_until_idle(&mut ctrl, 10_000);

    ctrl.send(tagged_read(0x40, vec![0, 0, 0, 0, 3, 0], 1, &done))
        .unwrap();
    run_until_idle(&mut ctrl, 10_000);

    let report = finalize(&mut ctrl);
    match report.get("ecc", "edc_success_count") {
        Some(dram_core::stats::StatValue::Int(passes)) => assert_eq!(passes, 1),
        other => panic!("missing ecc counters: {:?}", other),
    }
}

#[test]
fn prac_scheduler_runs_against_its_plugin() {
    let dram_cfg = DramConfig::default();
    let mut ctrl_cfg = quiet_cfg();
    ctrl_cfg.scheduler = SchedulerKind::Prac;
    ctrl_cfg.plugins.push(PluginConfig::Prac(PracConfig {
        alert_threshold: 4,
        recovery_cycles: 100,
    }));
    let mut ctrl = make_controller(&dram_cfg, &ctrl_cfg);
    let done: Completions = Rc::new(RefCell::new(Vec::new()));

    // Hammer one bank with conflicting rows to drive the activation count.
    for i in 0..6 {
        ctrl.send(tagged_read(64 * i, vec![0, 0, 0, 0, i, 0], i as usize, &done))
            .unwrap();
    }
    run_until_idle(&mut ctrl, 100_000);
    assert_eq!(done.borrow().len(), 6);

    let report = finalize(&mut ctrl);
    match report.get("prac", "alerts") {
        Some(dram_core::stats::StatValue::Int(alerts)) => assert!(alerts >= 1),
        other => panic!("missing prac counters: {:?}", other),
    }
}
