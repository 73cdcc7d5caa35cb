//! Per-channel memory controller.
//!
//! The controller owns one DRAM device, a scheduler, a refresh manager, a
//! row policy, and the plugin list, and advances the request pipeline one
//! command per cycle:
//! 1. **serve** any pending read whose return time has elapsed,
//! 2. **tick** the refresh manager (which may inject into the priority buffer),
//! 3. **pick** a candidate: active buffer first, then priority (abandoning
//!    the tick when its front is not ready), then the watermark-selected
//!    read or write buffer,
//! 4. **call** the row policy and the plugins with the candidate,
//! 5. **issue** the candidate's current command, classifying it as row
//!    hit/miss/conflict on first service and moving it across buffers.

pub mod plugin;
pub mod plugins;
pub mod refresh;
pub mod rowpolicy;
pub mod scheduler;

use std::collections::VecDeque;

use log::warn;

use crate::config::{ControllerConfig, PluginConfig, RefreshKind, RowPolicyKind, SchedulerKind};
use crate::controller::plugin::ControllerPlugin;
use crate::controller::plugins::ecc::EccPlugin;
use crate::controller::plugins::prac::PracPlugin;
use crate::controller::refresh::{AllBankRefresh, NoRefresh, PerBankRefresh, RefreshManager};
use crate::controller::rowpolicy::{ClosedPage, OpenPage, RowPolicy, TimeoutOpenPage};
use crate::controller::scheduler::{Frfcfs, PracScheduler, Scheduler};
use crate::dram::Dram;
use crate::error::ConfigError;
use crate::request::{req_type, Clk, ReqBuffer, Request};
use crate::stats::StatsReport;

/// Which buffer a scheduled candidate lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BufferId {
    Active,
    Priority,
    Read,
    Write,
}

/// The controller's four request buffers.
struct Buffers {
    active: ReqBuffer,
    priority: ReqBuffer,
    read: ReqBuffer,
    write: ReqBuffer,
}

impl Buffers {
    fn get(&self, id: BufferId) -> &ReqBuffer {
        match id {
            BufferId::Active => &self.active,
            BufferId::Priority => &self.priority,
            BufferId::Read => &self.read,
            BufferId::Write => &self.write,
        }
    }

    fn get_mut(&mut self, id: BufferId) -> &mut ReqBuffer {
        match id {
            BufferId::Active => &mut self.active,
            BufferId::Priority => &mut self.priority,
            BufferId::Read => &mut self.read,
            BufferId::Write => &mut self.write,
        }
    }

    fn req(&self, id: BufferId, idx: usize) -> &Request {
        self.get(id).get(idx)
    }

    fn req_mut(&mut self, id: BufferId, idx: usize) -> &mut Request {
        self.get_mut(id).get_mut(idx)
    }
}

/// Controller counters, reported at finalize.
#[derive(Default)]
struct CtrlStats {
    row_hits: u64,
    row_misses: u64,
    row_conflicts: u64,
    read_row_hits: u64,
    read_row_misses: u64,
    read_row_conflicts: u64,
    write_row_hits: u64,
    write_row_misses: u64,
    write_row_conflicts: u64,
    read_row_hits_per_core: Vec<u64>,
    read_row_misses_per_core: Vec<u64>,
    read_row_conflicts_per_core: Vec<u64>,
    num_read_reqs: u64,
    num_write_reqs: u64,
    num_other_reqs: u64,
    queue_len: u64,
    read_queue_len: u64,
    write_queue_len: u64,
    priority_queue_len: u64,
    read_latency_sum: u64,
    write_mode_toggles: u64,
}

/// Cycle-accurate per-channel DRAM controller.
pub struct Controller {
    channel_id: usize,
    clk: Clk,
    /// The attached device model.
    pub dram: Dram,

    scheduler: Box<dyn Scheduler>,
    refresh: Box<dyn RefreshManager>,
    row_policy: Box<dyn RowPolicy>,
    plugins: Vec<Box<dyn ControllerPlugin>>,

    bufs: Buffers,
    pending: VecDeque<Request>,

    bank_level: usize,
    wr_low_watermark: f32,
    wr_high_watermark: f32,
    is_write_mode: bool,

    stats: CtrlStats,
}

impl Controller {
    /// Builds a controller and its collaborators from configuration.
    pub fn new(
        cfg: &ControllerConfig,
        dram: Dram,
        channel_id: usize,
        num_cores: usize,
    ) -> Result<Self, ConfigError> {
        let bank_level = dram.spec.level("bank");

        let mut plugins: Vec<Box<dyn ControllerPlugin>> = Vec::new();
        let mut prac_state = None;
        for plugin_cfg in &cfg.plugins {
            match plugin_cfg {
                PluginConfig::Ecc(ecc) => plugins.push(Box::new(EccPlugin::new(ecc))),
                PluginConfig::Prac(prac) => {
                    let plugin = PracPlugin::new(prac, &dram.spec);
                    prac_state = Some(plugin.state());
                    plugins.push(Box::new(plugin));
                }
            }
        }

        let scheduler: Box<dyn Scheduler> = match cfg.scheduler {
            SchedulerKind::Frfcfs => Box::new(Frfcfs),
            SchedulerKind::Prac => match prac_state {
                Some(state) => Box::new(PracScheduler::new(state)),
                None => {
                    return Err(ConfigError::Invalid(
                        "the PRAC scheduler requires the PRAC plugin".to_string(),
                    ))
                }
            },
        };

        let refresh: Box<dyn RefreshManager> = match cfg.refresh {
            RefreshKind::AllBank => Box::new(AllBankRefresh::new(&dram, channel_id)),
            RefreshKind::PerBank => Box::new(PerBankRefresh::new(&dram, channel_id)),
            RefreshKind::Disabled => Box::new(NoRefresh),
        };

        let row_policy: Box<dyn RowPolicy> = match cfg.row_policy {
            RowPolicyKind::OpenPage => Box::new(OpenPage),
            RowPolicyKind::ClosedPage => Box::new(ClosedPage),
            RowPolicyKind::TimeoutOpenPage => Box::new(TimeoutOpenPage::new(cfg.row_timeout)),
        };

        let mut stats = CtrlStats::default();
        stats.read_row_hits_per_core = vec![0; num_cores];
        stats.read_row_misses_per_core = vec![0; num_cores];
        stats.read_row_conflicts_per_core = vec![0; num_cores];

        Ok(Self {
            channel_id,
            clk: 0,
            dram,
            scheduler,
            refresh,
            row_policy,
            plugins,
            bufs: Buffers {
                active: ReqBuffer::new(cfg.read_buffer_size + cfg.write_buffer_size),
                priority: ReqBuffer::new(cfg.priority_buffer_size),
                read: ReqBuffer::new(cfg.read_buffer_size),
                write: ReqBuffer::new(cfg.write_buffer_size),
            },
            pending: VecDeque::new(),
            bank_level,
            wr_low_watermark: cfg.wr_low_watermark,
            wr_high_watermark: cfg.wr_high_watermark,
            is_write_mode: false,
            stats,
        })
    }

    /// Current controller cycle.
    #[inline]
    pub fn clk(&self) -> Clk {
        self.clk
    }

    /// True while the controller prefers the write buffer.
    #[inline]
    pub fn is_write_mode(&self) -> bool {
        self.is_write_mode
    }

    /// True while any buffer or the pending queue still holds a request.
    pub fn has_work(&self) -> bool {
        !self.bufs.active.is_empty()
            || !self.bufs.priority.is_empty()
            || !self.bufs.read.is_empty()
            || !self.bufs.write.is_empty()
            || !self.pending.is_empty()
    }

    /// Enqueues a request. On back-pressure the request is handed back for
    /// the front-end to retry.
    pub fn send(&mut self, mut req: Request) -> Result<(), Request> {
        let final_cmd = match self.dram.spec.translations.get(req.type_id) {
            Some(&cmd) => cmd,
            None => panic!("invalid request type {} at enqueue", req.type_id),
        };
        req.final_command = Some(final_cmd);
        req.arrive = self.clk;

        match req.type_id {
            req_type::READ => self.stats.num_read_reqs += 1,
            req_type::WRITE => self.stats.num_write_reqs += 1,
            _ => self.stats.num_other_reqs += 1,
        }

        // Read forwarding: a read hitting an in-flight write is served with
        // the write's value semantics on the next cycle. Vector-built
        // requests carry no flat address and never forward.
        if req.type_id == req_type::READ
            && req.addr >= 0
            && self.bufs.write.iter().any(|w| w.addr == req.addr)
        {
            req.depart = self.clk + 1;
            self.pending.push_back(req);
            return Ok(());
        }

        let buffer = match req.type_id {
            req_type::READ => &mut self.bufs.read,
            req_type::WRITE | req_type::PARTIAL_WRITE => &mut self.bufs.write,
            other => panic!("invalid request type {} at enqueue", other),
        };
        match buffer.enqueue(req) {
            Ok(()) => Ok(()),
            Err(mut req) => {
                req.arrive = -1;
                Err(req)
            }
        }
    }

    /// Enqueues a maintenance request into the priority buffer.
    pub fn priority_send(&mut self, mut req: Request) -> Result<(), Request> {
        let final_cmd = match self.dram.spec.translations.get(req.type_id) {
            Some(&cmd) => cmd,
            None => panic!("invalid request type {} at priority enqueue", req.type_id),
        };
        req.final_command = Some(final_cmd);
        self.bufs.priority.enqueue(req)
    }

    /// Advances the controller by one cycle.
    pub fn tick(&mut self) {
        self.clk += 1;
        self.dram.tick();

        self.stats.queue_len += (self.bufs.read.len()
            + self.bufs.write.len()
            + self.bufs.priority.len()
            + self.pending.len()) as u64;
        self.stats.read_queue_len += (self.bufs.read.len() + self.pending.len()) as u64;
        self.stats.write_queue_len += self.bufs.write.len() as u64;
        self.stats.priority_queue_len += self.bufs.priority.len() as u64;

        self.serve_completed_reads();

        for req in self.refresh.tick(self.clk, &self.dram) {
            if self.priority_send(req).is_err() {
                warn!("channel {}: priority buffer rejected a refresh", self.channel_id);
            }
        }

        let selected = self.schedule_request();

        let found = selected.map(|(id, idx)| self.bufs.req(id, idx));
        let injections = self.row_policy.update(found, self.clk, &self.dram);
        for req in injections {
            if self.priority_send(req).is_err() {
                warn!(
                    "channel {}: priority buffer rejected a row-policy precharge",
                    self.channel_id
                );
            }
        }

        for plugin in self.plugins.iter_mut() {
            let found = selected.map(|(id, idx)| self.bufs.req_mut(id, idx));
            plugin.update(found, self.clk);
        }

        if let Some((id, idx)) = selected {
            if !self.bufs.req(id, idx).is_stat_updated {
                self.update_request_stats(id, idx);
            }

            let (cmd, final_cmd, addr_vec) = {
                let req = self.bufs.req(id, idx);
                (
                    req.command.expect("scheduled request without a command"),
                    req.final_command.expect("scheduled request without a final command"),
                    req.addr_vec.clone(),
                )
            };
            self.dram.issue_command(cmd, &addr_vec);

            if cmd == final_cmd {
                let mut req = self.bufs.get_mut(id).remove(idx);
                if req.type_id == req_type::READ {
                    req.depart = self.clk + self.dram.spec.read_latency;
                    self.pending.push_back(req);
                } else {
                    // Writes and maintenance requests complete on issue.
                    req.depart = self.clk;
                    req.complete();
                }
            } else if self.dram.spec.meta[cmd].is_opening {
                // The row is now activated; the column command schedules
                // from the active buffer. A full active buffer leaves the
                // request where it is for a later move.
                if self.bufs.active.len() < self.bufs.active.max_size() {
                    let req = self.bufs.get_mut(id).remove(idx);
                    self.bufs
                        .active
                        .enqueue(req)
                        .unwrap_or_else(|_| unreachable!("active buffer checked for room"));
                }
            }
        }
    }

    /// Serves every pending read whose data has returned.
    fn serve_completed_reads(&mut self) {
        while let Some(front) = self.pending.front() {
            if front.depart > self.clk {
                break;
            }
            let mut req = self.pending.pop_front().expect("pending front vanished");
            // Forwarded reads (depart == arrive + 1) never touched the
            // device, so they stay out of the latency counters.
            if req.depart - req.arrive > 1 {
                self.stats.read_latency_sum += (req.depart - req.arrive) as u64;
            }
            req.complete();
        }
    }

    /// Checks the write-mode hysteresis watermarks.
    fn update_write_mode(&mut self) {
        let fill = self.bufs.write.len() as f32 / self.bufs.write.max_size() as f32;
        if !self.is_write_mode {
            if fill >= self.wr_high_watermark || self.bufs.read.is_empty() {
                self.is_write_mode = true;
                self.stats.write_mode_toggles += 1;
            }
        } else if fill < self.wr_low_watermark && !self.bufs.read.is_empty() {
            self.is_write_mode = false;
            self.stats.write_mode_toggles += 1;
        }
    }

    /// Picks this cycle's candidate, if any.
    fn schedule_request(&mut self) -> Option<(BufferId, usize)> {
        let mut selected: Option<(BufferId, usize)> = None;

        // Requests with an already-activated row come first, so the ACT is
        // never wasted.
        if let Some(idx) = self
            .scheduler
            .best(&self.dram, &mut self.bufs.active, self.clk)
        {
            let req = self.bufs.active.get(idx);
            if self
                .dram
                .check_ready(req.command.expect("unscheduled command"), &req.addr_vec)
            {
                selected = Some((BufferId::Active, idx));
            }
        }

        if selected.is_none() && !self.bufs.priority.is_empty() {
            let front = self.bufs.priority.get_mut(0);
            let final_cmd = front.final_command.expect("priority request without final command");
            let cmd = self.dram.get_preq_command(final_cmd, &front.addr_vec);
            front.command = Some(cmd);
            if self.dram.check_ready(cmd, &front.addr_vec) {
                selected = Some((BufferId::Priority, 0));
            } else {
                // A blocked maintenance request holds the whole tick; normal
                // traffic must not starve it.
                return None;
            }
        }

        if selected.is_none() {
            self.update_write_mode();
            let id = if self.is_write_mode {
                BufferId::Write
            } else {
                BufferId::Read
            };
            if let Some(idx) = self
                .scheduler
                .best(&self.dram, self.bufs.get_mut(id), self.clk)
            {
                let req = self.bufs.get(id).get(idx);
                if self
                    .dram
                    .check_ready(req.command.expect("unscheduled command"), &req.addr_vec)
                {
                    selected = Some((id, idx));
                }
            }
        }

        // Closing-command conflict guard: never yank an open row from under
        // a request that is already past its ACT.
        if let Some((id, idx)) = selected {
            let cmd = self.bufs.req(id, idx).command.expect("unscheduled command");
            if self.dram.spec.meta[cmd].is_closing {
                let rowgroup = self.bufs.req(id, idx).addr_vec.clone();
                for active_req in self.bufs.active.iter() {
                    let mut matches = true;
                    for slot in 0..=self.bank_level {
                        let a = active_req.addr_vec[slot];
                        let b = rowgroup[slot];
                        if a != b && a != -1 && b != -1 {
                            matches = false;
                            break;
                        }
                    }
                    if matches {
                        return None;
                    }
                }
            }
        }

        selected
    }

    /// First-service row classification; counted exactly once per request.
    fn update_request_stats(&mut self, id: BufferId, idx: usize) {
        let (type_id, source_id, final_cmd, addr_vec) = {
            let req = self.bufs.req_mut(id, idx);
            req.is_stat_updated = true;
            (
                req.type_id,
                req.source_id,
                req.final_command.expect("request without final command"),
                req.addr_vec.clone(),
            )
        };

        match type_id {
            req_type::READ => {
                if self.dram.check_rowbuffer_hit(final_cmd, &addr_vec) {
                    self.stats.read_row_hits += 1;
                    self.stats.row_hits += 1;
                    if source_id >= 0 {
                        self.stats.read_row_hits_per_core[source_id as usize] += 1;
                    }
                } else if self.dram.check_node_open(final_cmd, &addr_vec) {
                    self.stats.read_row_conflicts += 1;
                    self.stats.row_conflicts += 1;
                    if source_id >= 0 {
                        self.stats.read_row_conflicts_per_core[source_id as usize] += 1;
                    }
                } else {
                    self.stats.read_row_misses += 1;
                    self.stats.row_misses += 1;
                    if source_id >= 0 {
                        self.stats.read_row_misses_per_core[source_id as usize] += 1;
                    }
                }
            }
            req_type::WRITE | req_type::PARTIAL_WRITE => {
                if self.dram.check_rowbuffer_hit(final_cmd, &addr_vec) {
                    self.stats.write_row_hits += 1;
                    self.stats.row_hits += 1;
                } else if self.dram.check_node_open(final_cmd, &addr_vec) {
                    self.stats.write_row_conflicts += 1;
                    self.stats.row_conflicts += 1;
                } else {
                    self.stats.write_row_misses += 1;
                    self.stats.row_misses += 1;
                }
            }
            _ => {}
        }
    }

    /// Computes averages and contributes this channel's counters.
    pub fn finalize(&mut self, report: &mut StatsReport) {
        let ch = self.channel_id;
        let clk = self.clk.max(1) as f64;
        let stats = &self.stats;

        let section = report.section(format!("controller_{}", ch));
        section.add("row_hits", stats.row_hits);
        section.add("row_misses", stats.row_misses);
        section.add("row_conflicts", stats.row_conflicts);
        section.add("read_row_hits", stats.read_row_hits);
        section.add("read_row_misses", stats.read_row_misses);
        section.add("read_row_conflicts", stats.read_row_conflicts);
        section.add("write_row_hits", stats.write_row_hits);
        section.add("write_row_misses", stats.write_row_misses);
        section.add("write_row_conflicts", stats.write_row_conflicts);
        for (core, count) in stats.read_row_hits_per_core.iter().enumerate() {
            section.add(format!("read_row_hits_core_{}", core), *count);
        }
        for (core, count) in stats.read_row_misses_per_core.iter().enumerate() {
            section.add(format!("read_row_misses_core_{}", core), *count);
        }
        for (core, count) in stats.read_row_conflicts_per_core.iter().enumerate() {
            section.add(format!("read_row_conflicts_core_{}", core), *count);
        }
        section.add("num_read_reqs", stats.num_read_reqs);
        section.add("num_write_reqs", stats.num_write_reqs);
        section.add("num_other_reqs", stats.num_other_reqs);
        section.add("queue_len", stats.queue_len);
        section.add("read_queue_len", stats.read_queue_len);
        section.add("write_queue_len", stats.write_queue_len);
        section.add("priority_queue_len", stats.priority_queue_len);
        section.add("queue_len_avg", stats.queue_len as f64 / clk);
        section.add("read_queue_len_avg", stats.read_queue_len as f64 / clk);
        section.add("write_queue_len_avg", stats.write_queue_len as f64 / clk);
        section.add(
            "priority_queue_len_avg",
            stats.priority_queue_len as f64 / clk,
        );
        section.add("read_latency", stats.read_latency_sum);
        section.add(
            "avg_read_latency",
            stats.read_latency_sum as f64 / (stats.num_read_reqs.max(1)) as f64,
        );
        section.add("write_mode_toggles", stats.write_mode_toggles);

        let dram_section = report.section(format!("dram_{}", ch));
        for (cmd, count) in self.dram.cmd_counts().iter().enumerate() {
            dram_section.add(
                format!("cmd_{}", self.dram.spec.commands.name(cmd)),
                *count,
            );
        }
        if self.dram.spec.power_enable {
            dram_section.add("command_energy_pj", self.dram.energy_pj());
        }

        for plugin in self.plugins.iter_mut() {
            plugin.finalize(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControllerConfig, DramConfig, RefreshKind};
    use crate::dram::preset::{self, reqt};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn controller(ctrl_cfg: ControllerConfig, dram_cfg: DramConfig) -> Controller {
        let dram = Dram::new(preset::generic_ddr(&dram_cfg), 0);
        Controller::new(&ctrl_cfg, dram, 0, 1).unwrap()
    }

    fn quiet_cfg() -> ControllerConfig {
        // Refresh off so short tests see only their own traffic.
        ControllerConfig {
            refresh: RefreshKind::Disabled,
            ..ControllerConfig::default()
        }
    }

    fn read_at(addr: i64, addr_vec: Vec<i64>) -> Request {
        let mut req = Request::new(addr, reqt::READ);
        req.addr_vec = addr_vec;
        req
    }

    fn write_at(addr: i64, addr_vec: Vec<i64>) -> Request {
        let mut req = Request::new(addr, reqt::WRITE);
        req.addr_vec = addr_vec;
        req
    }

    #[test]
    fn send_routes_by_type_and_reports_backpressure() {
        let mut cfg = quiet_cfg();
        cfg.read_buffer_size = 1;
        let mut ctrl = controller(cfg, DramConfig::default());

        ctrl.send(read_at(0, vec![0, 0, 0, 0, 0, 0])).unwrap();
        ctrl.send(write_at(64, vec![0, 0, 0, 0, 0, 1])).unwrap();
        let rejected = ctrl.send(read_at(128, vec![0, 0, 0, 0, 0, 2]));
        let req = rejected.unwrap_err();
        assert_eq!(req.arrive, -1);
        assert_eq!(ctrl.bufs.read.len(), 1);
        assert_eq!(ctrl.bufs.write.len(), 1);
    }

    #[test]
    fn read_forwarding_bypasses_the_device() {
        let mut ctrl = controller(quiet_cfg(), DramConfig::default());
        let served = Rc::new(RefCell::new(Vec::new()));

        ctrl.send(write_at(0x40, vec![0, 0, 0, 0, 3, 1])).unwrap();

        let served2 = Rc::clone(&served);
        let mut read = read_at(0x40, vec![0, 0, 0, 0, 3, 1]);
        read.callback = Some(Box::new(move |req| served2.borrow_mut().push(req.depart)));
        ctrl.send(read).unwrap();

        assert_eq!(ctrl.pending.len(), 1);
        assert_eq!(ctrl.pending[0].depart, ctrl.clk() + 1);

        ctrl.tick();
        assert_eq!(*served.borrow(), vec![1]);
    }

    #[test]
    fn write_mode_engages_at_high_watermark() {
        let mut cfg = quiet_cfg();
        cfg.write_buffer_size = 10;
        let mut ctrl = controller(cfg, DramConfig::default());

        ctrl.send(read_at(0, vec![0, 0, 0, 0, 0, 0])).unwrap();
        for i in 0..8 {
            ctrl.send(write_at(64 * (i + 1), vec![0, 0, 0, 1, i, 0]))
                .unwrap();
        }
        // Fill ratio 0.8 reaches the high watermark with reads still queued.
        ctrl.tick();
        assert!(ctrl.is_write_mode);
        assert_eq!(ctrl.stats.write_mode_toggles, 1);
    }

    #[test]
    fn empty_read_buffer_prefers_writes() {
        let mut ctrl = controller(quiet_cfg(), DramConfig::default());
        ctrl.send(write_at(0, vec![0, 0, 0, 0, 0, 0])).unwrap();
        ctrl.tick();
        assert!(ctrl.is_write_mode);
        // The write's ACT went out on the first tick.
        let act = ctrl.dram.spec.command("ACT");
        assert_eq!(ctrl.dram.cmd_counts()[act], 1);
    }

    #[test]
    fn closing_guard_protects_active_requests() {
        // Short tRAS so the maintenance precharge is timing-ready while the
        // activated read is still waiting on tRCD.
        let mut dram_cfg = DramConfig::default();
        dram_cfg.timing.t_ras = 2;
        let mut ctrl = controller(quiet_cfg(), dram_cfg);
        let pre_type = ctrl.dram.spec.requests.index("precharge").unwrap();

        // Activate a row for a read; the request moves to the active buffer.
        ctrl.send(read_at(0, vec![0, 0, 0, 0, 5, 0])).unwrap();
        ctrl.tick();
        assert_eq!(ctrl.bufs.active.len(), 1);

        // A maintenance precharge against the same bank must not issue while
        // the activated request is still in flight.
        let pre = Request::from_vec(vec![0, 0, 0, 0, -1, -1], pre_type);
        ctrl.priority_send(pre).unwrap();
        let t_rcd = DramConfig::default().timing.t_rcd;
        for _ in 0..t_rcd {
            ctrl.tick();
        }
        let pre_cmd = ctrl.dram.spec.command("PRE");
        assert_eq!(ctrl.dram.cmd_counts()[pre_cmd], 0);
        // The read already left the active buffer through its RD.
        assert!(ctrl.bufs.active.is_empty());
    }

    #[test]
    fn priority_front_blocks_the_tick_until_ready() {
        let mut ctrl = controller(quiet_cfg(), DramConfig::default());
        let refresh_type = ctrl.dram.spec.requests.index("all-bank-refresh").unwrap();

        // Run one read through so a row is open, then drain the active
        // buffer so it cannot shadow the priority path.
        ctrl.send(read_at(0, vec![0, 0, 0, 0, 5, 0])).unwrap();
        let t_rcd = DramConfig::default().timing.t_rcd;
        for _ in 0..(t_rcd + 2) {
            ctrl.tick();
        }
        assert!(ctrl.bufs.active.is_empty());

        // The refresh needs PREA first, and that PREA is still held back by
        // tRAS, so the priority front is not ready.
        let refresh = Request::from_vec(vec![0, 0, -1, -1, -1, -1], refresh_type);
        ctrl.priority_send(refresh).unwrap();
        ctrl.send(read_at(64, vec![0, 0, 1, 0, 1, 0])).unwrap();

        let rd = ctrl.dram.spec.command("RD");
        let before = ctrl.dram.cmd_counts()[rd];
        ctrl.tick();
        // The unready refresh abandoned the tick; the read did not sneak by.
        assert_eq!(ctrl.dram.cmd_counts()[rd], before);
    }
}
