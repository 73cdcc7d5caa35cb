//! The memory system: address decode and channel routing.
//!
//! Owns one controller per channel. Flat-address requests are decoded into
//! address vectors by a simple modulo mapper (channel and column in the low
//! bits, row in the high bits) and routed to their channel's controller;
//! requests built from address vectors route directly.

use crate::config::MemoryConfig;
use crate::controller::Controller;
use crate::dram::{preset, Dram};
use crate::error::ConfigError;
use crate::request::{Addr, AddrVec, Request};
use crate::stats::StatsReport;

/// 64-byte transactions: the low address bits never reach the mapper.
const TX_OFFSET_BITS: u32 = 6;

/// Flat-address to address-vector mapper.
///
/// After stripping the transaction offset, slots are peeled off the low end
/// in the order channel, column, bankgroup, bank, rank; the row takes the
/// remaining high bits. Counts need not be powers of two.
pub struct AddrMapper {
    counts: Vec<usize>,
    /// Decode order as level indices, lowest bits first; the last listed
    /// level takes the remainder.
    order: Vec<usize>,
}

impl AddrMapper {
    /// Builds the mapper from the spec's organization counts and level names.
    pub fn new(dram: &Dram) -> Self {
        let spec = &dram.spec;
        let order = vec![
            spec.level("channel"),
            spec.level("column"),
            spec.level("bankgroup"),
            spec.level("bank"),
            spec.level("rank"),
            spec.level("row"),
        ];
        Self {
            counts: spec.organization.clone(),
            order,
        }
    }

    /// Decodes a flat address into one slot per organization level.
    pub fn decode(&self, addr: Addr) -> AddrVec {
        let mut addr_vec = vec![0i64; self.counts.len()];
        let mut rest = (addr as u64) >> TX_OFFSET_BITS;
        for (pos, &level) in self.order.iter().enumerate() {
            if pos + 1 == self.order.len() {
                addr_vec[level] = rest as i64;
            } else {
                let count = self.counts[level] as u64;
                addr_vec[level] = (rest % count) as i64;
                rest /= count;
            }
        }
        addr_vec
    }
}

/// One controller per channel plus the shared address mapper.
pub struct MemorySystem {
    controllers: Vec<Controller>,
    mapper: AddrMapper,
}

impl MemorySystem {
    /// Builds the device tree and controllers from configuration.
    pub fn new(cfg: &MemoryConfig, num_cores: usize) -> Result<Self, ConfigError> {
        let num_channels = cfg.dram.organization.channel;
        if num_channels == 0 {
            return Err(ConfigError::Invalid("zero channels configured".to_string()));
        }

        let mut controllers = Vec::with_capacity(num_channels);
        for channel_id in 0..num_channels {
            let spec = preset::generic_ddr(&cfg.dram);
            let mut dram = Dram::new(spec, channel_id);
            dram.set_record_commands(cfg.dram.trace_commands);
            controllers.push(Controller::new(&cfg.controller, dram, channel_id, num_cores)?);
        }
        let mapper = AddrMapper::new(&controllers[0].dram);
        Ok(Self {
            controllers,
            mapper,
        })
    }

    /// Number of organization levels of the attached devices.
    pub fn num_levels(&self) -> usize {
        self.controllers[0].dram.spec.num_levels()
    }

    /// Routes a request to its channel's controller. Decodes the flat
    /// address when no vector was supplied; hands the request back on
    /// back-pressure.
    pub fn send(&mut self, mut req: Request) -> Result<(), Request> {
        if req.addr_vec.is_empty() {
            req.addr_vec = self.mapper.decode(req.addr);
        }
        let channel = req.addr_vec[0];
        assert!(
            channel >= 0 && (channel as usize) < self.controllers.len(),
            "request routed to nonexistent channel {}",
            channel
        );
        self.controllers[channel as usize].send(req)
    }

    /// Advances every controller by one cycle.
    pub fn tick(&mut self) {
        for controller in &mut self.controllers {
            controller.tick();
        }
    }

    /// True while any channel still holds in-flight requests.
    pub fn has_work(&self) -> bool {
        self.controllers.iter().any(|c| c.has_work())
    }

    /// Borrows one channel's controller (statistics, device queries).
    pub fn controller(&self, channel: usize) -> &Controller {
        &self.controllers[channel]
    }

    /// Forwards a reconfiguration notification to every device.
    pub fn notify(&mut self, key: &str, value: u64) {
        for controller in &mut self.controllers {
            controller.dram.notify(key, value);
        }
    }

    /// Collects every channel's counters.
    pub fn finalize(&mut self, report: &mut StatsReport) {
        for controller in &mut self.controllers {
            controller.finalize(report);
        }
    }
}
