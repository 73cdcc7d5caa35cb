//! Simulation driver.
//!
//! Builds the front-end and memory system from a [`SimConfig`], runs the
//! fixed per-cycle order (front-end first, then every controller), drains
//! in-flight requests once the front-end finishes, and finalizes into a
//! [`StatsReport`].

use log::{info, warn};

use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::frontend::{self, Frontend};
use crate::memory::MemorySystem;
use crate::request::Clk;
use crate::stats::StatsReport;

/// A fully constructed simulation.
pub struct Simulation {
    frontend: Box<dyn Frontend>,
    memory: MemorySystem,
    clock_ratio: u32,
    drain_timeout: Clk,
    memory_cycles: Clk,
}

impl Simulation {
    /// Builds front-end and memory system; fails on any configuration error.
    pub fn from_config(cfg: &SimConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let memory = MemorySystem::new(&cfg.memory, cfg.frontend.num_cores)?;
        let frontend = frontend::build(&cfg.frontend, memory.num_levels())?;
        Ok(Self {
            frontend,
            memory,
            clock_ratio: cfg.frontend.clock_ratio.max(1),
            drain_timeout: cfg.memory.drain_timeout,
            memory_cycles: 0,
        })
    }

    /// Memory cycles simulated so far.
    pub fn memory_cycles(&self) -> Clk {
        self.memory_cycles
    }

    /// Borrows the memory system (post-run inspection).
    pub fn memory(&self) -> &MemorySystem {
        &self.memory
    }

    /// Runs to completion and returns the statistics report.
    pub fn run(&mut self) -> StatsReport {
        while !self.frontend.is_finished() {
            for _ in 0..self.clock_ratio {
                self.frontend.tick(&mut self.memory);
            }
            self.memory.tick();
            self.memory_cycles += 1;
        }
        info!(
            "front-end finished after {} memory cycles, draining",
            self.memory_cycles
        );

        let mut drained = 0;
        while self.memory.has_work() && drained < self.drain_timeout {
            self.memory.tick();
            self.memory_cycles += 1;
            drained += 1;
        }
        if self.memory.has_work() {
            warn!(
                "in-flight requests remain after {} drain cycles",
                self.drain_timeout
            );
        }

        let mut report = StatsReport::new();
        report
            .section("simulation")
            .add("memory_cycles", self.memory_cycles);
        self.memory.finalize(&mut report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FrontendKind, RefreshKind, SimConfig};
    use std::io::Write;

    #[test]
    fn trace_driven_run_completes_and_reports() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "LD 0\nST 64\nLD 128\nLD 0\n").unwrap();

        let mut cfg = SimConfig::default();
        cfg.frontend.kind = FrontendKind::LoadStoreTrace;
        cfg.frontend.path = file.path().to_string_lossy().into_owned();
        cfg.memory.controller.refresh = RefreshKind::Disabled;

        let mut sim = Simulation::from_config(&cfg).unwrap();
        let report = sim.run();

        let reads = report.get("controller_0", "num_read_reqs").unwrap();
        let writes = report.get("controller_0", "num_write_reqs").unwrap();
        assert_eq!(format!("{}", reads), "3");
        assert_eq!(format!("{}", writes), "1");
        assert!(!sim.memory().has_work());
        assert!(sim.memory_cycles() > 0);
    }

    #[test]
    fn missing_trace_is_a_config_error() {
        let mut cfg = SimConfig::default();
        cfg.frontend.path = "/nonexistent/trace.txt".to_string();
        assert!(Simulation::from_config(&cfg).is_err());
    }
}
