//! Front-ends: the request producers driving the memory system.
//!
//! A front-end is ticked once per front-end cycle and pushes requests into
//! the memory system; back-pressure (a rejected send) leaves the front-end
//! responsible for retrying. External-simulator bridges come in through
//! [`Frontend::receive_external_requests`].

pub mod trace;

use crate::config::{FrontendConfig, FrontendKind};
use crate::error::ConfigError;
use crate::memory::MemorySystem;
use crate::request::{Addr, Callback};

/// A request producer.
pub trait Frontend {
    /// Advances the front-end by one cycle; may send into `memory`.
    fn tick(&mut self, memory: &mut MemorySystem);

    /// True once the workload is exhausted.
    fn is_finished(&self) -> bool;

    /// Number of request-producing cores (sizes per-core counters).
    fn num_cores(&self) -> usize {
        1
    }

    /// Bridge entry point for requests from an enclosing full-system
    /// simulator. Front-ends that do not bridge reject the request.
    fn receive_external_requests(
        &mut self,
        _memory: &mut MemorySystem,
        _type_id: usize,
        _addr: Addr,
        _source_id: i64,
        _callback: Callback,
    ) -> bool {
        false
    }
}

/// Builds the configured front-end.
///
/// `num_levels` is the device's organization depth, used to validate
/// address-vector traces at load time.
pub fn build(cfg: &FrontendConfig, num_levels: usize) -> Result<Box<dyn Frontend>, ConfigError> {
    let path = std::path::Path::new(&cfg.path);
    match cfg.kind {
        FrontendKind::LoadStoreTrace => Ok(Box::new(trace::LoadStoreTrace::from_path(
            path,
            cfg.num_cores,
        )?)),
        FrontendKind::ReadWriteTrace => Ok(Box::new(trace::ReadWriteTrace::from_path(
            path,
            num_levels,
            cfg.num_cores,
        )?)),
    }
}
