//! Controller plugin interface.
//!
//! Plugins observe the candidate request each tick, after selection and
//! before issue. They may read and mutate the request's payload and
//! scratchpad but never buffer membership; the controller hands them a
//! mutable borrow of the request in place.

use crate::request::{Clk, Request};
use crate::stats::StatsReport;

/// Per-tick observer attached to a controller.
pub trait ControllerPlugin {
    /// Called every tick with the selected request, if any.
    fn update(&mut self, found: Option<&mut Request>, clk: Clk);

    /// Contributes counters to the finalize-time report.
    fn finalize(&mut self, _report: &mut StatsReport) {}
}
