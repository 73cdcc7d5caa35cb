//! Cycle-accurate DRAM subsystem simulator.
//!
//! The crate models a memory controller and its attached DRAM device at
//! command granularity:
//! 1. **Device model** (`dram`): a hierarchical state machine over the
//!    organization tree, enforcing the spec's timing-constraint table and
//!    answering readiness and prerequisite queries.
//! 2. **Controller** (`controller`): a per-channel pipeline with active /
//!    priority / read / write buffers, read forwarding, write-mode
//!    hysteresis, row policies, refresh, and a plugin hook.
//! 3. **Front-ends** (`frontend`): trace players producing the request
//!    stream.
//! 4. **Driver** (`sim`): builds everything from a JSON-backed
//!    configuration, runs the tick loop, and reports statistics.

pub mod config;
pub mod controller;
pub mod dram;
pub mod error;
pub mod frontend;
pub mod memory;
pub mod request;
pub mod sim;
pub mod stats;
