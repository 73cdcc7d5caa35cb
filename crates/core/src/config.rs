//! Configuration system for the DRAM subsystem simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize the simulator. It provides:
//! 1. **Defaults:** Baseline device organization, timing, and controller constants.
//! 2. **Structures:** Hierarchical config for front-end, device, controller, and plugins.
//! 3. **Enums:** Scheduler, refresh policy, row policy, and ECC/EDC scheme selectors.
//! 4. **Catalog:** Every component advertises its tunables (name, description, default, required).
//!
//! Configuration is supplied as JSON (`SimConfig::from_json_file`) or built in
//! code via `SimConfig::default()`.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::request::Clk;

/// Default configuration constants for the simulator.
///
/// These values define the baseline device when not explicitly overridden in
/// the JSON configuration.
mod defaults {
    use crate::request::Clk;

    /// Channels per memory system (one controller per channel).
    pub const CHANNELS: usize = 1;

    /// Ranks per channel.
    pub const RANKS: usize = 1;

    /// Bank groups per rank.
    pub const BANKGROUPS: usize = 4;

    /// Banks per bank group.
    pub const BANKS: usize = 4;

    /// Rows per bank.
    pub const ROWS: usize = 65_536;

    /// Columns per row.
    pub const COLUMNS: usize = 1_024;

    /// Activate to column command delay (tRCD).
    pub const T_RCD: Clk = 16;

    /// Precharge to activate delay (tRP).
    pub const T_RP: Clk = 16;

    /// Activate to precharge minimum (tRAS).
    pub const T_RAS: Clk = 39;

    /// Activate to activate, same bank (tRC).
    pub const T_RC: Clk = 55;

    /// Column command to column command, same rank (tCCD).
    pub const T_CCD: Clk = 4;

    /// Activate to activate, different bank groups (tRRD_S).
    pub const T_RRD_S: Clk = 4;

    /// Activate to activate, same bank group (tRRD_L).
    pub const T_RRD_L: Clk = 6;

    /// Four-activate window (tFAW).
    pub const T_FAW: Clk = 26;

    /// Read to precharge (tRTP).
    pub const T_RTP: Clk = 9;

    /// Write recovery before precharge (lumped write-to-precharge).
    pub const T_WR: Clk = 18;

    /// Read to write turnaround, same rank.
    pub const T_RTW: Clk = 8;

    /// Write to read turnaround, same rank.
    pub const T_WTR: Clk = 9;

    /// All-bank refresh cycle time (tRFC).
    pub const T_RFC: Clk = 420;

    /// Per-bank refresh cycle time (tRFCpb).
    pub const T_RFC_PB: Clk = 208;

    /// Average refresh interval (tREFI).
    pub const T_REFI: Clk = 9_360;

    /// RD issuance to data return, in controller cycles.
    pub const READ_LATENCY: Clk = 22;

    /// Read/write buffer capacity.
    pub const RW_BUFFER_SIZE: usize = 32;

    /// Priority buffer capacity headroom beyond the read/write buffers;
    /// refresh bursts for every rank must always fit.
    pub const PRIORITY_BUFFER_SIZE: usize = 512 * 3 + 32;

    /// Fill ratio below which write mode is left.
    pub const WR_LOW_WATERMARK: f32 = 0.2;

    /// Fill ratio at which write mode is entered.
    pub const WR_HIGH_WATERMARK: f32 = 0.8;

    /// Idle window before the timeout row policy closes a row.
    pub const ROW_TIMEOUT: Clk = 120;

    /// Front-end to memory clock ratio.
    pub const CLOCK_RATIO: u32 = 1;

    /// Cycles the driver keeps ticking after the front-end finishes, to
    /// drain in-flight requests.
    pub const DRAIN_TIMEOUT: Clk = 100_000;

    /// ECC plugin: data block size in bytes.
    pub const ECC_DATA_BLOCK_SIZE: usize = 128;

    /// ECC plugin: EDC size in bytes.
    pub const ECC_EDC_SIZE: usize = 4;

    /// ECC plugin: maximum ECC size in bytes.
    pub const ECC_ECC_SIZE: usize = 8;

    /// ECC plugin: raw bit error rate.
    pub const ECC_BIT_ERROR_RATE: f64 = 1e-6;

    /// ECC plugin: maximum allowed failure probability.
    pub const ECC_MAX_FAILURE_PROB: f64 = 1e-14;

    /// ECC plugin: PRNG seed for error injection.
    pub const ECC_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

    /// PRAC plugin: activations before a recovery window is scheduled.
    pub const PRAC_ALERT_THRESHOLD: u64 = 512;

    /// PRAC plugin: length of a recovery window in cycles.
    pub const PRAC_RECOVERY_CYCLES: Clk = 350;
}

/// A tunable parameter advertised by a component.
#[derive(Clone, Copy, Debug)]
pub struct ParamInfo {
    /// Parameter name as it appears in the configuration.
    pub name: &'static str,
    /// Human-readable description.
    pub desc: &'static str,
    /// Default value rendered as text; empty when required.
    pub default: &'static str,
    /// Whether the configuration must supply the value.
    pub required: bool,
}

/// Scheduler implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SchedulerKind {
    /// First-ready, first-come-first-serve.
    #[default]
    #[serde(alias = "FRFCFS")]
    Frfcfs,
    /// FRFCFS extended with PRAC recovery-window awareness. Requires the
    /// PRAC plugin.
    #[serde(alias = "PRAC")]
    Prac,
}

/// Refresh manager implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RefreshKind {
    /// One all-bank refresh per rank every tREFI.
    #[default]
    AllBank,
    /// Per-bank refreshes staggered across the tREFI window.
    PerBank,
    /// No refresh (traffic studies only; violates retention).
    Disabled,
}

/// Row policy implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RowPolicyKind {
    /// Leave rows open; rely on conflicts to close them.
    #[default]
    OpenPage,
    /// Close a row as soon as its column access has been issued.
    ClosedPage,
    /// Close a row after a configurable idle window.
    TimeoutOpenPage,
}

/// ECC scheme selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EccScheme {
    /// Parity-based Hamming-style code.
    Hamming,
    /// Reed-Solomon symbol code (supports incremental update).
    Rs,
    /// BCH-style block code.
    #[default]
    Bch,
}

impl EccScheme {
    /// Resolves a scheme by its configuration name.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "hamming" => Ok(EccScheme::Hamming),
            "rs" => Ok(EccScheme::Rs),
            "bch" => Ok(EccScheme::Bch),
            _ => Err(ConfigError::UnknownScheme {
                kind: "ecc",
                name: name.to_string(),
            }),
        }
    }
}

/// EDC scheme selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdcScheme {
    /// Additive byte checksum.
    Checksum,
    /// CRC-32 (IEEE polynomial).
    #[default]
    Crc32,
    /// CRC-64 (ECMA polynomial).
    Crc64,
}

impl EdcScheme {
    /// Resolves a scheme by its configuration name.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "checksum" => Ok(EdcScheme::Checksum),
            "crc32" => Ok(EdcScheme::Crc32),
            "crc64" => Ok(EdcScheme::Crc64),
            _ => Err(ConfigError::UnknownScheme {
                kind: "edc",
                name: name.to_string(),
            }),
        }
    }
}

/// Front-end implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FrontendKind {
    /// `LD <addr>` / `ST <addr>` flat-address trace.
    #[default]
    LoadStoreTrace,
    /// `R <v0,v1,…>` / `W <v0,v1,…>` address-vector trace.
    ReadWriteTrace,
}

/// Root configuration structure containing all simulator settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SimConfig {
    /// Front-end (request producer) configuration.
    #[serde(default)]
    pub frontend: FrontendConfig,
    /// Memory system configuration.
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl SimConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ConfigIo(path.to_path_buf(), e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::ConfigParse(e.to_string()))
    }

    /// Validates cross-field requirements that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frontend.path.is_empty() {
            return Err(ConfigError::MissingParameter {
                component: "frontend",
                name: "path",
            });
        }
        let ctrl = &self.memory.controller;
        if !(0.0..=1.0).contains(&ctrl.wr_low_watermark)
            || !(0.0..=1.0).contains(&ctrl.wr_high_watermark)
            || ctrl.wr_low_watermark > ctrl.wr_high_watermark
        {
            return Err(ConfigError::Invalid(
                "write watermarks must satisfy 0 <= low <= high <= 1".to_string(),
            ));
        }
        if ctrl.scheduler == SchedulerKind::Prac
            && !ctrl
                .plugins
                .iter()
                .any(|p| matches!(p, PluginConfig::Prac(_)))
        {
            return Err(ConfigError::Invalid(
                "the PRAC scheduler requires the PRAC plugin".to_string(),
            ));
        }
        Ok(())
    }
}

/// Front-end configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// Front-end implementation.
    #[serde(default)]
    pub kind: FrontendKind,

    /// Path to the trace file. Required.
    #[serde(default)]
    pub path: String,

    /// Front-end to memory clock ratio (front-end ticks per memory tick).
    #[serde(default = "FrontendConfig::default_clock_ratio")]
    pub clock_ratio: u32,

    /// Number of request-producing cores (sizes the per-core counters).
    #[serde(default = "FrontendConfig::default_num_cores")]
    pub num_cores: usize,
}

impl FrontendConfig {
    /// Returns the default front-end to memory clock ratio.
    fn default_clock_ratio() -> u32 {
        defaults::CLOCK_RATIO
    }

    /// Returns the default number of cores.
    fn default_num_cores() -> usize {
        1
    }

    /// Advertised tunables.
    pub fn params() -> &'static [ParamInfo] {
        &[
            ParamInfo {
                name: "kind",
                desc: "Front-end implementation (LoadStoreTrace, ReadWriteTrace).",
                default: "LoadStoreTrace",
                required: false,
            },
            ParamInfo {
                name: "path",
                desc: "Path to the trace file.",
                default: "",
                required: true,
            },
            ParamInfo {
                name: "clock_ratio",
                desc: "Front-end ticks per memory tick.",
                default: "1",
                required: false,
            },
            ParamInfo {
                name: "num_cores",
                desc: "Number of request-producing cores.",
                default: "1",
                required: false,
            },
        ]
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            kind: FrontendKind::default(),
            path: String::new(),
            clock_ratio: defaults::CLOCK_RATIO,
            num_cores: 1,
        }
    }
}

/// Memory system configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// DRAM device configuration.
    #[serde(default)]
    pub dram: DramConfig,
    /// Per-channel controller configuration.
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Cycles to keep draining in-flight requests after the front-end
    /// finishes.
    #[serde(default = "MemoryConfig::default_drain_timeout")]
    pub drain_timeout: Clk,
}

impl MemoryConfig {
    /// Returns the default drain timeout.
    fn default_drain_timeout() -> Clk {
        defaults::DRAIN_TIMEOUT
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dram: DramConfig::default(),
            controller: ControllerConfig::default(),
            drain_timeout: defaults::DRAIN_TIMEOUT,
        }
    }
}

/// DRAM device configuration: organization and timing.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DramConfig {
    /// Instance counts per organization level.
    #[serde(default)]
    pub organization: OrganizationConfig,
    /// Timing constraint values, in controller cycles.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Enable command energy accounting.
    #[serde(default)]
    pub power_enable: bool,
    /// Record every issued command (cycle, command, address vector).
    #[serde(default)]
    pub trace_commands: bool,
}

/// Instance counts per organization level.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationConfig {
    /// Channels (one controller per channel).
    #[serde(default = "OrganizationConfig::default_channel")]
    pub channel: usize,
    /// Ranks per channel.
    #[serde(default = "OrganizationConfig::default_rank")]
    pub rank: usize,
    /// Bank groups per rank.
    #[serde(default = "OrganizationConfig::default_bankgroup")]
    pub bankgroup: usize,
    /// Banks per bank group.
    #[serde(default = "OrganizationConfig::default_bank")]
    pub bank: usize,
    /// Rows per bank.
    #[serde(default = "OrganizationConfig::default_row")]
    pub row: usize,
    /// Columns per row.
    #[serde(default = "OrganizationConfig::default_column")]
    pub column: usize,
}

impl OrganizationConfig {
    /// Returns the default channel count.
    fn default_channel() -> usize {
        defaults::CHANNELS
    }

    /// Returns the default rank count.
    fn default_rank() -> usize {
        defaults::RANKS
    }

    /// Returns the default bank group count.
    fn default_bankgroup() -> usize {
        defaults::BANKGROUPS
    }

    /// Returns the default bank count.
    fn default_bank() -> usize {
        defaults::BANKS
    }

    /// Returns the default row count.
    fn default_row() -> usize {
        defaults::ROWS
    }

    /// Returns the default column count.
    fn default_column() -> usize {
        defaults::COLUMNS
    }

    /// Total banks per rank.
    pub fn banks_per_rank(&self) -> usize {
        self.bankgroup * self.bank
    }
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            channel: defaults::CHANNELS,
            rank: defaults::RANKS,
            bankgroup: defaults::BANKGROUPS,
            bank: defaults::BANKS,
            row: defaults::ROWS,
            column: defaults::COLUMNS,
        }
    }
}

/// Timing constraint values, in controller cycles.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Activate to column command (tRCD).
    #[serde(default = "TimingConfig::default_t_rcd")]
    pub t_rcd: Clk,
    /// Precharge to activate (tRP).
    #[serde(default = "TimingConfig::default_t_rp")]
    pub t_rp: Clk,
    /// Activate to precharge minimum (tRAS).
    #[serde(default = "TimingConfig::default_t_ras")]
    pub t_ras: Clk,
    /// Activate to activate, same bank (tRC).
    #[serde(default = "TimingConfig::default_t_rc")]
    pub t_rc: Clk,
    /// Column to column, same rank (tCCD).
    #[serde(default = "TimingConfig::default_t_ccd")]
    pub t_ccd: Clk,
    /// Activate to activate across bank groups (tRRD_S).
    #[serde(default = "TimingConfig::default_t_rrd_s")]
    pub t_rrd_s: Clk,
    /// Activate to activate within a bank group (tRRD_L).
    #[serde(default = "TimingConfig::default_t_rrd_l")]
    pub t_rrd_l: Clk,
    /// Four-activate window (tFAW).
    #[serde(default = "TimingConfig::default_t_faw")]
    pub t_faw: Clk,
    /// Read to precharge (tRTP).
    #[serde(default = "TimingConfig::default_t_rtp")]
    pub t_rtp: Clk,
    /// Write to precharge recovery.
    #[serde(default = "TimingConfig::default_t_wr")]
    pub t_wr: Clk,
    /// Read to write turnaround.
    #[serde(default = "TimingConfig::default_t_rtw")]
    pub t_rtw: Clk,
    /// Write to read turnaround.
    #[serde(default = "TimingConfig::default_t_wtr")]
    pub t_wtr: Clk,
    /// All-bank refresh cycle (tRFC).
    #[serde(default = "TimingConfig::default_t_rfc")]
    pub t_rfc: Clk,
    /// Per-bank refresh cycle (tRFCpb).
    #[serde(default = "TimingConfig::default_t_rfc_pb")]
    pub t_rfc_pb: Clk,
    /// Average refresh interval (tREFI).
    #[serde(default = "TimingConfig::default_t_refi")]
    pub t_refi: Clk,
    /// RD issuance to data return.
    #[serde(default = "TimingConfig::default_read_latency")]
    pub read_latency: Clk,
}

impl TimingConfig {
    fn default_t_rcd() -> Clk {
        defaults::T_RCD
    }
    fn default_t_rp() -> Clk {
        defaults::T_RP
    }
    fn default_t_ras() -> Clk {
        defaults::T_RAS
    }
    fn default_t_rc() -> Clk {
        defaults::T_RC
    }
    fn default_t_ccd() -> Clk {
        defaults::T_CCD
    }
    fn default_t_rrd_s() -> Clk {
        defaults::T_RRD_S
    }
    fn default_t_rrd_l() -> Clk {
        defaults::T_RRD_L
    }
    fn default_t_faw() -> Clk {
        defaults::T_FAW
    }
    fn default_t_rtp() -> Clk {
        defaults::T_RTP
    }
    fn default_t_wr() -> Clk {
        defaults::T_WR
    }
    fn default_t_rtw() -> Clk {
        defaults::T_RTW
    }
    fn default_t_wtr() -> Clk {
        defaults::T_WTR
    }
    fn default_t_rfc() -> Clk {
        defaults::T_RFC
    }
    fn default_t_rfc_pb() -> Clk {
        defaults::T_RFC_PB
    }
    fn default_t_refi() -> Clk {
        defaults::T_REFI
    }
    fn default_read_latency() -> Clk {
        defaults::READ_LATENCY
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            t_rcd: defaults::T_RCD,
            t_rp: defaults::T_RP,
            t_ras: defaults::T_RAS,
            t_rc: defaults::T_RC,
            t_ccd: defaults::T_CCD,
            t_rrd_s: defaults::T_RRD_S,
            t_rrd_l: defaults::T_RRD_L,
            t_faw: defaults::T_FAW,
            t_rtp: defaults::T_RTP,
            t_wr: defaults::T_WR,
            t_rtw: defaults::T_RTW,
            t_wtr: defaults::T_WTR,
            t_rfc: defaults::T_RFC,
            t_rfc_pb: defaults::T_RFC_PB,
            t_refi: defaults::T_REFI,
            read_latency: defaults::READ_LATENCY,
        }
    }
}

/// Per-channel controller configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Threshold for switching back to read mode.
    #[serde(default = "ControllerConfig::default_wr_low_watermark")]
    pub wr_low_watermark: f32,

    /// Threshold for switching to write mode.
    #[serde(default = "ControllerConfig::default_wr_high_watermark")]
    pub wr_high_watermark: f32,

    /// Read buffer capacity.
    #[serde(default = "ControllerConfig::default_rw_buffer_size")]
    pub read_buffer_size: usize,

    /// Write buffer capacity.
    #[serde(default = "ControllerConfig::default_rw_buffer_size")]
    pub write_buffer_size: usize,

    /// Priority buffer capacity.
    #[serde(default = "ControllerConfig::default_priority_buffer_size")]
    pub priority_buffer_size: usize,

    /// Scheduler implementation.
    #[serde(default)]
    pub scheduler: SchedulerKind,

    /// Refresh manager implementation.
    #[serde(default)]
    pub refresh: RefreshKind,

    /// Row policy implementation.
    #[serde(default)]
    pub row_policy: RowPolicyKind,

    /// Idle window for the timeout row policy.
    #[serde(default = "ControllerConfig::default_row_timeout")]
    pub row_timeout: Clk,

    /// Plugins, invoked in list order every tick.
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

impl ControllerConfig {
    /// Returns the default low watermark.
    fn default_wr_low_watermark() -> f32 {
        defaults::WR_LOW_WATERMARK
    }

    /// Returns the default high watermark.
    fn default_wr_high_watermark() -> f32 {
        defaults::WR_HIGH_WATERMARK
    }

    /// Returns the default read/write buffer capacity.
    fn default_rw_buffer_size() -> usize {
        defaults::RW_BUFFER_SIZE
    }

    /// Returns the default priority buffer capacity.
    fn default_priority_buffer_size() -> usize {
        defaults::PRIORITY_BUFFER_SIZE
    }

    /// Returns the default row timeout.
    fn default_row_timeout() -> Clk {
        defaults::ROW_TIMEOUT
    }

    /// Advertised tunables.
    pub fn params() -> &'static [ParamInfo] {
        &[
            ParamInfo {
                name: "wr_low_watermark",
                desc: "Threshold for switching back to read mode.",
                default: "0.2",
                required: false,
            },
            ParamInfo {
                name: "wr_high_watermark",
                desc: "Threshold for switching to write mode.",
                default: "0.8",
                required: false,
            },
            ParamInfo {
                name: "read_buffer_size",
                desc: "Read buffer capacity.",
                default: "32",
                required: false,
            },
            ParamInfo {
                name: "write_buffer_size",
                desc: "Write buffer capacity.",
                default: "32",
                required: false,
            },
            ParamInfo {
                name: "priority_buffer_size",
                desc: "Priority buffer capacity.",
                default: "1568",
                required: false,
            },
            ParamInfo {
                name: "scheduler",
                desc: "Scheduler implementation (Frfcfs, Prac).",
                default: "Frfcfs",
                required: false,
            },
            ParamInfo {
                name: "refresh",
                desc: "Refresh manager (AllBank, PerBank, Disabled).",
                default: "AllBank",
                required: false,
            },
            ParamInfo {
                name: "row_policy",
                desc: "Row policy (OpenPage, ClosedPage, TimeoutOpenPage).",
                default: "OpenPage",
                required: false,
            },
            ParamInfo {
                name: "row_timeout",
                desc: "Idle window before the timeout policy closes a row.",
                default: "120",
                required: false,
            },
        ]
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            wr_low_watermark: defaults::WR_LOW_WATERMARK,
            wr_high_watermark: defaults::WR_HIGH_WATERMARK,
            read_buffer_size: defaults::RW_BUFFER_SIZE,
            write_buffer_size: defaults::RW_BUFFER_SIZE,
            priority_buffer_size: defaults::PRIORITY_BUFFER_SIZE,
            scheduler: SchedulerKind::default(),
            refresh: RefreshKind::default(),
            row_policy: RowPolicyKind::default(),
            row_timeout: defaults::ROW_TIMEOUT,
            plugins: Vec::new(),
        }
    }
}

/// Controller plugin configuration, tagged by plugin name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "PascalCase")]
pub enum PluginConfig {
    /// EDC+ECC reliability plugin.
    Ecc(EccConfig),
    /// PRAC activation-counter plugin.
    Prac(PracConfig),
}

/// ECC plugin configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EccConfig {
    /// Size of each data block in bytes.
    #[serde(default = "EccConfig::default_data_block_size")]
    pub data_block_size: usize,

    /// Size of the EDC in bytes.
    #[serde(default = "EccConfig::default_edc_size")]
    pub edc_size: usize,

    /// Maximum ECC size in bytes.
    #[serde(default = "EccConfig::default_ecc_size")]
    pub ecc_size: usize,

    /// ECC scheme (hamming, rs, bch).
    #[serde(default)]
    pub ecc_scheme: EccScheme,

    /// EDC scheme (checksum, crc32, crc64).
    #[serde(default)]
    pub edc_scheme: EdcScheme,

    /// Raw bit error rate (BER).
    #[serde(default = "EccConfig::default_bit_error_rate")]
    pub bit_error_rate: f64,

    /// Maximum allowed failure probability.
    #[serde(default = "EccConfig::default_max_failure_prob")]
    pub max_failure_prob: f64,

    /// Error-injection PRNG seed.
    #[serde(default = "EccConfig::default_seed")]
    pub seed: u64,
}

impl EccConfig {
    /// Returns the default data block size.
    fn default_data_block_size() -> usize {
        defaults::ECC_DATA_BLOCK_SIZE
    }

    /// Returns the default EDC size.
    fn default_edc_size() -> usize {
        defaults::ECC_EDC_SIZE
    }

    /// Returns the default maximum ECC size.
    fn default_ecc_size() -> usize {
        defaults::ECC_ECC_SIZE
    }

    /// Returns the default bit error rate.
    fn default_bit_error_rate() -> f64 {
        defaults::ECC_BIT_ERROR_RATE
    }

    /// Returns the default maximum failure probability.
    fn default_max_failure_prob() -> f64 {
        defaults::ECC_MAX_FAILURE_PROB
    }

    /// Returns the default PRNG seed.
    fn default_seed() -> u64 {
        defaults::ECC_SEED
    }

    /// Advertised tunables.
    pub fn params() -> &'static [ParamInfo] {
        &[
            ParamInfo {
                name: "data_block_size",
                desc: "Size of each data block in bytes.",
                default: "128",
                required: false,
            },
            ParamInfo {
                name: "edc_size",
                desc: "Size of EDC in bytes.",
                default: "4",
                required: false,
            },
            ParamInfo {
                name: "ecc_size",
                desc: "Maximum ECC size in bytes.",
                default: "8",
                required: false,
            },
            ParamInfo {
                name: "ecc_scheme",
                desc: "ECC scheme to use: hamming, rs, bch.",
                default: "bch",
                required: false,
            },
            ParamInfo {
                name: "edc_scheme",
                desc: "EDC scheme to use: checksum, crc32, crc64.",
                default: "crc32",
                required: false,
            },
            ParamInfo {
                name: "bit_error_rate",
                desc: "Raw bit error rate (BER).",
                default: "1e-6",
                required: false,
            },
            ParamInfo {
                name: "max_failure_prob",
                desc: "Maximum allowed failure probability.",
                default: "1e-14",
                required: false,
            },
            ParamInfo {
                name: "seed",
                desc: "Error-injection PRNG seed.",
                default: "0x9E3779B97F4A7C15",
                required: false,
            },
        ]
    }
}

impl Default for EccConfig {
    fn default() -> Self {
        Self {
            data_block_size: defaults::ECC_DATA_BLOCK_SIZE,
            edc_size: defaults::ECC_EDC_SIZE,
            ecc_size: defaults::ECC_ECC_SIZE,
            ecc_scheme: EccScheme::default(),
            edc_scheme: EdcScheme::default(),
            bit_error_rate: defaults::ECC_BIT_ERROR_RATE,
            max_failure_prob: defaults::ECC_MAX_FAILURE_PROB,
            seed: defaults::ECC_SEED,
        }
    }
}

/// PRAC plugin configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PracConfig {
    /// Activations on one bank before a recovery window is scheduled.
    #[serde(default = "PracConfig::default_alert_threshold")]
    pub alert_threshold: u64,

    /// Length of a recovery window in cycles.
    #[serde(default = "PracConfig::default_recovery_cycles")]
    pub recovery_cycles: Clk,
}

impl PracConfig {
    /// Returns the default alert threshold.
    fn default_alert_threshold() -> u64 {
        defaults::PRAC_ALERT_THRESHOLD
    }

    /// Returns the default recovery window length.
    fn default_recovery_cycles() -> Clk {
        defaults::PRAC_RECOVERY_CYCLES
    }

    /// Advertised tunables.
    pub fn params() -> &'static [ParamInfo] {
        &[
            ParamInfo {
                name: "alert_threshold",
                desc: "Activations on one bank before a recovery window is scheduled.",
                default: "512",
                required: false,
            },
            ParamInfo {
                name: "recovery_cycles",
                desc: "Length of a recovery window in cycles.",
                default: "350",
                required: false,
            },
        ]
    }
}

impl Default for PracConfig {
    fn default() -> Self {
        Self {
            alert_threshold: defaults::PRAC_ALERT_THRESHOLD,
            recovery_cycles: defaults::PRAC_RECOVERY_CYCLES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_self_consistent() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.memory.controller.read_buffer_size, 32);
        assert!(cfg.memory.controller.wr_low_watermark < cfg.memory.controller.wr_high_watermark);
        // Only the trace path is missing from an otherwise valid default.
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingParameter { name: "path", .. })
        ));
    }

    #[test]
    fn json_round_trip_with_aliases() {
        let json = r#"{
            "frontend": { "kind": "ReadWriteTrace", "path": "t.trace", "clock_ratio": 2 },
            "memory": {
                "dram": {
                    "organization": { "rank": 2, "bank": 8 },
                    "timing": { "t_rcd": 20 }
                },
                "controller": {
                    "scheduler": "FRFCFS",
                    "row_policy": "ClosedPage",
                    "plugins": [
                        { "name": "Ecc", "edc_scheme": "crc64", "ecc_scheme": "rs" }
                    ]
                }
            }
        }"#;
        let cfg: SimConfig = serde_json::from_str(json).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.frontend.kind, FrontendKind::ReadWriteTrace);
        assert_eq!(cfg.memory.dram.organization.rank, 2);
        assert_eq!(cfg.memory.dram.organization.bankgroup, 4);
        assert_eq!(cfg.memory.dram.timing.t_rcd, 20);
        assert_eq!(cfg.memory.controller.row_policy, RowPolicyKind::ClosedPage);
        match &cfg.memory.controller.plugins[0] {
            PluginConfig::Ecc(ecc) => {
                assert_eq!(ecc.edc_scheme, EdcScheme::Crc64);
                assert_eq!(ecc.ecc_scheme, EccScheme::Rs);
                assert_eq!(ecc.data_block_size, 128);
            }
            other => panic!("unexpected plugin {:?}", other),
        }
    }

    #[test]
    fn scheme_names_resolve_or_report() {
        assert_eq!(EccScheme::from_name("rs").unwrap(), EccScheme::Rs);
        assert_eq!(EdcScheme::from_name("crc64").unwrap(), EdcScheme::Crc64);
        assert!(matches!(
            EccScheme::from_name("turbo"),
            Err(ConfigError::UnknownScheme { kind: "ecc", .. })
        ));
        assert!(matches!(
            EdcScheme::from_name("md5"),
            Err(ConfigError::UnknownScheme { kind: "edc", .. })
        ));
    }

    #[test]
    fn unknown_scheme_is_rejected_at_parse() {
        let json = r#"{
            "frontend": { "path": "t.trace" },
            "memory": { "controller": { "plugins": [ { "name": "Ecc", "ecc_scheme": "turbo" } ] } }
        }"#;
        assert!(serde_json::from_str::<SimConfig>(json).is_err());
    }

    #[test]
    fn prac_scheduler_requires_prac_plugin() {
        let mut cfg = SimConfig::default();
        cfg.frontend.path = "t.trace".to_string();
        cfg.memory.controller.scheduler = SchedulerKind::Prac;
        assert!(cfg.validate().is_err());
        cfg.memory
            .controller
            .plugins
            .push(PluginConfig::Prac(PracConfig::default()));
        cfg.validate().unwrap();
    }
}
