//! Memory-trace front-ends.
//!
//! Two line-based UTF-8 trace grammars are supported:
//! 1. **Load/Store:** `LD <addr>` / `ST <addr>`, address in decimal or
//!    `0x`/`0X` hex; replayed cyclically until one full pass has been sent.
//! 2. **Read/Write:** `R <v0,v1,…>` / `W <v0,v1,…>`, one comma-separated
//!    slot per organization level.
//!
//! Both players re-emit their records in the input grammar (`emit`), so a
//! parse → emit → parse cycle is the identity on the canonical decimal form.

use std::fs;
use std::path::Path;

use log::info;

use crate::error::ConfigError;
use crate::frontend::Frontend;
use crate::memory::MemorySystem;
use crate::request::{req_type, Addr, AddrVec, Request};

fn parse_addr(token: &str) -> Option<Addr> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Addr::from_str_radix(hex, 16).ok()
    } else {
        token.parse().ok()
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::TraceNotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::TraceIo(path.to_path_buf(), e))?;
    Ok(text.lines().map(|l| l.to_string()).collect())
}

/// One `LD`/`ST` record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadStoreRecord {
    /// True for `ST`.
    pub is_write: bool,
    /// Flat physical address.
    pub addr: Addr,
}

/// Flat-address trace player.
#[derive(Debug)]
pub struct LoadStoreTrace {
    trace: Vec<LoadStoreRecord>,
    cursor: usize,
    sent: usize,
    num_cores: usize,
}

impl LoadStoreTrace {
    /// Loads and parses a trace file.
    pub fn from_path(path: &Path, num_cores: usize) -> Result<Self, ConfigError> {
        let mut trace = Vec::new();
        for (line_no, line) in read_lines(path)?.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parse_err = || ConfigError::TraceParse {
                path: path.to_path_buf(),
                line: line_no + 1,
                text: line.clone(),
            };
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 2 {
                return Err(parse_err());
            }
            let is_write = match tokens[0] {
                "LD" => false,
                "ST" => true,
                _ => return Err(parse_err()),
            };
            let addr = parse_addr(tokens[1]).ok_or_else(parse_err)?;
            trace.push(LoadStoreRecord { is_write, addr });
        }
        if trace.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "trace {} holds no records",
                path.display()
            )));
        }
        info!("loaded {} load/store trace lines from {}", trace.len(), path.display());
        Ok(Self {
            trace,
            cursor: 0,
            sent: 0,
            num_cores,
        })
    }

    /// Parsed records, in file order.
    pub fn records(&self) -> &[LoadStoreRecord] {
        &self.trace
    }

    /// Re-emits the trace in the input grammar (canonical decimal form).
    pub fn emit(&self) -> String {
        let mut out = String::new();
        for record in &self.trace {
            let op = if record.is_write { "ST" } else { "LD" };
            out.push_str(&format!("{} {}\n", op, record.addr));
        }
        out
    }
}

impl Frontend for LoadStoreTrace {
    fn tick(&mut self, memory: &mut MemorySystem) {
        if self.is_finished() {
            return;
        }
        let record = self.trace[self.cursor];
        let type_id = if record.is_write {
            req_type::WRITE
        } else {
            req_type::READ
        };
        let mut req = Request::new(record.addr, type_id);
        req.source_id = 0;
        if memory.send(req).is_ok() {
            self.cursor = (self.cursor + 1) % self.trace.len();
            self.sent += 1;
        }
    }

    fn is_finished(&self) -> bool {
        self.sent >= self.trace.len()
    }

    fn num_cores(&self) -> usize {
        self.num_cores
    }
}

/// One `R`/`W` record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadWriteRecord {
    /// True for `W`.
    pub is_write: bool,
    /// Decoded address vector, one slot per organization level.
    pub addr_vec: AddrVec,
}

/// Address-vector trace player.
pub struct ReadWriteTrace {
    trace: Vec<ReadWriteRecord>,
    cursor: usize,
    sent: usize,
    num_cores: usize,
}

impl ReadWriteTrace {
    /// Loads and parses a trace file, validating vector width against the
    /// device's organization depth.
    pub fn from_path(path: &Path, num_levels: usize, num_cores: usize) -> Result<Self, ConfigError> {
        let mut trace = Vec::new();
        for (line_no, line) in read_lines(path)?.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parse_err = || ConfigError::TraceParse {
                path: path.to_path_buf(),
                line: line_no + 1,
                text: line.clone(),
            };
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 2 {
                return Err(parse_err());
            }
            let is_write = match tokens[0] {
                "R" => false,
                "W" => true,
                _ => return Err(parse_err()),
            };
            let addr_vec = tokens[1]
                .split(',')
                .map(|t| t.parse::<i64>().map_err(|_| parse_err()))
                .collect::<Result<AddrVec, _>>()?;
            if addr_vec.len() != num_levels {
                return Err(parse_err());
            }
            trace.push(ReadWriteRecord { is_write, addr_vec });
        }
        if trace.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "trace {} holds no records",
                path.display()
            )));
        }
        info!("loaded {} read/write trace lines from {}", trace.len(), path.display());
        Ok(Self {
            trace,
            cursor: 0,
            sent: 0,
            num_cores,
        })
    }

    /// Parsed records, in file order.
    pub fn records(&self) -> &[ReadWriteRecord] {
        &self.trace
    }

    /// Re-emits the trace in the input grammar.
    pub fn emit(&self) -> String {
        let mut out = String::new();
        for record in &self.trace {
            let op = if record.is_write { "W" } else { "R" };
            let slots: Vec<String> = record.addr_vec.iter().map(|v| v.to_string()).collect();
            out.push_str(&format!("{} {}\n", op, slots.join(",")));
        }
        out
    }
}

impl Frontend for ReadWriteTrace {
    fn tick(&mut self, memory: &mut MemorySystem) {
        if self.is_finished() {
            return;
        }
        let record = self.trace[self.cursor].clone();
        let type_id = if record.is_write {
            req_type::WRITE
        } else {
            req_type::READ
        };
        let mut req = Request::from_vec(record.addr_vec, type_id);
        req.source_id = 0;
        if memory.send(req).is_ok() {
            self.cursor = (self.cursor + 1) % self.trace.len();
            self.sent += 1;
        }
    }

    fn is_finished(&self) -> bool {
        self.sent >= self.trace.len()
    }

    fn num_cores(&self) -> usize {
        self.num_cores
    }
}
