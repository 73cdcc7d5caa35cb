//! Memory requests and request buffers.
//!
//! This module defines the unit of work flowing through the controller. It
//! provides:
//! 1. **Request:** Address, type, current/final command, timestamps, callback, plugin payload.
//! 2. **Type ids:** The base request-type ordinals; device specs may define ids above them.
//! 3. **ReqBuffer:** A bounded, insertion-ordered buffer addressed by stable per-tick indices.

use std::any::Any;
use std::fmt;

/// Simulator clock cycle. `-1` means unset / unconstrained.
pub type Clk = i64;

/// Flat physical address. `-1` when the request was built from an address
/// vector directly.
pub type Addr = i64;

/// Decoded address, one slot per organization level. A `-1` slot broadcasts
/// to every child at that level.
pub type AddrVec = Vec<i64>;

/// Base request-type ordinals.
///
/// A device spec's request table must start with these three in this order;
/// ids beyond them are device-specific (refresh, precharge maintenance, ...).
pub mod req_type {
    /// Read request.
    pub const READ: usize = 0;
    /// Write request.
    pub const WRITE: usize = 1;
    /// Partial write request (sub-block update).
    pub const PARTIAL_WRITE: usize = 2;
}

/// Byte extent of a partial write within its data block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartialSpan {
    /// Byte offset of the updated region.
    pub offset: usize,
    /// Length of the updated region in bytes.
    pub len: usize,
}

/// Completion callback, invoked once when the request finishes.
pub type Callback = Box<dyn FnMut(&Request)>;

/// A single memory request.
///
/// Owned by the front-end until `send` transfers it into a controller
/// buffer; from then on it is uniquely owned by whichever buffer currently
/// holds it, until the final command is issued (reads move to the pending
/// queue; other types are freed on issue).
pub struct Request {
    /// Flat physical address (`-1` if built from an address vector).
    pub addr: Addr,
    /// Decoded address vector.
    pub addr_vec: AddrVec,

    /// Request-type ordinal (see [`req_type`]).
    pub type_id: usize,
    /// Originating core id; `-1` for synthetic (maintenance) requests.
    pub source_id: i64,

    /// The DRAM command this request currently needs, refreshed each time the
    /// scheduler consults the device's prerequisite tables.
    pub command: Option<usize>,
    /// The terminal command that completes the request.
    pub final_command: Option<usize>,

    /// Cycle the request entered the controller (`-1` = not yet enqueued).
    pub arrive: Clk,
    /// Cycle the request leaves the controller (`-1` = unset).
    pub depart: Clk,

    /// Scratch slots reserved for scheduler / policy use.
    pub scratchpad: [i64; 4],

    /// Set on the first cycle the request is serviced, so row hit/miss
    /// classification is counted exactly once.
    pub is_stat_updated: bool,

    /// Completion callback.
    pub callback: Option<Callback>,

    /// Opaque owner-external blob for plugins (e.g. the ECC plugin's data
    /// block for a write).
    pub payload: Option<Box<dyn Any>>,

    /// Byte extent for partial writes; `None` means full block.
    pub partial: Option<PartialSpan>,
}

impl Request {
    /// Creates a request from a flat address.
    pub fn new(addr: Addr, type_id: usize) -> Self {
        Self {
            addr,
            addr_vec: Vec::new(),
            type_id,
            source_id: -1,
            command: None,
            final_command: None,
            arrive: -1,
            depart: -1,
            scratchpad: [0; 4],
            is_stat_updated: false,
            callback: None,
            payload: None,
            partial: None,
        }
    }

    /// Creates a request from a decoded address vector.
    pub fn from_vec(addr_vec: AddrVec, type_id: usize) -> Self {
        let mut req = Self::new(-1, type_id);
        req.addr_vec = addr_vec;
        req
    }

    /// Creates a request with an origin core and completion callback.
    pub fn with_callback(addr: Addr, type_id: usize, source_id: i64, callback: Callback) -> Self {
        let mut req = Self::new(addr, type_id);
        req.source_id = source_id;
        req.callback = Some(callback);
        req
    }

    /// Fires the completion callback, if any. The callback is consumed.
    pub fn complete(&mut self) {
        if let Some(mut cb) = self.callback.take() {
            cb(self);
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("addr", &self.addr)
            .field("addr_vec", &self.addr_vec)
            .field("type_id", &self.type_id)
            .field("source_id", &self.source_id)
            .field("command", &self.command)
            .field("final_command", &self.final_command)
            .field("arrive", &self.arrive)
            .field("depart", &self.depart)
            .finish()
    }
}

/// Bounded request buffer with FCFS insertion order.
///
/// Requests are addressed by index; indices are stable within a tick (the
/// controller only removes after scheduling has finished for the cycle).
pub struct ReqBuffer {
    entries: Vec<Request>,
    max_size: usize,
}

impl ReqBuffer {
    /// Creates a buffer holding at most `max_size` requests.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_size,
        }
    }

    /// Returns the capacity bound.
    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the number of buffered requests.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the buffer holds no requests.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a request. Returns the request back if the buffer is full.
    pub fn enqueue(&mut self, req: Request) -> Result<(), Request> {
        if self.entries.len() < self.max_size {
            self.entries.push(req);
            Ok(())
        } else {
            Err(req)
        }
    }

    /// Removes and returns the request at `idx`, preserving order.
    pub fn remove(&mut self, idx: usize) -> Request {
        self.entries.remove(idx)
    }

    /// Returns the request at `idx`.
    #[inline]
    pub fn get(&self, idx: usize) -> &Request {
        &self.entries[idx]
    }

    /// Returns the request at `idx` mutably.
    #[inline]
    pub fn get_mut(&mut self, idx: usize) -> &mut Request {
        &mut self.entries[idx]
    }

    /// Iterates over buffered requests in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.entries.iter()
    }

    /// Iterates mutably over buffered requests in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Request> {
        self.entries.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_rejects_when_full() {
        let mut buf = ReqBuffer::new(2);
        assert!(buf.enqueue(Request::new(0, req_type::READ)).is_ok());
        assert!(buf.enqueue(Request::new(64, req_type::READ)).is_ok());
        let back = buf.enqueue(Request::new(128, req_type::READ));
        assert!(back.is_err());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn remove_preserves_insertion_order() {
        let mut buf = ReqBuffer::new(8);
        for a in [10, 20, 30] {
            buf.enqueue(Request::new(a, req_type::WRITE)).unwrap();
        }
        let taken = buf.remove(1);
        assert_eq!(taken.addr, 20);
        let addrs: Vec<i64> = buf.iter().map(|r| r.addr).collect();
        assert_eq!(addrs, vec![10, 30]);
    }

    #[test]
    fn callback_fires_once() {
        use std::cell::Cell;
        use std::rc::Rc;

        let fired = Rc::new(Cell::new(0));
        let fired2 = Rc::clone(&fired);
        let mut req = Request::with_callback(
            0,
            req_type::READ,
            0,
            Box::new(move |_| fired2.set(fired2.get() + 1)),
        );
        req.complete();
        req.complete();
        assert_eq!(fired.get(), 1);
    }
}
