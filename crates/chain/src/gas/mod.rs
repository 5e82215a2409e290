//! Resource metering for a single transaction.
//!
//! Every ledger, storage and log operation charges a fixed number of units
//! from the schedule. A transaction that runs past its limit aborts with
//! [`HostError::OutOfResources`] and unwinds like any other failure.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut meter = ResourceMeter::new(100_000, GasSchedule::default());
//! meter.charge(meter.schedule().transfer)?;
//! ```

use crate::error::{HostError, HostResult};

/// Unit cost of each metered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSchedule {
    /// Balance, allowance or storage read
    pub storage_read: u64,
    /// Storage write
    pub storage_write: u64,
    /// Ledger transfer (both balance updates)
    pub transfer: u64,
    /// Allowance update
    pub approve: u64,
    /// Emitted log record
    pub log: u64,
    /// Call into another contract
    pub call: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            storage_read: 2_100,
            storage_write: 5_000,
            transfer: 12_000,
            approve: 8_000,
            log: 1_500,
            call: 2_600,
        }
    }
}

/// Running resource counter for one transaction.
#[derive(Debug, Clone)]
pub struct ResourceMeter {
    limit: u64,
    used: u64,
    schedule: GasSchedule,
}

impl ResourceMeter {
    pub fn new(limit: u64, schedule: GasSchedule) -> Self {
        Self {
            limit,
            used: 0,
            schedule,
        }
    }

    /// Charge `units`, failing once the limit is exceeded.
    ///
    /// The counter keeps the overshoot so the error reports what the
    /// operation would have needed.
    pub fn charge(&mut self, units: u64) -> HostResult<()> {
        self.used = self.used.saturating_add(units);
        if self.used > self.limit {
            return Err(HostError::OutOfResources {
                used: self.used,
                limit: self.limit,
            });
        }
        Ok(())
    }

    pub fn schedule(&self) -> &GasSchedule {
        &self.schedule
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}
