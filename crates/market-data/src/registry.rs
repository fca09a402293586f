//! In-flight request registry
//!
//! Maps request ids to the ticker and kind they were issued for. Ids start
//! at 1, strictly increase and are never reused within a registry.

use common::{RequestId, RequestKind, Ticker};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::MarketDataError;
use crate::Result;

/// A request currently awaiting its terminal callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub id: RequestId,
    pub ticker: Ticker,
    pub kind: RequestKind,
}

#[derive(Debug)]
pub struct RequestRegistry {
    next_id: AtomicU64,
    records: Mutex<HashMap<RequestId, RequestRecord>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next id and record what it was issued for
    pub fn issue(&self, ticker: &Ticker, kind: RequestKind) -> RequestId {
        let mut records = self.records.lock();
        // Allocated under the lock so ids enter the map in issue order
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        records.insert(
            id,
            RequestRecord {
                id,
                ticker: ticker.clone(),
                kind,
            },
        );
        id
    }

    /// Look up a live request. Unknown or released ids are stale callbacks.
    pub fn resolve(&self, id: RequestId) -> Result<RequestRecord> {
        self.records
            .lock()
            .get(&id)
            .cloned()
            .ok_or(MarketDataError::RequestNotFound(id))
    }

    /// Remove a request. Returns whether it was still live; releasing an
    /// unknown or already released id is a no-op.
    pub fn release(&self, id: RequestId) -> bool {
        self.records.lock().remove(&id).is_some()
    }

    pub fn in_flight(&self) -> usize {
        self.records.lock().len()
    }

    /// Live requests for one ticker, oldest first
    pub fn pending_for(&self, ticker: &Ticker) -> Vec<RequestRecord> {
        let mut pending: Vec<RequestRecord> = self
            .records
            .lock()
            .values()
            .filter(|record| &record.ticker == ticker)
            .cloned()
            .collect();
        pending.sort_by_key(|record| record.id);
        pending
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}
