//! crates/procurement_core/src/ids.rs
//!
//! Human-readable reference numbers (`NREP-{PREFIX}-{YYYY}-{NNN}`), blob ids, and
//! random codes.

use chrono::Datelike;
use rand::Rng;
use std::sync::Arc;

use crate::domain::IdKind;
use crate::ports::{Clock, CounterStore, PortResult};

const DOCUMENT_COUNTER_KEY: &str = "documentID";
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Hands out sequential identifiers backed by a durable [`CounterStore`].
#[derive(Clone)]
pub struct IdGenerator {
    counters: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl IdGenerator {
    pub fn new(counters: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { counters, clock }
    }

    /// Returns the next identifier for `kind`, e.g. `NREP-SPL-2024-001`.
    ///
    /// The counter is never reset, so the numeric part keeps growing across years
    /// and widens past three digits once it exceeds 999.
    pub async fn next_id(&self, kind: IdKind) -> PortResult<String> {
        let counter = self.counters.increment(kind.counter_key()).await?;
        let year = self.clock.now().year();
        Ok(format!("NREP-{}-{}-{:03}", kind.prefix(), year, counter))
    }

    /// Returns a fresh blob id, e.g. `DOC-19102026-154200-0007`.
    pub async fn next_document_id(&self) -> PortResult<String> {
        let counter = self.counters.increment(DOCUMENT_COUNTER_KEY).await?;
        let stamp = self.clock.now().format("%d%m%Y-%H%M%S");
        Ok(format!("DOC-{}-{:04}", stamp, counter))
    }
}

/// `length` independent random decimal digits. Nothing is persisted.
pub fn random_numeric_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// `length` random characters drawn from uppercase letters and digits.
pub fn random_alphanumeric_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())]))
        .collect()
}
