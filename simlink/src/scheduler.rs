//! Per-schema sampling cadence.
//!
//! The scheduler is rebuilt from the schema registry each time a connection
//! is established, so every schema is due on the first tick of a session.
//! After a request fires, the next due time is `fire time + interval`. Under
//! sustained loop delay the cadence therefore drifts instead of keeping a
//! fixed phase.

use std::time::{Duration, Instant};

use crate::provider::DefinitionId;
use crate::schema::SchemaDescriptor;

/// Scheduling state for one registered schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerEntry {
    definition: DefinitionId,
    interval: Duration,
    next_sample: Option<Instant>,
    requests: u64,
}

impl SchedulerEntry {
    /// Creates an entry that is due immediately.
    pub fn new(definition: DefinitionId, interval: Duration) -> Self {
        Self {
            definition,
            interval,
            next_sample: None,
            requests: 0,
        }
    }

    /// The definition this entry samples.
    pub fn definition(&self) -> DefinitionId {
        self.definition
    }

    /// When the next request is due, or `None` if due immediately.
    pub fn next_sample(&self) -> Option<Instant> {
        self.next_sample
    }

    /// Requests issued for this entry since the scheduler was built.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Returns `true` if a request should be issued at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_sample.is_none_or(|next| now >= next)
    }

    fn mark_requested(&mut self, fired_at: Instant) {
        self.next_sample = Some(fired_at + self.interval);
        self.requests += 1;
    }
}

/// Decides which schemas need a sample request on each loop tick.
#[derive(Debug, Clone, Default)]
pub struct SamplingScheduler {
    entries: Vec<SchedulerEntry>,
}

impl SamplingScheduler {
    /// Builds one entry per descriptor, in registration order.
    pub fn new(descriptors: &[SchemaDescriptor]) -> Self {
        Self {
            entries: descriptors
                .iter()
                .map(|d| SchedulerEntry::new(d.id(), d.interval()))
                .collect(),
        }
    }

    /// All entries in registration order.
    pub fn entries(&self) -> &[SchedulerEntry] {
        &self.entries
    }

    /// Definitions due at `now`, in registration order.
    pub fn due(&self, now: Instant) -> impl Iterator<Item = DefinitionId> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.is_due(now))
            .map(SchedulerEntry::definition)
    }

    /// Issues `request` for every entry due at `now`.
    ///
    /// Each successful request reschedules its entry to `now + interval`.
    /// Stops at the first failing request and leaves that entry due.
    ///
    /// # Returns
    ///
    /// The number of requests issued.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `request`.
    pub fn poll<E, F>(&mut self, now: Instant, mut request: F) -> Result<usize, E>
    where
        F: FnMut(DefinitionId) -> Result<(), E>,
    {
        let mut issued = 0;
        for entry in self.entries.iter_mut().filter(|e| e.is_due(now)) {
            request(entry.definition)?;
            entry.mark_requested(now);
            issued += 1;
        }
        Ok(issued)
    }
}
