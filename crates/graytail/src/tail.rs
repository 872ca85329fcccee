//! Continuous polling ("tail") mode.

use eyre::Result;
use std::time::Duration;

use crate::search::{MessageSource, SearchQuery};
use crate::{Backoff, DedupCache, LogMessage};

/// Polls a message source, suppressing messages already emitted and
/// adapting the delay between polls to the message rate.
pub struct Tailer<S> {
    source: S,
    query: SearchQuery,
    seen: DedupCache,
    backoff: Backoff,
    delay: Duration,
}

impl<S: MessageSource> Tailer<S> {
    /// The dedup cache is sized so a single full search never evicts its
    /// own ids.
    pub fn new(source: S, query: SearchQuery) -> Self {
        let seen = DedupCache::for_limit(query.limit as usize);
        Self::with_parts(source, query, seen, Backoff::default())
    }

    pub fn with_parts(source: S, query: SearchQuery, seen: DedupCache, backoff: Backoff) -> Self {
        Self {
            source,
            query,
            seen,
            delay: backoff.initial(),
            backoff,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs one fetch and returns only the messages not emitted before.
    /// A failed fetch counts as a quiet cycle for the backoff.
    pub fn poll(&mut self) -> Result<Vec<LogMessage>> {
        let fetched = match self.source.fetch_messages(&self.query) {
            Ok(messages) => messages,
            Err(e) => {
                self.delay = self.backoff.next_delay(self.delay, false);
                return Err(e);
            }
        };

        let fresh = self.seen.filter_unseen(fetched);
        self.delay = self.backoff.next_delay(self.delay, !fresh.is_empty());
        Ok(fresh)
    }

    /// One poll cycle without the sleep. Fetch errors are logged and
    /// swallowed, sink errors are returned.
    pub fn step<F>(&mut self, sink: &mut F) -> Result<usize>
    where
        F: FnMut(&LogMessage) -> Result<()>,
    {
        match self.poll() {
            Ok(messages) => {
                for message in &messages {
                    sink(message)?;
                }
                Ok(messages.len())
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), retry_in = ?self.delay, "poll failed");
                Ok(0)
            }
        }
    }

    /// Polls until the sink fails.
    pub fn run<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(&LogMessage) -> Result<()>,
    {
        loop {
            let count = self.step(&mut sink)?;
            tracing::debug!(count, delay = ?self.delay, "poll cycle done");
            std::thread::sleep(self.delay);
        }
    }
}
