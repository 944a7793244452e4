//! The polling loop.
//!
//! One iteration purges dead connections, updates every cache, flushes
//! outboxes and applies filters. Connections are processed strictly in
//! sequence, in group order; nothing runs concurrently.

use std::time::Duration;

use tokio::time::Instant;

use crate::Result;
use crate::cache::EmailCache;
use crate::connection::ConnectionGroup;
use crate::filter::MessageFilter;

/// Minimum duration of one iteration unless configured otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(4);

/// Connections, their caches and the filters that watch them.
#[derive(Debug)]
pub struct DaemonGroup {
    connections: ConnectionGroup,
    caches: Vec<EmailCache>,
    filters: Vec<MessageFilter>,
}

impl DaemonGroup {
    /// Creates a group with one cache per connection that can be read.
    #[must_use]
    pub fn new(mut connections: ConnectionGroup, filters: Vec<MessageFilter>) -> Self {
        let caches = connections
            .names()
            .into_iter()
            .filter(|name| {
                connections
                    .get_mut(name)
                    .is_some_and(|connection| connection.as_source().is_some())
            })
            .map(EmailCache::new)
            .collect();

        Self {
            connections,
            caches,
            filters,
        }
    }

    /// The connections still in the group.
    #[must_use]
    pub const fn connections(&self) -> &ConnectionGroup {
        &self.connections
    }

    /// Mutable access to the connections, e.g. to queue outgoing mail.
    pub const fn connections_mut(&mut self) -> &mut ConnectionGroup {
        &mut self.connections
    }

    /// Looks up the cache of a connection.
    #[must_use]
    pub fn cache(&self, connection: &str) -> Option<&EmailCache> {
        self.caches
            .iter()
            .find(|cache| cache.connection() == connection)
    }

    /// Every cache, in group order.
    #[must_use]
    pub fn caches(&self) -> &[EmailCache] {
        &self.caches
    }

    /// The filters, in configuration order.
    #[must_use]
    pub fn filters(&self) -> &[MessageFilter] {
        &self.filters
    }

    /// Runs the loop until `max_iterations` iterations are done (`None`:
    /// until no connection is left). Each iteration lasts at least
    /// `interval`; an overrun is not made up for.
    ///
    /// Connections are connected before the first iteration and
    /// disconnected after the last one, also when an action fails.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed filter action, which ends the loop.
    pub async fn run(
        &mut self,
        max_iterations: Option<usize>,
        interval: Duration,
    ) -> Result<usize> {
        let connected = self.connections.connect_all().await;
        tracing::info!(connected, total = self.connections.len(), "Daemon group started");

        let mut iterations = 0;
        let mut last_start: Option<Instant> = None;
        let result = loop {
            if max_iterations.is_some_and(|max| iterations >= max) {
                break Ok(iterations);
            }
            if let Some(start) = last_start {
                tokio::time::sleep_until(start + interval).await;
            }
            last_start = Some(Instant::now());

            self.purge_dead().await;
            if self.connections.is_empty() {
                tracing::warn!("No connection left, stopping");
                break Ok(iterations);
            }

            self.update().await;
            if let Err(e) = self.apply_filters().await {
                tracing::error!(error = %e, "Filter action failed, stopping");
                break Err(e);
            }

            iterations += 1;
            tracing::debug!(iteration = iterations, "Iteration done");
        };

        self.connections.disconnect_all().await;
        tracing::info!(iterations, "Daemon group stopped");
        result
    }

    /// Removes dead connections and their caches.
    pub async fn purge_dead(&mut self) -> Vec<String> {
        let dead = self.connections.purge_dead().await;
        if !dead.is_empty() {
            self.caches
                .retain(|cache| !dead.iter().any(|name| name == cache.connection()));
        }
        dead
    }

    /// Updates every cache, then flushes every outbox. Failures are logged
    /// per connection.
    pub async fn update(&mut self) {
        for cache in &mut self.caches {
            let Some(source) = self
                .connections
                .get_mut(cache.connection())
                .and_then(|connection| connection.as_source())
            else {
                continue;
            };
            if let Err(e) = cache.update(source).await {
                tracing::warn!(connection = %cache.connection(), error = %e, "Cache update failed");
            }
        }

        for name in self.connections.names() {
            let Some(sender) = self
                .connections
                .get_mut(&name)
                .and_then(|connection| connection.as_sender())
            else {
                continue;
            };
            match sender.flush_outbox().await {
                Ok(0) => {}
                Ok(sent) => tracing::info!(connection = %name, sent, "Outbox flushed"),
                Err(e) => tracing::warn!(connection = %name, error = %e, "Outbox flush failed"),
            }
        }
    }

    /// Applies the first matching filter to every message not marked for
    /// deletion. Returns the number of messages acted upon.
    ///
    /// # Errors
    ///
    /// Returns the first failing action's error.
    pub async fn apply_filters(&mut self) -> Result<usize> {
        let mut applied = 0;
        for cache in &self.caches {
            let watching: Vec<&MessageFilter> = self
                .filters
                .iter()
                .filter(|filter| filter.watches(cache.connection()))
                .collect();
            if watching.is_empty() {
                continue;
            }

            for message in cache.messages().filter(|message| !message.is_deleted()) {
                if let Some(filter) = watching.iter().find(|filter| filter.applies_to(message)) {
                    tracing::trace!(
                        filter = %filter.name(),
                        "Matched\n{}",
                        message.render_complete()
                    );
                    filter
                        .apply_unconditionally(message, &mut self.connections)
                        .await?;
                    applied += 1;
                }
            }
        }
        Ok(applied)
    }
}

/// Runs `filters` over `connections` for at most `max_iterations`
/// iterations, pacing at [`DEFAULT_INTERVAL`].
///
/// # Errors
///
/// Returns the error of a failed filter action.
pub async fn run_daemon_group(
    connections: ConnectionGroup,
    filters: Vec<MessageFilter>,
    max_iterations: Option<usize>,
) -> Result<usize> {
    DaemonGroup::new(connections, filters)
        .run(max_iterations, DEFAULT_INTERVAL)
        .await
}
