//! Index-scoped backend properties
//!
//! Properties arrive as a flat string map. Keys are either scoped to every
//! index (`default.<key>`) or to one index (`<index>.<key>`); the index scope
//! wins. Unscoped keys are accepted as defaults too, so a single-index
//! deployment can simply write `backend = jms`.

use std::collections::BTreeMap;

use super::error::{ConfigError, ConfigResult};

/// Raw, unscoped property map
pub type Properties = BTreeMap<String, String>;

/// Scope prefix applying to every index
pub const DEFAULT_SCOPE: &str = "default";

/// Recognized property keys (relative to an index scope)
pub mod keys {
    /// Backend name: lucene | jms | blackhole | jgroupsMaster | jgroupsSlave | jgroups | registered name
    pub const BACKEND: &str = "backend";

    /// sync (default) | async
    pub const WORKER_EXECUTION: &str = "worker.execution";

    /// Worker pool size for async local execution (default 1)
    pub const THREAD_POOL_SIZE: &str = "worker.threadpool.size";

    /// Worker queue bound for async local execution (default unbounded)
    pub const WORK_QUEUE_SIZE: &str = "worker.workqueue.size";

    /// Destination name for the queue backend
    pub const JMS_QUEUE: &str = "jms.queue";

    /// Publish retries for the queue backend (default 0)
    pub const TRANSPORT_RETRIES: &str = "transport.retries";

    /// Whether cluster forwarding waits for the writer's acknowledgement
    pub const CLUSTER_BLOCK_WAITING_ACK: &str = "cluster.block_waiting_ack";

    /// Acknowledgement timeout in milliseconds (default 20000)
    pub const CLUSTER_MESSAGES_TIMEOUT: &str = "cluster.messages_timeout";
}

/// Properties resolved for a single index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexProperties {
    index_name: String,
    values: BTreeMap<String, String>,
}

impl IndexProperties {
    /// Create properties for `index_name` from already-relative keys
    pub fn new(index_name: impl Into<String>, values: BTreeMap<String, String>) -> Self {
        Self {
            index_name: index_name.into(),
            values,
        }
    }

    /// Empty properties (every option takes its default)
    pub fn empty(index_name: impl Into<String>) -> Self {
        Self::new(index_name, BTreeMap::new())
    }

    /// Resolve the view of `global` seen by `index_name`
    ///
    /// Precedence, lowest first: unscoped keys, `default.` keys, `<index>.` keys.
    pub fn from_global(global: &Properties, index_name: &str) -> Self {
        let default_prefix = format!("{}.", DEFAULT_SCOPE);
        let index_prefix = format!("{}.", index_name);

        let mut unscoped = BTreeMap::new();
        let mut defaults = BTreeMap::new();
        let mut scoped = BTreeMap::new();

        for (key, value) in global {
            if let Some(rest) = key.strip_prefix(&index_prefix) {
                scoped.insert(rest.to_string(), value.clone());
            } else if let Some(rest) = key.strip_prefix(&default_prefix) {
                defaults.insert(rest.to_string(), value.clone());
            } else {
                unscoped.insert(key.clone(), value.clone());
            }
        }

        let mut values = unscoped;
        values.extend(defaults);
        values.extend(scoped);

        Self::new(index_name, values)
    }

    /// Builder-style setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> ConfigResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Some(true)),
                "false" | "no" | "0" => Ok(Some(false)),
                _ => Err(ConfigError::invalid_value(
                    key,
                    raw,
                    "Expected a boolean (true/false)",
                )),
            },
        }
    }

    pub fn get_usize(&self, key: &str) -> ConfigResult<Option<usize>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
                ConfigError::invalid_value(key, raw, "Expected a non-negative integer")
            }),
        }
    }

    /// Like `get_usize` but rejects zero
    pub fn get_positive(&self, key: &str) -> ConfigResult<Option<usize>> {
        match self.get_usize(key)? {
            Some(0) => Err(ConfigError::invalid_value(
                key,
                "0",
                "Expected an integer >= 1",
            )),
            other => Ok(other),
        }
    }

    pub fn get_u64(&self, key: &str) -> ConfigResult<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<u64>().map(Some).map_err(|_| {
                ConfigError::invalid_value(key, raw, "Expected a non-negative integer")
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_index_scope_overrides_default() {
        let props = global(&[
            ("default.backend", "jms"),
            ("books.backend", "blackhole"),
            ("default.worker.execution", "async"),
        ]);

        let books = IndexProperties::from_global(&props, "books");
        assert_eq!(books.get(keys::BACKEND), Some("blackhole"));
        assert_eq!(books.get(keys::WORKER_EXECUTION), Some("async"));

        let authors = IndexProperties::from_global(&props, "authors");
        assert_eq!(authors.get(keys::BACKEND), Some("jms"));
    }

    #[test]
    fn test_unscoped_keys_are_lowest_precedence() {
        let props = global(&[("backend", "jms"), ("default.backend", "lucene")]);
        let view = IndexProperties::from_global(&props, "books");
        assert_eq!(view.get(keys::BACKEND), Some("lucene"));
    }

    #[test]
    fn test_other_index_scope_is_ignored() {
        let props = global(&[("authors.backend", "jms")]);
        let view = IndexProperties::from_global(&props, "books");
        // "authors.backend" is not a default; it stays an unscoped key
        assert_eq!(view.get(keys::BACKEND), None);
    }

    #[test]
    fn test_blank_values_are_absent() {
        let view = IndexProperties::empty("books").with(keys::BACKEND, "   ");
        assert_eq!(view.get(keys::BACKEND), None);
        assert_eq!(view.get_or(keys::BACKEND, "lucene"), "lucene");
    }

    #[test]
    fn test_get_positive_rejects_zero() {
        let view = IndexProperties::empty("books").with(keys::THREAD_POOL_SIZE, "0");
        assert!(view.get_positive(keys::THREAD_POOL_SIZE).is_err());
    }

    #[test]
    fn test_get_bool_rejects_garbage() {
        let view = IndexProperties::empty("books").with(keys::CLUSTER_BLOCK_WAITING_ACK, "maybe");
        assert!(view.get_bool(keys::CLUSTER_BLOCK_WAITING_ACK).is_err());

        let view = IndexProperties::empty("books").with(keys::CLUSTER_BLOCK_WAITING_ACK, "TRUE");
        assert_eq!(view.get_bool(keys::CLUSTER_BLOCK_WAITING_ACK).unwrap(), Some(true));
    }
}
