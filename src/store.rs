//! Result Store
//!
//! Per-host field mapping read by the template formatter.
//!
//! A store is created for one host, seeded with that host's identity fields,
//! updated as replies arrive, and dropped when the host is done. Stores are
//! never shared between hosts.

use std::collections::BTreeMap;

use crate::host::HostAddr;

pub const FIELD_HOST: &str = "host";
pub const FIELD_PORT: &str = "port";
pub const FIELD_HOSTPORT: &str = "hostport";
pub const FIELD_RESPONSE: &str = "response";

/// Field name → value mapping for a single host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultStore {
    fields: BTreeMap<String, String>,
}

impl ResultStore {
    /// Create a store seeded with `host`, `port`, `hostport` and an empty `response`
    pub fn for_host(addr: &HostAddr) -> Self {
        let mut store = Self::default();
        store.set(FIELD_HOST, addr.host());
        store.set(FIELD_PORT, addr.port_text());
        store.set(FIELD_HOSTPORT, addr.hostport());
        store.set(FIELD_RESPONSE, "");
        store
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Text of the most recent reply
    pub fn response(&self) -> &str {
        self.get(FIELD_RESPONSE).unwrap_or_default()
    }

    pub fn set_response(&mut self, value: impl Into<String>) {
        self.set(FIELD_RESPONSE, value);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Extend<(String, String)> for ResultStore {
    /// Merge decoded fields; existing names are overwritten
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        self.fields.extend(iter);
    }
}
