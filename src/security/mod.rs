//! Access-control state module
//!
//! Holds the blacklist, the allowed-hosts whitelist and the security flag as an
//! immutable snapshot behind an `ArcSwap`. Readers load the current snapshot
//! without locking; mutations clone it, apply the change and publish the new
//! snapshot while holding a writer mutex, so concurrent readers always see
//! either the old or the new snapshot in full.

use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use crate::config::SecuritySettings;
use crate::logger;

/// Entry in the form requests are matched against: IP addresses in canonical
/// text (lowercase IPv6, IPv4-mapped as IPv4), anything else trimmed verbatim
pub fn canonical_entry(value: &str) -> String {
    let value = value.trim();
    value
        .parse::<IpAddr>()
        .map_or_else(|_| value.to_string(), |ip| ip.to_canonical().to_string())
}

/// Immutable access-control snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecuritySnapshot {
    pub blacklist: HashSet<String>,
    pub allowed_hosts: HashSet<String>,
    pub enabled: bool,
}

impl SecuritySnapshot {
    pub fn from_settings(settings: &SecuritySettings) -> Self {
        Self {
            blacklist: settings.blacklist.iter().map(|e| canonical_entry(e)).collect(),
            allowed_hosts: settings
                .allowed_hosts
                .iter()
                .map(|e| canonical_entry(e))
                .collect(),
            enabled: settings.enable_security,
        }
    }

    /// Sorted, persistable form of this snapshot
    pub fn to_settings(&self) -> SecuritySettings {
        let mut blacklist: Vec<String> = self.blacklist.iter().cloned().collect();
        let mut allowed_hosts: Vec<String> = self.allowed_hosts.iter().cloned().collect();
        blacklist.sort();
        allowed_hosts.sort();
        SecuritySettings {
            enable_security: self.enabled,
            blacklist,
            allowed_hosts,
        }
    }

    pub fn is_blacklisted(&self, ip: &str) -> bool {
        self.enabled && self.blacklist.contains(ip)
    }

    /// True when no host restriction is configured, or `host` or `ip` is allowed
    pub fn is_host_allowed(&self, host: &str, ip: &str) -> bool {
        self.allowed_hosts.is_empty()
            || self.allowed_hosts.contains(host)
            || self.allowed_hosts.contains(ip)
    }

    fn list_mut(&mut self, list: SecurityList) -> &mut HashSet<String> {
        match list {
            SecurityList::Blacklist => &mut self.blacklist,
            SecurityList::AllowedHosts => &mut self.allowed_hosts,
        }
    }
}

/// Mutation applied to one of the access-control sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Add,
    Remove,
}

/// Which set a mutation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityList {
    Blacklist,
    AllowedHosts,
}

impl fmt::Display for SecurityList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blacklist => f.write_str("blacklist"),
            Self::AllowedHosts => f.write_str("allowed hosts"),
        }
    }
}

/// Durable storage for access-control changes
pub trait SecurityPersistence: Send + Sync {
    fn persist(&self, snapshot: &SecuritySnapshot) -> Result<(), crate::config::PersistError>;
}

/// Shared, concurrently readable access-control store
pub struct SecurityStore {
    current: ArcSwap<SecuritySnapshot>,
    // Serializes writers; readers never touch it
    write_lock: Mutex<()>,
    persistence: Option<Arc<dyn SecurityPersistence>>,
}

impl SecurityStore {
    pub fn new(snapshot: SecuritySnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
            write_lock: Mutex::new(()),
            persistence: None,
        }
    }

    /// Attach the collaborator notified after every mutation
    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn SecurityPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Current snapshot, for reporting and for multi-step checks that must
    /// agree with each other
    pub fn snapshot(&self) -> Arc<SecuritySnapshot> {
        self.current.load_full()
    }

    pub fn is_enabled(&self) -> bool {
        self.current.load().enabled
    }

    pub fn is_blacklisted(&self, ip: &str) -> bool {
        self.current.load().is_blacklisted(ip)
    }

    pub fn is_host_allowed(&self, host: &str, ip: &str) -> bool {
        self.current.load().is_host_allowed(host, ip)
    }

    /// Add or remove `ip` from the blacklist
    pub fn mutate(&self, op: Mutation, ip: &str) -> bool {
        self.mutate_list(SecurityList::Blacklist, op, ip)
    }

    /// Add or remove `host` from the allowed hosts
    pub fn mutate_allowed_hosts(&self, op: Mutation, host: &str) -> bool {
        self.mutate_list(SecurityList::AllowedHosts, op, host)
    }

    /// Publish a new snapshot with `value` added to or removed from `list`.
    ///
    /// Returns whether the set changed. The new snapshot takes effect even if
    /// persisting it fails.
    pub fn mutate_list(&self, list: SecurityList, op: Mutation, value: &str) -> bool {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let value = canonical_entry(value);
        let mut next = SecuritySnapshot::clone(&self.current.load());
        let set = next.list_mut(list);
        let changed = match op {
            Mutation::Add => set.insert(value.clone()),
            Mutation::Remove => set.remove(&value),
        };
        if !changed {
            return false;
        }

        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));

        let action = match op {
            Mutation::Add => "add",
            Mutation::Remove => "remove",
        };
        logger::log_security_mutation(action, &list.to_string(), &value);

        // Persist under the writer lock so the file sees mutations in order
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.persist(&next) {
                logger::log_persist_failure(&e);
            }
        }
        true
    }
}
