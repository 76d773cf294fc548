//! # Core Types
//!
//! Data structures shared by the discovery half (Consul records, query options,
//! address lists) and the picking half (addresses carrying balancer tags).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Deref;
use std::time::Duration;

/// Consul encodes empty lists and maps as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Node section of a Consul health entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogNode {
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub datacenter: String,
}

/// Service section of a Consul health entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentService {
    #[serde(default, rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub service: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: HashMap<String, String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
}

/// One discovered backend instance, as returned by `/v1/health/service/<name>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceEntry {
    #[serde(default)]
    pub node: CatalogNode,
    #[serde(default)]
    pub service: AgentService,
}

impl ServiceEntry {
    /// Convenience constructor for an instance at `address:port`
    pub fn new<S: Into<String>>(address: S, port: u16) -> Self {
        Self {
            node: CatalogNode::default(),
            service: AgentService {
                address: address.into(),
                port,
                ..AgentService::default()
            },
        }
    }

    /// Attach advertised tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.service.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// The dialable `host:port` of this instance
    ///
    /// Falls back to the node address when the service registered without one.
    pub fn addr(&self) -> String {
        let host = if self.service.address.is_empty() {
            &self.node.address
        } else {
            &self.service.address
        };
        format!("{}:{}", host, self.service.port)
    }
}

/// Options threaded into every blocking query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub near: String,
    pub datacenter: String,
    pub wait_time: Duration,
    pub allow_stale: bool,
    pub require_consistent: bool,
    /// Index observed by the previous query; 0 means "return immediately"
    pub wait_index: u64,
}

/// Metadata returned alongside a query result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryMeta {
    pub last_index: u64,
}

/// A resolved backend address and the tags its instance advertises
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub addr: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Address {
    pub fn new<S: Into<String>>(addr: S) -> Self {
        Self {
            addr: addr.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

/// Canonical address set for one service
///
/// Always sorted by address string with no duplicate addresses. Instances
/// sharing an address have their tags merged, so the list does not depend on
/// the order the backend returned them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressList(Vec<Address>);

impl AddressList {
    pub fn new<I>(addresses: I) -> Self
    where
        I: IntoIterator<Item = Address>,
    {
        let mut merged: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for address in addresses {
            merged.entry(address.addr).or_default().extend(address.tags);
        }

        Self(
            merged
                .into_iter()
                .map(|(addr, tags)| Address {
                    addr,
                    tags: tags.into_iter().collect(),
                })
                .collect(),
        )
    }

    /// Keep at most `limit` addresses; 0 keeps everything
    pub fn truncate(&mut self, limit: usize) {
        if limit > 0 {
            self.0.truncate(limit);
        }
    }

    /// Address strings only, in order
    pub fn addrs(&self) -> Vec<&str> {
        self.0.iter().map(|a| a.addr.as_str()).collect()
    }

    pub fn into_inner(self) -> Vec<Address> {
        self.0
    }
}

impl Deref for AddressList {
    type Target = [Address];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Address> for AddressList {
    fn from_iter<T: IntoIterator<Item = Address>>(iter: T) -> Self {
        Self::new(iter)
    }
}
