//! Client registry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::bucket::TokenBucket;
use super::client::{Client, ClientRecord, ClientSpec, ResourceLimits};
use crate::error::{Result, TollgateError};

/// Default refill rate for per-endpoint buckets, in tokens per second.
pub const DEFAULT_REFILL_RATE: f64 = 1.0;

/// Why a limiter lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterLookup {
    /// No client is registered under the identifier
    ClientUnknown,
    /// The client has no quota for the endpoint
    EndpointUnauthorized,
}

/// Owns every registered client and, through them, every limiter.
///
/// All operations go through a single lock over the full mapping. Limiter
/// handles returned by [`limiter`](ClientRegistry::limiter) are used after
/// the lock is released; each bucket carries its own lock.
pub struct ClientRegistry {
    /// Clients indexed by IP
    clients: RwLock<HashMap<String, Client>>,
    /// Refill rate given to every new bucket
    refill_rate: f64,
}

impl ClientRegistry {
    /// Create an empty registry with the default refill rate.
    pub fn new() -> Self {
        Self::with_refill_rate(DEFAULT_REFILL_RATE)
    }

    /// Create an empty registry whose buckets refill at `refill_rate`.
    pub fn with_refill_rate(refill_rate: f64) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            refill_rate,
        }
    }

    /// Register a new client.
    ///
    /// Fails with [`TollgateError::ClientExists`] if the IP is taken.
    pub fn register(&self, spec: ClientSpec) -> Result<ClientRecord> {
        spec.validate()?;

        let mut clients = self.clients.write();
        if clients.contains_key(&spec.ip) {
            return Err(TollgateError::ClientExists(spec.ip));
        }

        let client = Client::build(spec, self.refill_rate)?;
        let record = client.record();
        info!(
            client = %record.ip,
            name = %record.name,
            endpoints = record.resources.len(),
            "Client registered"
        );
        clients.insert(record.ip.clone(), client);

        Ok(record)
    }

    /// Register a client, replacing any existing one with the same IP.
    pub fn upsert(&self, spec: ClientSpec) -> Result<ClientRecord> {
        let client = Client::build(spec, self.refill_rate)?;
        let record = client.record();

        let mut clients = self.clients.write();
        let replaced = clients.insert(record.ip.clone(), client).is_some();
        info!(
            client = %record.ip,
            name = %record.name,
            replaced = replaced,
            "Client upserted"
        );

        Ok(record)
    }

    /// Get a snapshot of a client.
    pub fn get(&self, ip: &str) -> Result<ClientRecord> {
        let clients = self.clients.read();
        clients
            .get(ip)
            .map(Client::record)
            .ok_or_else(|| TollgateError::ClientNotFound(ip.to_string()))
    }

    /// Replace a client's name and its whole limiter set.
    ///
    /// Every bucket is rebuilt, so unused quota on endpoints that remain is
    /// discarded along with the endpoints that were dropped.
    pub fn update(&self, ip: &str, name: String, resources: ResourceLimits) -> Result<ClientRecord> {
        if name.is_empty() || resources.is_empty() {
            return Err(TollgateError::Validation(
                "Name or Resources is required".to_string(),
            ));
        }

        let mut clients = self.clients.write();
        let client = clients
            .get_mut(ip)
            .ok_or_else(|| TollgateError::ClientNotFound(ip.to_string()))?;

        client.replace(name, resources, self.refill_rate)?;
        info!(
            client = %ip,
            name = %client.name(),
            endpoints = client.resources().len(),
            "Client updated"
        );

        Ok(client.record())
    }

    /// Delete a client and its limiters.
    pub fn remove(&self, ip: &str) -> Result<ClientRecord> {
        let mut clients = self.clients.write();
        let client = clients
            .remove(ip)
            .ok_or_else(|| TollgateError::ClientNotFound(ip.to_string()))?;

        info!(client = %ip, "Client removed");
        Ok(client.record())
    }

    /// Snapshot every client, ordered by IP.
    pub fn list(&self) -> Vec<ClientRecord> {
        let clients = self.clients.read();
        let mut records: Vec<ClientRecord> = clients.values().map(Client::record).collect();
        records.sort_by(|a, b| a.ip.cmp(&b.ip));
        records
    }

    /// Look up the limiter for a client's endpoint.
    pub fn limiter(
        &self,
        ip: &str,
        endpoint: &str,
    ) -> std::result::Result<Arc<TokenBucket>, LimiterLookup> {
        let clients = self.clients.read();
        let client = clients.get(ip).ok_or(LimiterLookup::ClientUnknown)?;
        let limiter = client
            .limiter(endpoint)
            .cloned()
            .ok_or(LimiterLookup::EndpointUnauthorized)?;

        debug!(client = %ip, endpoint = %endpoint, "Limiter resolved");
        Ok(limiter)
    }

    /// Get the number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the refill rate used for new buckets.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
