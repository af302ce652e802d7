//! Client records and their per-endpoint limiters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::bucket::TokenBucket;
use crate::error::{Result, TollgateError};

/// Endpoint path -> requests-per-second burst limit.
pub type ResourceLimits = BTreeMap<String, u32>;

/// The fields needed to register a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSpec {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Client identifier, the source IP address
    #[serde(default)]
    pub ip: String,
    /// Per-endpoint limits
    #[serde(default)]
    pub resources: ResourceLimits,
}

impl ClientSpec {
    pub fn new(name: impl Into<String>, ip: impl Into<String>, resources: ResourceLimits) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            resources,
        }
    }

    /// Check that every field required for registration is present.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.ip.is_empty() || self.resources.is_empty() {
            return Err(TollgateError::Validation(
                "Name, IP, and Resources are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// A registered client and the limiters it owns.
///
/// The key set of `limiters` always equals the key set of `resources`; both
/// are only ever replaced together.
#[derive(Debug)]
pub(crate) struct Client {
    pub(crate) ip: String,
    pub(crate) name: String,
    pub(crate) resources: ResourceLimits,
    pub(crate) limiters: HashMap<String, Arc<TokenBucket>>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Client {
    /// Build a client with a fresh bucket for every resource.
    pub(crate) fn build(spec: ClientSpec, refill_rate: f64) -> Result<Self> {
        spec.validate()?;
        let limiters = build_limiters(&spec.resources, refill_rate)?;
        let now = Utc::now();

        Ok(Self {
            ip: spec.ip,
            name: spec.name,
            resources: spec.resources,
            limiters,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the name and the whole limiter set.
    ///
    /// Nothing is modified if any limit is invalid.
    pub(crate) fn replace(
        &mut self,
        name: String,
        resources: ResourceLimits,
        refill_rate: f64,
    ) -> Result<()> {
        let limiters = build_limiters(&resources, refill_rate)?;
        self.name = name;
        self.resources = resources;
        self.limiters = limiters;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Get the limiter for an endpoint, if the client is authorized for it.
    pub(crate) fn limiter(&self, endpoint: &str) -> Option<&Arc<TokenBucket>> {
        self.limiters.get(endpoint)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn resources(&self) -> &ResourceLimits {
        &self.resources
    }

    /// Take a read-only snapshot of this client.
    pub(crate) fn record(&self) -> ClientRecord {
        ClientRecord {
            name: self.name.clone(),
            ip: self.ip.clone(),
            resources: self.resources.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Serializable snapshot of a client, without limiter state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub name: String,
    pub ip: String,
    pub resources: ResourceLimits,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn build_limiters(
    resources: &ResourceLimits,
    refill_rate: f64,
) -> Result<HashMap<String, Arc<TokenBucket>>> {
    resources
        .iter()
        .map(|(endpoint, &limit)| {
            let bucket = TokenBucket::new(refill_rate, limit).map_err(|_| {
                TollgateError::Validation(format!(
                    "limit for {} must be a positive integer",
                    endpoint
                ))
            })?;
            Ok((endpoint.clone(), Arc::new(bucket)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(entries: &[(&str, u32)]) -> ResourceLimits {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_spec_requires_all_fields() {
        let full = ClientSpec::new("svc", "10.0.0.1", limits(&[("/a", 1)]));
        assert!(full.validate().is_ok());

        assert!(ClientSpec::new("", "10.0.0.1", limits(&[("/a", 1)])).validate().is_err());
        assert!(ClientSpec::new("svc", "", limits(&[("/a", 1)])).validate().is_err());
        assert!(ClientSpec::new("svc", "10.0.0.1", ResourceLimits::new()).validate().is_err());
    }

    #[test]
    fn test_build_creates_one_limiter_per_resource() {
        let spec = ClientSpec::new("svc", "10.0.0.1", limits(&[("/a", 2), ("/b", 7)]));
        let client = Client::build(spec, 1.0).unwrap();

        assert_eq!(client.limiters.len(), 2);
        assert_eq!(client.limiter("/a").unwrap().burst(), 2);
        assert_eq!(client.limiter("/b").unwrap().burst(), 7);
        assert!(client.limiter("/c").is_none());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let spec = ClientSpec::new("svc", "10.0.0.1", limits(&[("/a", 0)]));
        let err = Client::build(spec, 1.0).unwrap_err();
        assert!(matches!(err, TollgateError::Validation(_)));
    }

    #[test]
    fn test_replace_is_all_or_nothing() {
        let spec = ClientSpec::new("svc", "10.0.0.1", limits(&[("/a", 2)]));
        let mut client = Client::build(spec, 1.0).unwrap();

        let result = client.replace("renamed".to_string(), limits(&[("/b", 1), ("/c", 0)]), 1.0);
        assert!(result.is_err());
        assert_eq!(client.name(), "svc");
        assert!(client.limiter("/a").is_some());
        assert!(client.limiter("/b").is_none());
    }

    #[test]
    fn test_replace_drops_missing_endpoints() {
        let spec = ClientSpec::new("svc", "10.0.0.1", limits(&[("/a", 2), ("/b", 3)]));
        let mut client = Client::build(spec, 1.0).unwrap();

        client.replace("svc".to_string(), limits(&[("/b", 9)]), 1.0).unwrap();
        assert!(client.limiter("/a").is_none());
        assert_eq!(client.limiter("/b").unwrap().burst(), 9);
        assert_eq!(client.resources().len(), 1);
    }

    #[test]
    fn test_record_serializes_without_limiters() {
        let spec = ClientSpec::new("svc", "10.0.0.1", limits(&[("/a", 2)]));
        let client = Client::build(spec, 1.0).unwrap();

        let json = serde_json::to_value(client.record()).unwrap();
        assert_eq!(json["name"], "svc");
        assert_eq!(json["ip"], "10.0.0.1");
        assert_eq!(json["resources"]["/a"], 2);
        assert!(json.get("limiters").is_none());
    }
}
