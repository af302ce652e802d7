//! Per-request admission decision.
//!
//! A request passes through four checks in a fixed order, each of which can
//! reject it:
//!
//! 1. the global admission queue must have room (the arrival is recorded
//!    even if a later check rejects the request),
//! 2. the caller must be a registered client,
//! 3. the client must hold a quota for the endpoint,
//! 4. that quota must have a token available.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use super::queue::{AdmissionQueue, PendingRequest};
use crate::ratelimit::{ClientRegistry, LimiterLookup};

/// Identity and target of an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    /// Client identifier (source IP)
    pub client: String,
    /// Source port, only used to tag the queue entry
    pub port: u16,
    /// Logical endpoint path
    pub endpoint: String,
}

impl AdmissionRequest {
    pub fn new(client: impl Into<String>, port: u16, endpoint: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            port,
            endpoint: endpoint.into(),
        }
    }
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The admission queue is at capacity
    ServerBusy,
    /// The caller is not a registered client
    ClientUnknown,
    /// The client has no quota for this endpoint
    EndpointUnauthorized,
    /// The client's quota for this endpoint is exhausted
    RateLimited,
}

impl Rejection {
    /// HTTP status code reported for this rejection.
    pub fn status_code(&self) -> u16 {
        match self {
            Rejection::ServerBusy => 503,
            Rejection::ClientUnknown => 400,
            Rejection::EndpointUnauthorized => 400,
            Rejection::RateLimited => 429,
        }
    }

    /// Message reported for this rejection.
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::ServerBusy => "Server busy, try again later",
            Rejection::ClientUnknown => "Client not found",
            Rejection::EndpointUnauthorized => "Endpoint not found for the client",
            Rejection::RateLimited => "Rate limit exceeded",
        }
    }

    /// Whether the caller may succeed by retrying later unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Rejection::ServerBusy | Rejection::RateLimited)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<LimiterLookup> for Rejection {
    fn from(lookup: LimiterLookup) -> Self {
        match lookup {
            LimiterLookup::ClientUnknown => Rejection::ClientUnknown,
            LimiterLookup::EndpointUnauthorized => Rejection::EndpointUnauthorized,
        }
    }
}

/// Composes the admission queue and the client registry into a single
/// allow/deny decision.
///
/// The queue lock and the registry lock are never held together, and the
/// token check runs after the registry lock is released.
#[derive(Clone)]
pub struct AdmissionPipeline {
    queue: Arc<AdmissionQueue>,
    registry: Arc<ClientRegistry>,
}

impl AdmissionPipeline {
    pub fn new(queue: Arc<AdmissionQueue>, registry: Arc<ClientRegistry>) -> Self {
        Self { queue, registry }
    }

    /// Decide whether a request may proceed to its handler.
    pub fn admit(&self, request: &AdmissionRequest) -> Result<(), Rejection> {
        let key = PendingRequest::key_for(&request.client, request.port, &request.endpoint);
        if !self.queue.try_enqueue(key) {
            return self.reject(request, Rejection::ServerBusy);
        }

        let limiter = match self.registry.limiter(&request.client, &request.endpoint) {
            Ok(limiter) => limiter,
            Err(lookup) => return self.reject(request, lookup.into()),
        };

        if !limiter.allow() {
            return self.reject(request, Rejection::RateLimited);
        }

        trace!(
            client = %request.client,
            endpoint = %request.endpoint,
            "Request admitted"
        );
        Ok(())
    }

    /// Get the admission queue.
    pub fn queue(&self) -> &Arc<AdmissionQueue> {
        &self.queue
    }

    /// Get the client registry.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    fn reject(&self, request: &AdmissionRequest, reason: Rejection) -> Result<(), Rejection> {
        debug!(
            client = %request.client,
            endpoint = %request.endpoint,
            reason = ?reason,
            "Request rejected"
        );
        Err(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{ClientSpec, ResourceLimits};
    use std::time::Duration;

    fn limits(entries: &[(&str, u32)]) -> ResourceLimits {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn pipeline(capacity: usize) -> AdmissionPipeline {
        AdmissionPipeline::new(
            Arc::new(AdmissionQueue::new(capacity)),
            Arc::new(ClientRegistry::new()),
        )
    }

    fn register(pipeline: &AdmissionPipeline, ip: &str, entries: &[(&str, u32)]) {
        pipeline
            .registry()
            .register(ClientSpec::new("test-client", ip, limits(entries)))
            .unwrap();
    }

    fn request(ip: &str, endpoint: &str) -> AdmissionRequest {
        AdmissionRequest::new(ip, 40000, endpoint)
    }

    #[test]
    fn test_rejection_mapping() {
        assert_eq!(Rejection::ServerBusy.status_code(), 503);
        assert_eq!(Rejection::ClientUnknown.status_code(), 400);
        assert_eq!(Rejection::EndpointUnauthorized.status_code(), 400);
        assert_eq!(Rejection::RateLimited.status_code(), 429);
        assert_eq!(Rejection::RateLimited.to_string(), "Rate limit exceeded");
        assert!(Rejection::ServerBusy.is_transient());
        assert!(!Rejection::ClientUnknown.is_transient());
    }

    #[test]
    fn test_burst_then_rate_limited() {
        let pipeline = pipeline(50);
        register(&pipeline, "127.0.0.1", &[("/a", 2)]);

        let outcomes: Vec<_> = (0..3)
            .map(|_| pipeline.admit(&request("127.0.0.1", "/a")))
            .collect();

        assert_eq!(outcomes, vec![Ok(()), Ok(()), Err(Rejection::RateLimited)]);
    }

    #[test]
    fn test_unknown_client_rejected() {
        let pipeline = pipeline(50);
        register(&pipeline, "127.0.0.1", &[("/a", 2)]);

        assert_eq!(
            pipeline.admit(&request("10.1.1.1", "/a")),
            Err(Rejection::ClientUnknown)
        );
    }

    #[test]
    fn test_unauthorized_endpoint_rejected() {
        let pipeline = pipeline(50);
        register(&pipeline, "127.0.0.1", &[("/a", 2)]);

        assert_eq!(
            pipeline.admit(&request("127.0.0.1", "/b")),
            Err(Rejection::EndpointUnauthorized)
        );
    }

    #[test]
    fn test_unregistered_pairs_never_consume_quota() {
        let pipeline = pipeline(50);
        register(&pipeline, "127.0.0.1", &[("/a", 1)]);
        register(&pipeline, "127.0.0.2", &[("/b", 1)]);

        for _ in 0..5 {
            assert_eq!(
                pipeline.admit(&request("127.0.0.1", "/b")),
                Err(Rejection::EndpointUnauthorized)
            );
            assert_eq!(
                pipeline.admit(&request("127.0.0.3", "/a")),
                Err(Rejection::ClientUnknown)
            );
        }

        // The registered pairs still have their full quota
        assert_eq!(pipeline.admit(&request("127.0.0.1", "/a")), Ok(()));
        assert_eq!(pipeline.admit(&request("127.0.0.2", "/b")), Ok(()));
    }

    #[test]
    fn test_queue_full_rejects_before_client_lookup() {
        let pipeline = pipeline(1);
        register(&pipeline, "127.0.0.1", &[("/a", 5)]);

        assert_eq!(pipeline.admit(&request("127.0.0.1", "/a")), Ok(()));
        // Even an unknown client sees ServerBusy once the queue is full
        assert_eq!(
            pipeline.admit(&request("10.9.9.9", "/zzz")),
            Err(Rejection::ServerBusy)
        );
        assert_eq!(
            pipeline.admit(&request("127.0.0.1", "/a")),
            Err(Rejection::ServerBusy)
        );
    }

    #[test]
    fn test_denied_requests_still_occupy_queue() {
        let pipeline = pipeline(3);

        for _ in 0..3 {
            assert_eq!(
                pipeline.admit(&request("10.0.0.1", "/a")),
                Err(Rejection::ClientUnknown)
            );
        }
        assert_eq!(pipeline.queue().len(), 3);
        assert_eq!(
            pipeline.admit(&request("10.0.0.1", "/a")),
            Err(Rejection::ServerBusy)
        );
    }

    #[test]
    fn test_concurrent_requests_with_ceiling_of_one() {
        let pipeline = pipeline(1);
        register(&pipeline, "127.0.0.1", &[("/a", 10)]);
        register(&pipeline, "127.0.0.2", &[("/b", 10)]);

        let handles: Vec<_> = [("127.0.0.1", "/a"), ("127.0.0.2", "/b")]
            .into_iter()
            .map(|(ip, endpoint)| {
                let pipeline = pipeline.clone();
                std::thread::spawn(move || pipeline.admit(&request(ip, endpoint)))
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let busy = outcomes
            .iter()
            .filter(|o| **o == Err(Rejection::ServerBusy))
            .count();
        assert_eq!(busy, 1);
        assert!(outcomes.contains(&Ok(())));
    }

    #[test]
    fn test_update_discards_previous_burst() {
        let pipeline = pipeline(50);
        register(&pipeline, "127.0.0.1", &[("/a", 5)]);

        pipeline
            .registry()
            .update("127.0.0.1", "test-client".to_string(), limits(&[("/a", 1)]))
            .unwrap();

        assert_eq!(pipeline.admit(&request("127.0.0.1", "/a")), Ok(()));
        assert_eq!(
            pipeline.admit(&request("127.0.0.1", "/a")),
            Err(Rejection::RateLimited)
        );
    }

    #[test]
    fn test_deleted_client_is_unknown() {
        let pipeline = pipeline(50);
        register(&pipeline, "127.0.0.1", &[("/a", 5)]);
        assert_eq!(pipeline.admit(&request("127.0.0.1", "/a")), Ok(()));

        pipeline.registry().remove("127.0.0.1").unwrap();
        assert_eq!(
            pipeline.admit(&request("127.0.0.1", "/a")),
            Err(Rejection::ClientUnknown)
        );
    }

    #[test]
    fn test_quota_recovers_after_refill() {
        let pipeline = AdmissionPipeline::new(
            Arc::new(AdmissionQueue::new(50)),
            Arc::new(ClientRegistry::with_refill_rate(20.0)),
        );
        register(&pipeline, "127.0.0.1", &[("/a", 1)]);

        assert_eq!(pipeline.admit(&request("127.0.0.1", "/a")), Ok(()));
        assert_eq!(
            pipeline.admit(&request("127.0.0.1", "/a")),
            Err(Rejection::RateLimited)
        );

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(pipeline.admit(&request("127.0.0.1", "/a")), Ok(()));
    }

    #[test]
    fn test_queue_entry_tagged_with_address_and_path() {
        let pipeline = pipeline(5);
        let _ = pipeline.admit(&AdmissionRequest::new("127.0.0.1", 5123, "/api/resource1"));

        let entries = pipeline.queue().snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "127.0.0.1:5123/api/resource1");
    }
}
