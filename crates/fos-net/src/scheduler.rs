//! Request Scheduler
//!
//! Admission control for throttle-eligible outbound requests. The scheduler
//! caps the number of requests in flight globally and per server; callers
//! that are refused simply try again later.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use fos_security::Origin;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::NetError;

/// What a request is for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Terrain,
    Imagery,
    #[default]
    Other,
}

/// Caller-owned description of an outbound request.
///
/// Admission only looks at these fields; it never mutates or keeps the
/// descriptor.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    /// Target URL, used for per-server accounting
    pub url: Option<String>,
    /// Whether the request goes through admission at all
    pub throttle: bool,
    /// Whether the per-server limit applies in addition to the global one
    pub throttle_by_server: bool,
    /// Caller's tag for the request. Admission does not read it and there
    /// are no per-kind limits.
    pub kind: RequestKind,
}

impl RequestDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_url(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    pub fn throttle(mut self, throttle: bool) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn throttle_by_server(mut self, by_server: bool) -> Self {
        self.throttle_by_server = by_server;
        self
    }

    pub fn kind(mut self, kind: RequestKind) -> Self {
        self.kind = kind;
        self
    }

    /// `host:port` of the target, if it has an absolute URL
    pub fn server_key(&self) -> Option<String> {
        let url = Url::parse(self.url.as_deref()?).ok()?;
        url.host_str()?;
        Some(Origin::from_url(&url).server_key())
    }
}

/// Result of an admission check
#[derive(Debug)]
pub enum Admission {
    /// Go ahead. The permit holds the capacity slot until dropped.
    Admitted(Permit),
    /// Do not issue the request right now. Not an error.
    Throttled,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }

    pub fn into_permit(self) -> Option<Permit> {
        match self {
            Admission::Admitted(permit) => Some(permit),
            Admission::Throttled => None,
        }
    }
}

/// Decides whether a throttle-eligible request may be issued now.
pub trait AdmissionGate: Send + Sync {
    fn try_admit(&self, request: &RequestDescriptor) -> Admission;
}

/// Scheduler limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum requests in flight across all servers
    pub maximum_requests: usize,
    /// Maximum requests in flight to one `host:port`
    pub maximum_requests_per_server: usize,
    /// When false every request is admitted
    pub throttle_requests: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            maximum_requests: 50,
            maximum_requests_per_server: 6,
            throttle_requests: true,
        }
    }
}

impl SchedulerConfig {
    /// Parse from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json).map_err(|e| NetError::Config(e.to_string()))
    }

    pub fn maximum_requests(mut self, max: usize) -> Self {
        self.maximum_requests = max;
        self
    }

    pub fn maximum_requests_per_server(mut self, max: usize) -> Self {
        self.maximum_requests_per_server = max;
        self
    }

    pub fn throttle_requests(mut self, enabled: bool) -> Self {
        self.throttle_requests = enabled;
        self
    }
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub active_requests: usize,
    pub admitted_requests: u64,
    pub throttled_requests: u64,
}

#[derive(Debug, Default)]
struct SchedulerState {
    config: SchedulerConfig,
    active: usize,
    active_per_server: HashMap<String, usize>,
    admitted: u64,
    throttled: u64,
}

impl SchedulerState {
    fn release(&mut self, server: Option<&str>) {
        self.active = self.active.saturating_sub(1);
        if let Some(server) = server {
            if let Some(count) = self.active_per_server.get_mut(server) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.active_per_server.remove(server);
                }
            }
        }
    }
}

fn lock(state: &Mutex<SchedulerState>) -> MutexGuard<'_, SchedulerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Capacity slot held by an admitted request.
///
/// Dropping the permit gives the slot back to the scheduler that issued it.
#[derive(Debug)]
pub struct Permit {
    slot: Option<PermitSlot>,
}

#[derive(Debug)]
struct PermitSlot {
    state: Arc<Mutex<SchedulerState>>,
    server: Option<String>,
}

impl Permit {
    /// A permit not backed by any scheduler; for gates without bookkeeping
    pub fn unmetered() -> Self {
        Self { slot: None }
    }

    /// Server this permit counts against, if any
    pub fn server(&self) -> Option<&str> {
        self.slot.as_ref()?.server.as_deref()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            lock(&slot.state).release(slot.server.as_deref());
        }
    }
}

/// Process-wide admission gate with global and per-server limits.
#[derive(Debug, Default)]
pub struct RequestScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl RequestScheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                config,
                ..Default::default()
            })),
        }
    }

    /// Shared scheduler used when no gate is injected
    pub fn global() -> Arc<RequestScheduler> {
        static GLOBAL: OnceLock<Arc<RequestScheduler>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(RequestScheduler::new())).clone()
    }

    pub fn config(&self) -> SchedulerConfig {
        lock(&self.state).config.clone()
    }

    /// Replace the limits. Requests already in flight keep their slots.
    pub fn set_config(&self, config: SchedulerConfig) {
        tracing::debug!(?config, "scheduler limits updated");
        lock(&self.state).config = config;
    }

    pub fn statistics(&self) -> SchedulerStats {
        let state = lock(&self.state);
        SchedulerStats {
            active_requests: state.active,
            admitted_requests: state.admitted,
            throttled_requests: state.throttled,
        }
    }

    /// Requests in flight to one server key
    pub fn active_for_server(&self, server: &str) -> usize {
        lock(&self.state).active_per_server.get(server).copied().unwrap_or(0)
    }
}

impl AdmissionGate for RequestScheduler {
    fn try_admit(&self, request: &RequestDescriptor) -> Admission {
        let server = if request.throttle_by_server {
            request.server_key()
        } else {
            None
        };

        // Check and increment under one lock so concurrent callers
        // never both take the last slot.
        let mut state = lock(&self.state);
        if request.throttle && state.config.throttle_requests {
            let global_full = state.active >= state.config.maximum_requests;
            let server_full = server.as_ref().is_some_and(|key| {
                state.active_per_server.get(key).copied().unwrap_or(0)
                    >= state.config.maximum_requests_per_server
            });

            if global_full || server_full {
                state.throttled += 1;
                tracing::debug!(
                    url = request.url.as_deref().unwrap_or(""),
                    active = state.active,
                    server = server.as_deref().unwrap_or(""),
                    "request throttled"
                );
                return Admission::Throttled;
            }
        }

        state.active += 1;
        state.admitted += 1;
        if let Some(key) = &server {
            *state.active_per_server.entry(key.clone()).or_insert(0) += 1;
        }
        drop(state);

        Admission::Admitted(Permit {
            slot: Some(PermitSlot {
                state: Arc::clone(&self.state),
                server,
            }),
        })
    }
}
