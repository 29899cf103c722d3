//! Bootstrap state machine.
//!
//! A node joining its environment goes through four steps:
//! 1. Register its prefix with the forwarder
//! 2. Obtain a certificate signed by the trust root (skipped when one is
//!    already installed)
//! 3. Announce its commands to the controller
//! 4. Hand over to application code once the controller acknowledges
//!
//! [`Bootstrap`] holds the state and the retry bookkeeping of every step.
//! It performs no I/O: each [`BootstrapEvent`] yields the [`Effect`]s the
//! node must carry out, so every transition can be tested without a
//! transport. Events that no longer apply to the current state (a late
//! timeout, a timer scheduled before the state moved on) are ignored.

use std::fmt;
use std::time::Duration;

use crate::pending::{AttemptLimit, PendingOperation};

/// Prefix registration attempts: the first one plus five retries.
pub const REGISTRATION_ATTEMPTS: u32 = 6;

/// Certificate requests sent before giving up: the first one plus six
/// retries.
pub const DEFAULT_CERTIFICATE_ATTEMPTS: u32 = 7;

/// Upper bound for the configurable certificate attempt budget.
pub const MAX_CERTIFICATE_ATTEMPTS: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Certificate requests sent before giving up, clamped to
    /// `1..=MAX_CERTIFICATE_ATTEMPTS`.
    pub certificate_max_attempts: u32,
    pub certificate_retry_delay: Duration,
    pub registration_retry_delay: Duration,
    /// Wait between a certificate response and the capability announcement.
    pub grace_delay: Duration,
    pub capabilities_retry_delay: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            certificate_max_attempts: DEFAULT_CERTIFICATE_ATTEMPTS,
            certificate_retry_delay: Duration::ZERO,
            registration_retry_delay: Duration::ZERO,
            grace_delay: Duration::from_secs(5),
            capabilities_retry_delay: Duration::from_secs(30),
        }
    }
}

/// Why bootstrap gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    RegistrationExhausted,
    CertificateExhausted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistrationExhausted => f.write_str("prefix registration attempts exhausted"),
            Self::CertificateExhausted => {
                f.write_str("trust root unreachable, certificate attempts exhausted")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapState {
    Unregistered,
    CertificatePending,
    CapabilitiesPending,
    Ready,
    Failed(FailureReason),
}

impl BootstrapState {
    /// Numeric form for the state gauge.
    pub fn code(&self) -> i64 {
        match self {
            Self::Unregistered => 0,
            Self::CertificatePending => 1,
            Self::CapabilitiesPending => 2,
            Self::Ready => 3,
            Self::Failed(_) => -1,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed(_))
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => f.write_str("unregistered"),
            Self::CertificatePending => f.write_str("certificate-pending"),
            Self::CapabilitiesPending => f.write_str("capabilities-pending"),
            Self::Ready => f.write_str("ready"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Timers the state machine asks the node to schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    RetryRegistration,
    RetryCertificateRequest,
    AnnounceCapabilities,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapEvent {
    Start,
    PrefixRegistered { has_root_certificate: bool },
    RegistrationFailed,
    /// A response to the certificate request arrived; `installed` tells
    /// whether it verified and was stored.
    CertificateReceived { installed: bool },
    CertificateTimedOut,
    CapabilitiesAcknowledged,
    CapabilitiesTimedOut,
    Timer(TimerEvent),
}

/// Work the node performs on behalf of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    RegisterPrefix,
    SendCertificateRequest,
    AnnounceCapabilities,
    Schedule { delay: Duration, timer: TimerEvent },
    /// Bootstrap finished; run the application hook.
    SetupComplete,
    /// Fatal failure; stop the node.
    Stop(FailureReason),
}

#[derive(Clone, Debug)]
pub struct Bootstrap {
    state: BootstrapState,
    config: BootstrapConfig,
    registration: Option<PendingOperation>,
    certificate: Option<PendingOperation>,
    capabilities: Option<PendingOperation>,
}

impl Bootstrap {
    pub fn new(config: BootstrapConfig) -> Self {
        let registration = PendingOperation::new(
            AttemptLimit::Bounded(REGISTRATION_ATTEMPTS),
            config.registration_retry_delay,
        );
        Self {
            state: BootstrapState::Unregistered,
            config,
            registration: Some(registration),
            certificate: None,
            capabilities: None,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Certificate requests sent in the current certificate phase.
    pub fn certificate_attempts(&self) -> u32 {
        self.certificate.as_ref().map_or(0, PendingOperation::attempts)
    }

    /// Capability announcements sent so far.
    pub fn capability_attempts(&self) -> u32 {
        self.capabilities.as_ref().map_or(0, PendingOperation::attempts)
    }

    pub fn handle(&mut self, event: BootstrapEvent) -> Vec<Effect> {
        use BootstrapEvent as E;
        use BootstrapState as S;

        match (self.state, event) {
            (S::Ready | S::Failed(_), _) => Vec::new(),

            (S::Unregistered, E::Start) => self.register(),
            (S::Unregistered, E::Timer(TimerEvent::RetryRegistration)) => {
                fire_retry(self.registration.as_mut(), Effect::RegisterPrefix)
            }
            (S::Unregistered, E::PrefixRegistered { has_root_certificate }) => {
                self.registration = None;
                if has_root_certificate {
                    tracing::info!("already certified by the trust root");
                    self.enter_capabilities_pending();
                    self.announce()
                } else {
                    self.enter_certificate_pending()
                }
            }
            (S::Unregistered, E::RegistrationFailed) => self.retry_registration(),

            (S::CertificatePending, E::CertificateReceived { installed }) => {
                if !installed {
                    tracing::debug!("announcing capabilities despite rejected certificate");
                }
                self.certificate = None;
                self.enter_capabilities_pending();
                vec![Effect::Schedule {
                    delay: self.config.grace_delay,
                    timer: TimerEvent::AnnounceCapabilities,
                }]
            }
            (S::CertificatePending, E::CertificateTimedOut) => self.retry_certificate(),
            (S::CertificatePending, E::Timer(TimerEvent::RetryCertificateRequest)) => {
                fire_retry(self.certificate.as_mut(), Effect::SendCertificateRequest)
            }

            (S::CapabilitiesPending, E::CapabilitiesAcknowledged) => {
                self.capabilities = None;
                self.state = S::Ready;
                tracing::info!("controller acknowledged capabilities, setup complete");
                vec![Effect::SetupComplete]
            }
            (S::CapabilitiesPending, E::CapabilitiesTimedOut) => {
                let delay = self.config.capabilities_retry_delay;
                tracing::info!(retry_in = ?delay, "timeout waiting for capabilities update");
                vec![Effect::Schedule {
                    delay,
                    timer: TimerEvent::AnnounceCapabilities,
                }]
            }
            (S::CapabilitiesPending, E::Timer(TimerEvent::AnnounceCapabilities)) => self.announce(),

            (state, event) => {
                tracing::trace!(%state, ?event, "ignoring stale bootstrap event");
                Vec::new()
            }
        }
    }

    fn register(&mut self) -> Vec<Effect> {
        match self.registration.as_mut() {
            Some(op) if op.attempts() == 0 => {
                if op.record_attempt() {
                    vec![Effect::RegisterPrefix]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    fn retry_registration(&mut self) -> Vec<Effect> {
        let Some(op) = self.registration.as_mut() else {
            return Vec::new();
        };
        if !op.record_attempt() {
            return self.fail(FailureReason::RegistrationExhausted);
        }
        let retries = op.attempts() - 1;
        tracing::warn!(
            retry = retries,
            of = REGISTRATION_ATTEMPTS - 1,
            "prefix registration failed, retrying"
        );
        retry_effect(op, Effect::RegisterPrefix, TimerEvent::RetryRegistration)
    }

    fn enter_certificate_pending(&mut self) -> Vec<Effect> {
        let max = self
            .config
            .certificate_max_attempts
            .clamp(1, MAX_CERTIFICATE_ATTEMPTS);
        let mut op = PendingOperation::new(
            AttemptLimit::Bounded(max),
            self.config.certificate_retry_delay,
        );
        op.record_attempt();
        self.certificate = Some(op);
        self.state = BootstrapState::CertificatePending;
        vec![Effect::SendCertificateRequest]
    }

    fn retry_certificate(&mut self) -> Vec<Effect> {
        let Some(op) = self.certificate.as_mut() else {
            return Vec::new();
        };
        if !op.record_attempt() {
            return self.fail(FailureReason::CertificateExhausted);
        }
        let remaining = op.remaining().unwrap_or(u32::MAX);
        let attempt = op.attempts();
        if remaining <= 1 {
            tracing::warn!(attempt, remaining, "timed out waiting for certificate, retrying");
        } else {
            tracing::info!(attempt, remaining, "timed out waiting for certificate, retrying");
        }
        retry_effect(op, Effect::SendCertificateRequest, TimerEvent::RetryCertificateRequest)
    }

    fn enter_capabilities_pending(&mut self) {
        self.capabilities = Some(PendingOperation::new(
            AttemptLimit::Unbounded,
            self.config.capabilities_retry_delay,
        ));
        self.state = BootstrapState::CapabilitiesPending;
    }

    fn announce(&mut self) -> Vec<Effect> {
        match self.capabilities.as_mut() {
            Some(op) => {
                if op.record_attempt() {
                    vec![Effect::AnnounceCapabilities]
                } else {
                    Vec::new()
                }
            }
            None => Vec::new(),
        }
    }

    fn fail(&mut self, reason: FailureReason) -> Vec<Effect> {
        self.registration = None;
        self.certificate = None;
        self.capabilities = None;
        self.state = BootstrapState::Failed(reason);
        tracing::error!(%reason, "bootstrap failed, stopping node");
        vec![Effect::Stop(reason)]
    }
}

/// Retry at once, or arm `op` and schedule `later`. The attempt itself is
/// already recorded.
fn retry_effect(op: &mut PendingOperation, now: Effect, later: TimerEvent) -> Vec<Effect> {
    let delay = op.retry_delay();
    if delay.is_zero() {
        vec![now]
    } else {
        op.arm_retry();
        vec![Effect::Schedule { delay, timer: later }]
    }
}

/// Honour a retry timer only when `op` armed one.
fn fire_retry(op: Option<&mut PendingOperation>, effect: Effect) -> Vec<Effect> {
    match op {
        Some(op) if op.retry_armed() => {
            op.take_retry();
            vec![effect]
        }
        _ => {
            tracing::trace!(?effect, "ignoring unarmed retry timer");
            Vec::new()
        }
    }
}
