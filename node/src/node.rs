//! The field node: wires the face, the signature service, the bootstrap
//! state machine and the command dispatcher together.
//!
//! All node state lives in one task. The face posts [`FaceEvent`]s onto a
//! channel; [`IotNode::run`] consumes them alongside the timer queue and the
//! shutdown broadcast. The synchronous entry points ([`IotNode::start`],
//! [`IotNode::handle_face_event`], [`IotNode::fire_due_timers`]) take the
//! current instant explicitly, so tests can drive the node step by step.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use fieldnode_messages::{
    encode_component, CertificateRequestMessage, CERTIFICATE_REQUEST, UPDATE_CAPABILITIES,
};
use fieldnode_network::{Face, FaceEvent};
use fieldnode_security::{SecurityError, SignatureService, TrustPolicy, Verification};
use fieldnode_types::{Data, IdentityCertificate, Interest, Name};

use crate::bootstrap::{
    Bootstrap, BootstrapConfig, BootstrapEvent, BootstrapState, Effect, TimerEvent,
};
use crate::command_table::CommandTable;
use crate::config::NodeConfig;
use crate::dispatcher::{Dispatch, Dispatcher};
use crate::handlers::HandlerRegistry;
use crate::logging::LogLevelHandle;
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;
use crate::timers::TimerQueue;
use crate::tracing_spans::{bootstrap_span, dispatch_span, exchange_span};
use crate::NodeError;

/// Timing of the node's outgoing requests and periodic work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeOptions {
    pub bootstrap: BootstrapConfig,
    pub certificate_request_lifetime: Duration,
    pub capabilities_lifetime: Duration,
    /// Interval for re-reading trust anchors; `None` disables it.
    pub trust_anchor_refresh: Option<Duration>,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            bootstrap: BootstrapConfig::default(),
            certificate_request_lifetime: Duration::from_millis(10_000),
            capabilities_lifetime: Duration::from_millis(3_000),
            trust_anchor_refresh: None,
        }
    }
}

impl From<&NodeConfig> for NodeOptions {
    fn from(config: &NodeConfig) -> Self {
        Self {
            bootstrap: config.bootstrap(),
            certificate_request_lifetime: config.certificate_request_lifetime(),
            capabilities_lifetime: config.capabilities_lifetime(),
            trust_anchor_refresh: config
                .trust_anchor_dir
                .as_ref()
                .map(|_| config.trust_anchor_refresh())
                .filter(|interval| !interval.is_zero()),
        }
    }
}

/// What the setup-complete hook gets to work with.
#[derive(Clone, Debug)]
pub struct ReadyContext {
    pub prefix: Name,
    pub trust_root: Name,
    /// The certificate the node signs with.
    pub certificate_name: Option<Name>,
    pub shutdown: ShutdownController,
}

pub type SetupHook = Box<dyn FnOnce(&ReadyContext) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeTimer {
    Bootstrap(TimerEvent),
    RefreshTrustAnchors,
}

/// Outstanding request kinds, keyed by request name while in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Exchange {
    CertificateRequest,
    Capabilities,
}

impl Exchange {
    fn label(self) -> &'static str {
        match self {
            Self::CertificateRequest => "certificate-request",
            Self::Capabilities => "capabilities",
        }
    }
}

pub struct IotNode<F: Face, K: SignatureService> {
    prefix: Name,
    policy: TrustPolicy,
    face: F,
    signer: K,
    dispatcher: Dispatcher,
    bootstrap: Bootstrap,
    handlers: HandlerRegistry,
    timers: TimerQueue<NodeTimer>,
    in_flight: HashMap<Name, Exchange>,
    on_setup_complete: Option<SetupHook>,
    metrics: Option<NodeMetrics>,
    shutdown: ShutdownController,
    log_level: Option<LogLevelHandle>,
    options: NodeOptions,
    started: bool,
    stopped: bool,
}

impl<F: Face, K: SignatureService> IotNode<F, K> {
    pub fn new(
        prefix: Name,
        policy: TrustPolicy,
        table: CommandTable,
        face: F,
        signer: K,
        options: NodeOptions,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(prefix.clone(), table),
            bootstrap: Bootstrap::new(options.bootstrap.clone()),
            prefix,
            policy,
            face,
            signer,
            handlers: HandlerRegistry::new(),
            timers: TimerQueue::new(),
            in_flight: HashMap::new(),
            on_setup_complete: None,
            metrics: None,
            shutdown: ShutdownController::new(),
            log_level: None,
            options,
            started: false,
            stopped: false,
        }
    }

    pub fn with_metrics(mut self, metrics: NodeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownController) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_log_level_handle(mut self, handle: LogLevelHandle) -> Self {
        self.log_level = Some(handle);
        self
    }

    /// Run `hook` once, when the controller first acknowledges the
    /// capability announcement.
    pub fn on_setup_complete<H>(&mut self, hook: H)
    where
        H: FnOnce(&ReadyContext) + Send + 'static,
    {
        self.on_setup_complete = Some(Box::new(hook));
    }

    pub fn register_handler<H>(&mut self, function_name: impl Into<String>, handler: H)
    where
        H: Fn(&Interest) -> Data + Send + Sync + 'static,
    {
        self.handlers.register(function_name, handler);
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn state(&self) -> BootstrapState {
        self.bootstrap.state()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn face(&self) -> &F {
        &self.face
    }

    pub fn signer(&self) -> &K {
        &self.signer
    }

    pub fn signer_mut(&mut self) -> &mut K {
        &mut self.signer
    }

    pub fn metrics(&self) -> Option<&NodeMetrics> {
        self.metrics.as_ref()
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Change the log filter of the running process.
    pub fn set_log_level(&self, level: &str) -> Result<(), NodeError> {
        match &self.log_level {
            Some(handle) => handle.set_level(level),
            None => Err(NodeError::Logging("logging was not initialised by this node".into())),
        }
    }

    /// Serial number of the board, from `/proc/cpuinfo`.
    pub fn platform_serial() -> Result<String, NodeError> {
        crate::serial::platform_serial()
    }

    /// Register the prefix and begin bootstrapping. Later calls do nothing.
    pub fn start(&mut self, now: Instant) {
        if self.started || self.stopped {
            return;
        }
        self.started = true;
        tracing::info!(
            prefix = %self.prefix,
            trust_root = %self.policy.trust_root_identity(),
            "starting node"
        );
        if let Some(interval) = self.options.trust_anchor_refresh {
            self.timers
                .schedule_after(now, interval, NodeTimer::RefreshTrustAnchors);
        }
        self.publish_state();
        self.drive(BootstrapEvent::Start, now);
    }

    /// Process one event from the face.
    pub fn handle_face_event(&mut self, event: FaceEvent, now: Instant) {
        if self.stopped {
            return;
        }
        match event {
            FaceEvent::PrefixRegistered(prefix) if prefix == self.prefix => {
                tracing::info!(%prefix, "prefix registered");
                let has_root_certificate = self
                    .policy
                    .has_accepted_root_certificate(self.signer.storage());
                self.drive(BootstrapEvent::PrefixRegistered { has_root_certificate }, now);
            }
            FaceEvent::RegisterFailed(prefix) if prefix == self.prefix => {
                tracing::warn!(%prefix, "could not register prefix");
                self.drive(BootstrapEvent::RegistrationFailed, now);
            }
            FaceEvent::PrefixRegistered(prefix) | FaceEvent::RegisterFailed(prefix) => {
                tracing::debug!(%prefix, "registration result for a foreign prefix ignored");
            }
            FaceEvent::Interest(interest) => self.on_interest(interest),
            FaceEvent::Data { interest_name, data } => self.on_response(interest_name, data, now),
            FaceEvent::Timeout { interest_name } => self.on_timeout(interest_name, now),
        }
    }

    /// Fire every timer due at `now`.
    pub fn fire_due_timers(&mut self, now: Instant) {
        for timer in self.timers.pop_due(now) {
            if self.stopped {
                return;
            }
            match timer {
                NodeTimer::Bootstrap(timer) => self.drive(BootstrapEvent::Timer(timer), now),
                NodeTimer::RefreshTrustAnchors => self.refresh_trust_anchors(now),
            }
        }
    }

    /// Run until shutdown is requested or bootstrap fails.
    pub async fn run(
        &mut self,
        mut events: mpsc::UnboundedReceiver<FaceEvent>,
    ) -> Result<(), NodeError> {
        let mut shutdown = self.shutdown.subscribe();
        self.start(Instant::now());

        loop {
            if let BootstrapState::Failed(reason) = self.state() {
                return Err(NodeError::BootstrapFailed(reason));
            }
            if self.stopped || self.shutdown.is_triggered() {
                self.stop();
                return Ok(());
            }

            let deadline = self.timers.next_deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_face_event(event, Instant::now()),
                    None => {
                        tracing::warn!("face closed its event channel");
                        self.stop();
                        return Ok(());
                    }
                },
                _ = sleep_until(deadline) => self.fire_due_timers(Instant::now()),
                _ = shutdown.recv() => {}
            }
        }
    }

    /// Shut the face down and drop all scheduled work.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        tracing::info!("shutting down");
        self.timers.clear();
        self.in_flight.clear();
        self.face.shutdown();
        self.shutdown.shutdown();
    }

    // ── Bootstrap ───────────────────────────────────────────────────────

    fn drive(&mut self, event: BootstrapEvent, now: Instant) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let before = self.bootstrap.state();
            let effects = {
                let _span = bootstrap_span(&before.to_string()).entered();
                self.bootstrap.handle(event)
            };
            if self.bootstrap.state() != before {
                tracing::debug!(
                    from = %before,
                    to = %self.bootstrap.state(),
                    "bootstrap state changed"
                );
                self.publish_state();
            }
            for effect in effects {
                if let Some(follow_up) = self.apply(effect, now) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    /// Carry out one effect. A failed send comes back as the event the
    /// transport would have produced.
    fn apply(&mut self, effect: Effect, now: Instant) -> Option<BootstrapEvent> {
        match effect {
            Effect::RegisterPrefix => match self.face.register_prefix(&self.prefix) {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(error = %e, "prefix registration not sent");
                    Some(BootstrapEvent::RegistrationFailed)
                }
            },
            Effect::SendCertificateRequest => match self.send_certificate_request() {
                Ok(()) => {
                    self.count(|m| &m.certificate_requests_sent);
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "certificate request not sent");
                    Some(BootstrapEvent::CertificateTimedOut)
                }
            },
            Effect::AnnounceCapabilities => match self.announce_capabilities() {
                Ok(()) => {
                    self.count(|m| &m.capability_announcements_sent);
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "capability announcement not sent");
                    Some(BootstrapEvent::CapabilitiesTimedOut)
                }
            },
            Effect::Schedule { delay, timer } => {
                self.timers
                    .schedule_after(now, delay, NodeTimer::Bootstrap(timer));
                None
            }
            Effect::SetupComplete => {
                self.setup_complete();
                None
            }
            Effect::Stop(_) => {
                self.stop();
                None
            }
        }
    }

    fn send_certificate_request(&mut self) -> Result<(), NodeError> {
        let storage = self.signer.storage();
        let identity = storage.default_identity()?;
        let key_name = storage.default_key_name_for_identity(&identity)?;
        let message = CertificateRequestMessage::new(
            &key_name,
            storage.key_type(&key_name)?,
            &storage.public_key(&key_name)?,
        );
        let name = self
            .policy
            .trust_root_identity()
            .clone()
            .append(CERTIFICATE_REQUEST)
            .append(encode_component(&message));
        let interest = Interest::new(name).with_lifetime(self.options.certificate_request_lifetime);
        tracing::info!(key = %key_name, "requesting certificate from trust root");
        self.express_command(interest, Exchange::CertificateRequest)
    }

    fn announce_capabilities(&mut self) -> Result<(), NodeError> {
        let message = self.dispatcher.table().capabilities(&self.prefix);
        let name = self
            .policy
            .trust_root_identity()
            .clone()
            .append(UPDATE_CAPABILITIES)
            .append(encode_component(&message));
        let interest = Interest::new(name).with_lifetime(self.options.capabilities_lifetime);
        tracing::debug!(commands = message.capabilities.len(), "announcing capabilities");
        self.express_command(interest, Exchange::Capabilities)
    }

    fn express_command(
        &mut self,
        mut interest: Interest,
        exchange: Exchange,
    ) -> Result<(), NodeError> {
        self.signer.make_command_interest(&mut interest)?;
        let name = interest.name.clone();
        self.in_flight.insert(name.clone(), exchange);
        if let Err(e) = self.face.express_interest(interest) {
            self.in_flight.remove(&name);
            return Err(e.into());
        }
        Ok(())
    }

    fn on_response(&mut self, interest_name: Name, data: Data, now: Instant) {
        let Some(exchange) = self.in_flight.remove(&interest_name) else {
            tracing::debug!(name = %interest_name, "response for unknown request ignored");
            return;
        };
        let _span = exchange_span(exchange.label(), &interest_name).entered();
        match exchange {
            Exchange::CertificateRequest => {
                let installed = self.install_certificate(&data);
                self.drive(BootstrapEvent::CertificateReceived { installed }, now);
            }
            Exchange::Capabilities => {
                tracing::debug!(name = %data.name, "capabilities acknowledged");
                self.drive(BootstrapEvent::CapabilitiesAcknowledged, now);
            }
        }
    }

    fn on_timeout(&mut self, interest_name: Name, now: Instant) {
        let Some(exchange) = self.in_flight.remove(&interest_name) else {
            return;
        };
        let _span = exchange_span(exchange.label(), &interest_name).entered();
        match exchange {
            Exchange::CertificateRequest => self.drive(BootstrapEvent::CertificateTimedOut, now),
            Exchange::Capabilities => self.drive(BootstrapEvent::CapabilitiesTimedOut, now),
        }
    }

    /// Verify a certificate response and make its certificate the default
    /// for the device key. Returns whether it was installed.
    fn install_certificate(&mut self, data: &Data) -> bool {
        match self.signer.verify_data(data) {
            Ok(Verification::Verified) => {}
            Ok(Verification::Rejected(reason)) => {
                tracing::error!(%reason, "certificate from controller is invalid");
                return false;
            }
            Err(e) => {
                tracing::error!(error = %e, "certificate from controller could not be verified");
                return false;
            }
        }
        match self.store_certificate(data) {
            Ok(name) => {
                tracing::info!(certificate = %name, "received certificate from controller");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "could not import new certificate");
                false
            }
        }
    }

    fn store_certificate(&mut self, data: &Data) -> Result<Name, NodeError> {
        let certificate = IdentityCertificate::wire_decode(&data.content)?;
        let storage = self.signer.storage_mut();
        let identity = storage.default_identity()?;
        let device_key = storage.default_key_name_for_identity(&identity)?;
        if certificate.key_name() != &device_key {
            return Err(NodeError::ForeignCertificate(certificate.name().clone()));
        }
        match storage.add_certificate(&certificate) {
            Ok(()) => {}
            Err(SecurityError::DuplicateCertificate(name)) => {
                // Only a byte-identical copy of the stored certificate is benign.
                let same = storage
                    .certificate(&name)
                    .is_some_and(|stored| stored.data() == certificate.data());
                if !same {
                    return Err(SecurityError::DuplicateCertificate(name).into());
                }
                tracing::debug!(certificate = %name, "certificate already installed");
            }
            Err(e) => return Err(e.into()),
        }
        storage.set_default_certificate_for_key(certificate.name())?;
        Ok(certificate.name().clone())
    }

    fn setup_complete(&mut self) {
        let Some(hook) = self.on_setup_complete.take() else {
            return;
        };
        let context = ReadyContext {
            prefix: self.prefix.clone(),
            trust_root: self.policy.trust_root_identity().clone(),
            certificate_name: self.signer.default_certificate_name().ok(),
            shutdown: self.shutdown.clone(),
        };
        hook(&context);
    }

    fn refresh_trust_anchors(&mut self, now: Instant) {
        match self.signer.refresh_trust_anchors() {
            Ok(count) => tracing::debug!(count, "trust anchors refreshed"),
            Err(e) => tracing::warn!(error = %e, "trust anchor refresh failed"),
        }
        if let Some(interval) = self.options.trust_anchor_refresh {
            self.timers
                .schedule_after(now, interval, NodeTimer::RefreshTrustAnchors);
        }
    }

    // ── Commands ────────────────────────────────────────────────────────

    fn on_interest(&mut self, interest: Interest) {
        let _span = dispatch_span(&interest.name).entered();
        let started = std::time::Instant::now();
        match self
            .dispatcher
            .dispatch(&interest, &mut self.signer, &self.handlers)
        {
            Dispatch::Certificate(wire) => {
                self.count(|m| &m.certificates_served);
                if let Err(e) = self.face.send(&wire) {
                    tracing::warn!(error = %e, "certificate not sent");
                }
            }
            Dispatch::Response { function_name, data } => {
                if let Some(metrics) = &self.metrics {
                    metrics.commands_dispatched.inc();
                    metrics
                        .handler_time_ms
                        .observe(started.elapsed().as_secs_f64() * 1000.0);
                }
                tracing::debug!(function = %function_name, "command handled");
                self.sign_and_send(data);
            }
            Dispatch::Unknown(data) => {
                self.count(|m| &m.unknown_commands);
                self.sign_and_send(data);
            }
            Dispatch::Rejected { .. } => self.count(|m| &m.authorization_rejections),
        }
    }

    fn sign_and_send(&mut self, mut data: Data) {
        let signed = self
            .signer
            .default_certificate_name()
            .and_then(|certificate| self.signer.sign_data(&mut data, &certificate));
        if let Err(e) = signed {
            tracing::warn!(name = %data.name, error = %e, "response not signed");
            return;
        }
        if let Err(e) = self.face.put_data(&data) {
            tracing::warn!(name = %data.name, error = %e, "response not sent");
        }
    }

    // ── Metrics ─────────────────────────────────────────────────────────

    fn count(&self, counter: impl FnOnce(&NodeMetrics) -> &prometheus::IntCounter) {
        if let Some(metrics) = &self.metrics {
            counter(metrics).inc();
        }
    }

    fn publish_state(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.bootstrap_state.set(self.bootstrap.state().code());
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
