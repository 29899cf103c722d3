//! End-to-end scenarios for the field node:
//! registration → certificate → capability announcement → command dispatch.
//!
//! The node runs against a `NullFace` that records traffic, and either a
//! scripted `NullSignatureService` or a real `KeyChain`. Time is passed in
//! explicitly, so every retry and grace delay is observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use fieldnode_messages::{
    decode_component, CertificateRequestMessage, UpdateCapabilitiesCommandMessage,
};
use fieldnode_network::FaceEvent;
use fieldnode_node::{
    BootstrapConfig, BootstrapState, CommandDescriptor, CommandTable, Config, FailureReason,
    IotNode, NodeError, NodeMetrics, NodeOptions, ReadyContext,
};
use fieldnode_nullables::{
    certificate_signed_by, certificate_with_version, NullFace, NullSignatureService, Outcome,
    NULL_PUBLIC_KEY,
};
use fieldnode_security::{
    KeyChain, MemoryIdentityStorage, MemoryPrivateKeyStorage, SignatureService, TrustPolicy,
};
use fieldnode_types::{Data, Interest, Name};

type TestNode = IotNode<NullFace, NullSignatureService>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn name(uri: &str) -> Name {
    Name::from_uri(uri).unwrap()
}

fn policy() -> TrustPolicy {
    TrustPolicy::with_controller(name("/home"), &name("controller")).unwrap()
}

fn descriptor(command: &str, function: &str, authorize: bool) -> CommandDescriptor {
    CommandDescriptor {
        name: name(command),
        function_name: function.to_string(),
        keywords: vec![command.to_string()],
        requires_authorization: authorize,
    }
}

fn table() -> CommandTable {
    CommandTable::new(vec![
        descriptor("ping", "doPing", false),
        descriptor("reboot", "doReboot", true),
        descriptor("light", "doLight", false),
        descriptor("light/dim", "doDim", false),
    ])
}

fn options(certificate_max_attempts: u32) -> NodeOptions {
    NodeOptions {
        bootstrap: BootstrapConfig {
            certificate_max_attempts,
            ..BootstrapConfig::default()
        },
        ..NodeOptions::default()
    }
}

fn register_handlers<F, K>(node: &mut IotNode<F, K>)
where
    F: fieldnode_network::Face,
    K: SignatureService,
{
    for (function, reply) in [
        ("doPing", "pong"),
        ("doReboot", "rebooting"),
        ("doLight", "light"),
        ("doDim", "dim"),
    ] {
        node.register_handler(function, move |i: &Interest| {
            Data::new(i.name.clone()).with_content(reply.as_bytes().to_vec())
        });
    }
}

fn new_node(certificate_max_attempts: u32) -> (TestNode, NullFace) {
    let face = NullFace::new();
    let signer = NullSignatureService::with_identity(&name("/home/pi"));
    let mut node = IotNode::new(
        name("/home/pi"),
        policy(),
        table(),
        face.clone(),
        signer,
        options(certificate_max_attempts),
    )
    .with_metrics(NodeMetrics::new().unwrap());
    register_handlers(&mut node);
    (node, face)
}

/// Install a controller-issued certificate for the device key, as if an
/// earlier run had completed bootstrap.
fn certify(signer: &mut NullSignatureService) -> Name {
    let key_name = signer.device_key_name().unwrap();
    let certificate = certificate_signed_by(
        &key_name,
        NULL_PUBLIC_KEY,
        Some(&name("/home/controller/KEY/ksk-1/ID-CERT/1")),
    );
    let storage = signer.storage_mut();
    storage.add_certificate(&certificate).unwrap();
    storage.set_default_certificate_for_key(certificate.name()).unwrap();
    certificate.name().clone()
}

fn registered(node: &mut TestNode, now: Instant) {
    node.start(now);
    let prefix = node.prefix().clone();
    node.handle_face_event(FaceEvent::PrefixRegistered(prefix), now);
}

fn certificate_requests(face: &NullFace) -> Vec<Name> {
    face.expressed_under(&name("/home/controller/certificateRequest"))
}

fn announcements(face: &NullFace) -> Vec<Name> {
    face.expressed_under(&name("/home/controller/updateCapabilities"))
}

fn request(node: &mut TestNode, uri: &str) -> Option<Data> {
    let before = node.face().sent().len();
    node.handle_face_event(FaceEvent::Interest(Interest::new(name(uri))), Instant::now());
    let sent = node.face().sent_data();
    assert!(sent.len() <= before + 1, "at most one response per request");
    (sent.len() > before).then(|| sent[sent.len() - 1].clone())
}

fn locator(data: &Data) -> Name {
    data.signature.as_ref().unwrap().info.key_locator.clone()
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[test]
fn fresh_node_requests_a_certificate_for_its_key() {
    let (mut node, face) = new_node(6);
    let now = Instant::now();
    node.start(now);
    assert_eq!(face.registered_prefixes(), vec![name("/home/pi")]);
    assert_eq!(node.state(), BootstrapState::Unregistered);

    node.handle_face_event(FaceEvent::PrefixRegistered(name("/home/pi")), now);
    assert_eq!(node.state(), BootstrapState::CertificatePending);

    let requests = certificate_requests(&face);
    assert_eq!(requests.len(), 1);
    // trust root, command, payload, then four signature components
    assert_eq!(requests[0].len(), 3 + 1 + 4);
    let message: CertificateRequestMessage = decode_component(requests[0].get(3).unwrap()).unwrap();
    let command = message.command.unwrap();
    let key_name: Name = command.key_name.as_ref().unwrap().into();
    assert_eq!(Some(key_name), node.signer().device_key_name());
    assert_eq!(command.key_bits, NULL_PUBLIC_KEY.0.to_vec());
    assert_eq!(face.expressed()[0].lifetime(), Duration::from_millis(10_000));
}

#[test]
fn certified_node_announces_immediately() {
    let (mut node, face) = new_node(6);
    certify(node.signer_mut());
    registered(&mut node, Instant::now());

    assert_eq!(node.state(), BootstrapState::CapabilitiesPending);
    assert!(certificate_requests(&face).is_empty());
    let announced = announcements(&face);
    assert_eq!(announced.len(), 1);

    let message: UpdateCapabilitiesCommandMessage =
        decode_component(announced[0].get(3).unwrap()).unwrap();
    let prefixes: Vec<Name> = message
        .capabilities
        .iter()
        .map(|c| c.command_prefix.as_ref().unwrap().into())
        .collect();
    assert_eq!(
        prefixes,
        vec![
            name("/home/pi/ping"),
            name("/home/pi/reboot"),
            name("/home/pi/light"),
            name("/home/pi/light/dim")
        ]
    );
    assert!(message.capabilities[1].needs_signature);
}

#[test]
fn certificate_response_installs_and_announces_after_grace() {
    let (mut node, face) = new_node(6);
    let start = Instant::now();
    registered(&mut node, start);

    let request = certificate_requests(&face).remove(0);
    let key_name = node.signer().device_key_name().unwrap();
    let issued = certificate_signed_by(
        &key_name,
        NULL_PUBLIC_KEY,
        Some(&name("/home/controller/KEY/ksk-1/ID-CERT/1")),
    );
    let response = Data::new(request.clone()).with_content(issued.wire_encode().unwrap());
    node.handle_face_event(
        FaceEvent::Data {
            interest_name: request,
            data: response,
        },
        start,
    );

    assert_eq!(node.state(), BootstrapState::CapabilitiesPending);
    assert_eq!(node.signer().default_certificate_name().unwrap(), issued.name().clone());
    assert!(node.policy().has_accepted_root_certificate(node.signer().storage()));

    node.fire_due_timers(start + Duration::from_millis(4_999));
    assert!(announcements(&face).is_empty());
    node.fire_due_timers(start + Duration::from_secs(5));
    assert_eq!(announcements(&face).len(), 1);
    assert_eq!(face.expressed().last().unwrap().lifetime(), Duration::from_millis(3_000));
}

#[test]
fn rejected_certificate_still_announces_but_keeps_trust_state() {
    let (mut node, face) = new_node(6);
    let start = Instant::now();
    registered(&mut node, start);
    let own_certificate = node.signer().default_certificate_name().unwrap();

    node.signer_mut().push_data_outcome(Outcome::Rejected);
    let request = certificate_requests(&face).remove(0);
    let forged = certificate_signed_by(
        &node.signer().device_key_name().unwrap(),
        NULL_PUBLIC_KEY,
        Some(&name("/home/controller/KEY/ksk-1/ID-CERT/1")),
    );
    node.handle_face_event(
        FaceEvent::Data {
            interest_name: request.clone(),
            data: Data::new(request).with_content(forged.wire_encode().unwrap()),
        },
        start,
    );

    assert_eq!(node.state(), BootstrapState::CapabilitiesPending);
    assert_eq!(node.signer().default_certificate_name().unwrap(), own_certificate);
    node.fire_due_timers(start + Duration::from_secs(5));
    assert_eq!(announcements(&face).len(), 1);
}

#[test]
fn certificate_for_another_key_is_not_installed() {
    let (mut node, face) = new_node(6);
    let start = Instant::now();
    registered(&mut node, start);
    let own_certificate = node.signer().default_certificate_name().unwrap();

    let request = certificate_requests(&face).remove(0);
    let foreign = certificate_signed_by(
        &name("/home/other/ksk-9"),
        NULL_PUBLIC_KEY,
        Some(&name("/home/controller/KEY/ksk-1/ID-CERT/1")),
    );
    node.handle_face_event(
        FaceEvent::Data {
            interest_name: request.clone(),
            data: Data::new(request).with_content(foreign.wire_encode().unwrap()),
        },
        start,
    );

    assert_eq!(node.signer().default_certificate_name().unwrap(), own_certificate);
    assert!(node.signer().storage().certificate(foreign.name()).is_none());
    assert_eq!(node.state(), BootstrapState::CapabilitiesPending);
}

#[test]
fn certificate_reusing_a_stored_name_is_not_installed() {
    let (mut node, face) = new_node(6);
    let start = Instant::now();
    registered(&mut node, start);
    let own_certificate = node.signer().default_certificate_name().unwrap();
    let own_version = own_certificate.last().unwrap().to_string_lossy();

    let request = certificate_requests(&face).remove(0);
    let clashing = certificate_with_version(
        &node.signer().device_key_name().unwrap(),
        NULL_PUBLIC_KEY,
        Some(&name("/home/controller/KEY/ksk-1/ID-CERT/1")),
        &own_version,
    );
    assert_eq!(clashing.name(), &own_certificate);
    node.handle_face_event(
        FaceEvent::Data {
            interest_name: request.clone(),
            data: Data::new(request).with_content(clashing.wire_encode().unwrap()),
        },
        start,
    );

    let stored = node.signer().storage().certificate(&own_certificate).unwrap();
    assert_eq!(stored.signer(), Some(&own_certificate));
    assert!(!node.policy().has_accepted_root_certificate(node.signer().storage()));
    assert_eq!(node.state(), BootstrapState::CapabilitiesPending);
}

#[test]
fn identical_certificate_already_stored_is_made_default() {
    let (mut node, face) = new_node(6);
    let start = Instant::now();
    registered(&mut node, start);

    let issued = certificate_signed_by(
        &node.signer().device_key_name().unwrap(),
        NULL_PUBLIC_KEY,
        Some(&name("/home/controller/KEY/ksk-1/ID-CERT/1")),
    );
    node.signer_mut().storage_mut().add_certificate(&issued).unwrap();

    let request = certificate_requests(&face).remove(0);
    node.handle_face_event(
        FaceEvent::Data {
            interest_name: request.clone(),
            data: Data::new(request).with_content(issued.wire_encode().unwrap()),
        },
        start,
    );

    assert_eq!(node.signer().default_certificate_name().unwrap(), issued.name().clone());
    assert!(node.policy().has_accepted_root_certificate(node.signer().storage()));
}

#[test]
fn certificate_retries_stop_at_the_budget() {
    let (mut node, face) = new_node(3);
    let now = Instant::now();
    registered(&mut node, now);

    for _ in 0..10 {
        let Some(outstanding) = certificate_requests(&face).last().cloned() else {
            break;
        };
        node.handle_face_event(FaceEvent::Timeout { interest_name: outstanding }, now);
    }

    let requests = certificate_requests(&face);
    assert_eq!(requests.len(), 3);
    let mut unique = requests.clone();
    unique.dedup();
    assert_eq!(unique.len(), 3, "each retry carries a fresh signature suffix");
    assert_eq!(node.state(), BootstrapState::Failed(FailureReason::CertificateExhausted));
    assert!(node.is_stopped());
    assert!(face.is_closed());
    assert!(node.shutdown_controller().is_triggered());
}

#[test]
fn registration_gives_up_after_five_retries() {
    let (mut node, face) = new_node(6);
    let now = Instant::now();
    node.start(now);
    for _ in 0..5 {
        node.handle_face_event(FaceEvent::RegisterFailed(name("/home/pi")), now);
        assert_eq!(node.state(), BootstrapState::Unregistered);
    }
    assert_eq!(face.registered_prefixes().len(), 6);

    node.handle_face_event(FaceEvent::RegisterFailed(name("/home/pi")), now);
    assert_eq!(node.state(), BootstrapState::Failed(FailureReason::RegistrationExhausted));
    assert_eq!(face.registered_prefixes().len(), 6);
    assert!(face.is_closed());
}

#[test]
fn capability_announcements_retry_every_thirty_seconds_forever() {
    let (mut node, face) = new_node(6);
    certify(node.signer_mut());
    let mut now = Instant::now();
    registered(&mut node, now);

    for round in 1..=20 {
        let outstanding = announcements(&face).last().cloned().unwrap();
        node.handle_face_event(FaceEvent::Timeout { interest_name: outstanding }, now);
        node.fire_due_timers(now + Duration::from_secs(29));
        assert_eq!(announcements(&face).len(), round);
        now += Duration::from_secs(30);
        node.fire_due_timers(now);
        assert_eq!(announcements(&face).len(), round + 1);
    }
    assert_eq!(node.state(), BootstrapState::CapabilitiesPending);
    assert!(!node.is_stopped());
}

#[test]
fn setup_hook_runs_once_on_first_acknowledgment() {
    let (mut node, face) = new_node(6);
    let certificate = certify(node.signer_mut());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen: Arc<Mutex<Option<ReadyContext>>> = Arc::default();
    {
        let calls = calls.clone();
        let seen = seen.clone();
        node.on_setup_complete(move |context| {
            calls.fetch_add(1, Ordering::SeqCst);
            *seen.lock().unwrap() = Some(context.clone());
        });
    }
    let now = Instant::now();
    registered(&mut node, now);

    let announcement = announcements(&face).remove(0);
    let ack = Data::new(announcement.clone());
    node.handle_face_event(
        FaceEvent::Data {
            interest_name: announcement.clone(),
            data: ack.clone(),
        },
        now,
    );
    node.handle_face_event(
        FaceEvent::Data {
            interest_name: announcement,
            data: ack,
        },
        now,
    );

    assert_eq!(node.state(), BootstrapState::Ready);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let context = seen.lock().unwrap().clone().unwrap();
    assert_eq!(context.prefix, name("/home/pi"));
    assert_eq!(context.trust_root, name("/home/controller"));
    assert_eq!(context.certificate_name, Some(certificate));
    assert_eq!(node.metrics().unwrap().bootstrap_state.get(), 3);
}

#[test]
fn late_announcement_timer_after_ready_sends_nothing() {
    let (mut node, face) = new_node(6);
    let start = Instant::now();
    registered(&mut node, start);
    let request = certificate_requests(&face).remove(0);
    let issued = certificate_signed_by(
        &node.signer().device_key_name().unwrap(),
        NULL_PUBLIC_KEY,
        Some(&name("/home/controller/KEY/ksk-1/ID-CERT/1")),
    );
    node.handle_face_event(
        FaceEvent::Data {
            interest_name: request.clone(),
            data: Data::new(request).with_content(issued.wire_encode().unwrap()),
        },
        start,
    );
    node.fire_due_timers(start + Duration::from_secs(5));
    let announcement = announcements(&face).remove(0);
    node.handle_face_event(
        FaceEvent::Data {
            interest_name: announcement.clone(),
            data: Data::new(announcement),
        },
        start + Duration::from_secs(5),
    );
    assert_eq!(node.state(), BootstrapState::Ready);

    node.fire_due_timers(start + Duration::from_secs(600));
    assert_eq!(announcements(&face).len(), 1);
    assert_eq!(node.next_deadline(), None);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[test]
fn first_configured_command_handles_the_request() {
    let (mut node, _face) = new_node(6);
    let response = request(&mut node, "/home/pi/light/dim/40").unwrap();
    assert_eq!(response.content, b"light".to_vec());
    assert_eq!(response.name, name("/home/pi/light/dim/40"));
}

#[test]
fn unknown_command_gets_signed_unknown_response() {
    let (mut node, _face) = new_node(6);
    let device_certificate = node.signer().default_certificate_name().unwrap();
    let response = request(&mut node, "/home/pi/dance").unwrap();
    assert_eq!(response.name, name("/home/pi/dance/unknown"));
    assert_eq!(response.content, b"Unknown command name".to_vec());
    assert_eq!(response.meta_info.freshness_period_ms, Some(1000));
    assert_eq!(locator(&response), device_certificate);
    assert_eq!(node.metrics().unwrap().unknown_commands.get(), 1);
}

#[test]
fn authorized_command_requires_a_verified_signature() {
    let (mut node, _face) = new_node(6);

    node.signer_mut().push_request_outcome(Outcome::Rejected);
    assert!(request(&mut node, "/home/pi/reboot").is_none());

    node.signer_mut().push_request_outcome(Outcome::Verified);
    let response = request(&mut node, "/home/pi/reboot").unwrap();
    assert_eq!(response.content, b"rebooting".to_vec());

    node.signer_mut().push_request_outcome(Outcome::Error);
    let response = request(&mut node, "/home/pi/reboot").unwrap();
    assert_eq!(response.name, name("/home/pi/reboot/unknown"));

    let metrics = node.metrics().unwrap();
    assert_eq!(metrics.authorization_rejections.get(), 1);
    assert_eq!(metrics.commands_dispatched.get(), 1);
    assert_eq!(node.signer().verified_requests().len(), 3);
}

#[test]
fn open_command_skips_verification() {
    let (mut node, _face) = new_node(6);
    node.signer_mut().set_request_outcome(Outcome::Rejected);
    let response = request(&mut node, "/home/pi/ping").unwrap();
    assert_eq!(response.content, b"pong".to_vec());
    assert!(node.signer().verified_requests().is_empty());
}

#[test]
fn stored_certificate_is_served_byte_for_byte() {
    let (mut node, face) = new_node(6);
    let certificate = certify(node.signer_mut());
    let stored = node.signer().storage().certificate(&certificate).unwrap();

    node.handle_face_event(
        FaceEvent::Interest(Interest::new(certificate.clone())),
        Instant::now(),
    );

    let sent = face.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], stored.wire_encode().unwrap());
    let served = face.sent_data().remove(0);
    assert_eq!(locator(&served), name("/home/controller/KEY/ksk-1/ID-CERT/1"));
    assert_eq!(node.metrics().unwrap().certificates_served.get(), 1);
}

#[test]
fn set_log_level_without_logging_is_an_error() {
    let (node, _face) = new_node(6);
    assert!(matches!(node.set_log_level("debug"), Err(NodeError::Logging(_))));
}

// ---------------------------------------------------------------------------
// Configured node with real signatures
// ---------------------------------------------------------------------------

const CONFIG: &str = r#"
    [device]
    environmentPrefix = "/home"
    controllerName = "controller"
    deviceName = "kitchen"

    [[device.command]]
    name = "ping"
    functionName = "doPing"
    keyword = ["ping"]

    [[device.command]]
    name = "reboot"
    functionName = "doReboot"
    authorize = true
"#;

type ChainNode = IotNode<NullFace, KeyChain<MemoryIdentityStorage, MemoryPrivateKeyStorage>>;

fn chain(policy: TrustPolicy) -> KeyChain<MemoryIdentityStorage, MemoryPrivateKeyStorage> {
    KeyChain::new(MemoryIdentityStorage::new(), MemoryPrivateKeyStorage::new(), policy)
}

/// A node configured from TOML whose key chain trusts the returned
/// controller chain.
fn configured() -> (ChainNode, NullFace, KeyChain<MemoryIdentityStorage, MemoryPrivateKeyStorage>) {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let policy = config.trust_policy().unwrap();
    let prefix = config.device_prefix(|| Err(NodeError::SerialNotFound)).unwrap();

    let mut controller = chain(policy.clone());
    let controller_certificate = controller.ensure_identity(&name("/home/controller")).unwrap();
    let anchor = controller.storage().certificate(&controller_certificate).unwrap();

    let mut device = chain(policy.clone());
    device.ensure_identity(&prefix).unwrap();
    device.add_trust_anchor(anchor);

    let face = NullFace::new();
    let mut node = IotNode::new(
        prefix,
        policy,
        config.command_table().unwrap(),
        face.clone(),
        device,
        NodeOptions::from(&config.node),
    );
    register_handlers(&mut node);
    (node, face, controller)
}

fn deliver(node: &mut ChainNode, interest: Interest) -> Option<Data> {
    let before = node.face().sent().len();
    node.handle_face_event(FaceEvent::Interest(interest), Instant::now());
    let sent = node.face().sent_data();
    (sent.len() > before).then(|| sent[sent.len() - 1].clone())
}

#[test]
fn ping_is_answered_and_signed_by_the_device() {
    let (mut node, _face, _controller) = configured();
    let response = deliver(&mut node, Interest::new(name("/home/kitchen/ping"))).unwrap();
    assert_eq!(response.content, b"pong".to_vec());
    assert_eq!(locator(&response), node.signer().default_certificate_name().unwrap());
}

#[test]
fn controller_signed_reboot_is_executed() {
    let (mut node, _face, mut controller) = configured();
    let mut command = Interest::new(name("/home/kitchen/reboot"));
    controller.make_command_interest(&mut command).unwrap();
    let response = deliver(&mut node, command).unwrap();
    assert_eq!(response.content, b"rebooting".to_vec());
}

#[test]
fn reboot_with_invalid_signature_gets_no_response() {
    let (mut node, _face, mut controller) = configured();
    let mut command = Interest::new(name("/home/kitchen/reboot"));
    controller.make_command_interest(&mut command).unwrap();

    // Swap the signature for one made over a different command.
    let mut other = Interest::new(name("/home/kitchen/ping"));
    controller.make_command_interest(&mut other).unwrap();
    let forged_signature = other.name.last().unwrap().clone();
    let mut forged = command.name.prefix(command.name.len() - 1);
    forged.push(forged_signature);

    assert!(deliver(&mut node, Interest::new(forged)).is_none());
}

#[test]
fn replayed_command_gets_no_response() {
    let (mut node, _face, mut controller) = configured();
    let mut command = Interest::new(name("/home/kitchen/reboot"));
    controller.make_command_interest(&mut command).unwrap();
    assert!(deliver(&mut node, command.clone()).is_some());
    assert!(deliver(&mut node, command).is_none());
}

#[tokio::test]
async fn run_returns_when_shutdown_is_triggered() {
    let (mut node, face) = new_node(6);
    let shutdown = node.shutdown_controller().clone();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tx.send(FaceEvent::PrefixRegistered(name("/home/pi"))).unwrap();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.shutdown();
    });
    tokio::time::timeout(Duration::from_secs(5), node.run(rx))
        .await
        .expect("node should stop")
        .expect("clean shutdown");
    stopper.await.unwrap();

    assert_eq!(certificate_requests(&face).len(), 1);
    assert!(face.is_closed());
}

#[tokio::test]
async fn run_reports_bootstrap_failure() {
    let (mut node, face) = new_node(6);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    for _ in 0..6 {
        tx.send(FaceEvent::RegisterFailed(name("/home/pi"))).unwrap();
    }
    let result = tokio::time::timeout(Duration::from_secs(5), node.run(rx))
        .await
        .expect("node should stop");
    assert!(matches!(
        result,
        Err(NodeError::BootstrapFailed(FailureReason::RegistrationExhausted))
    ));
    assert!(face.is_closed());
    drop(tx);
}
