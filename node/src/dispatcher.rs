//! Routing of incoming requests to certificates, handlers, or the
//! unknown-command response.

use std::time::Duration;

use fieldnode_security::{SignatureService, Verification};
use fieldnode_types::{Data, Interest, Name};

use crate::command_table::CommandTable;
use crate::handlers::HandlerRegistry;

pub const UNKNOWN_COMMAND_CONTENT: &[u8] = b"Unknown command name";

pub const UNKNOWN_COMMAND_FRESHNESS: Duration = Duration::from_millis(1000);

/// What the node should do with a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Send these certificate bytes exactly as stored.
    Certificate(Vec<u8>),
    /// Sign and send a handler's response.
    Response { function_name: String, data: Data },
    /// Sign and send the unknown-command response.
    Unknown(Data),
    /// Send nothing; the request failed authorization.
    Rejected { reason: String },
}

/// The standard reply to a request no command serves.
pub fn unknown_command_response(request: &Interest) -> Data {
    Data::new(request.name.clone().append("unknown"))
        .with_content(UNKNOWN_COMMAND_CONTENT)
        .with_freshness(UNKNOWN_COMMAND_FRESHNESS)
}

#[derive(Clone, Debug)]
pub struct Dispatcher {
    device_prefix: Name,
    table: CommandTable,
}

impl Dispatcher {
    pub fn new(device_prefix: Name, table: CommandTable) -> Self {
        Self { device_prefix, table }
    }

    pub fn device_prefix(&self) -> &Name {
        &self.device_prefix
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Resolve `request`. A stored certificate with exactly the request's
    /// name wins; otherwise the first matching command, gated by
    /// `verify_request` when it requires authorization.
    pub fn dispatch<K>(
        &self,
        request: &Interest,
        signer: &mut K,
        handlers: &HandlerRegistry,
    ) -> Dispatch
    where
        K: SignatureService + ?Sized,
    {
        if let Some(certificate) = signer.storage().certificate(&request.name) {
            match certificate.wire_encode() {
                Ok(wire) => return Dispatch::Certificate(wire),
                Err(e) => tracing::warn!(
                    name = %request.name,
                    error = %e,
                    "stored certificate does not encode"
                ),
            }
        }

        let Some(descriptor) = self.table.find(&self.device_prefix, &request.name) else {
            tracing::debug!(name = %request.name, "no command matches");
            return Dispatch::Unknown(unknown_command_response(request));
        };
        let Some(handler) = handlers.get(&descriptor.function_name) else {
            tracing::warn!(
                name = %request.name,
                function = %descriptor.function_name,
                "command has no registered handler"
            );
            return Dispatch::Unknown(unknown_command_response(request));
        };

        if descriptor.requires_authorization {
            match signer.verify_request(request) {
                Ok(Verification::Verified) => {}
                Ok(Verification::Rejected(reason)) => {
                    tracing::info!(name = %request.name, %reason, "unauthorized command ignored");
                    return Dispatch::Rejected { reason };
                }
                Err(e) => {
                    tracing::debug!(
                        name = %request.name,
                        error = %e,
                        "command signature unreadable"
                    );
                    return Dispatch::Unknown(unknown_command_response(request));
                }
            }
        }

        Dispatch::Response {
            function_name: descriptor.function_name.clone(),
            data: handler(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_table::CommandDescriptor;
    use fieldnode_nullables::{
        certificate_signed_by, NullSignatureService, Outcome, NULL_PUBLIC_KEY,
    };

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn descriptor(command: &str, function: &str, authorize: bool) -> CommandDescriptor {
        CommandDescriptor {
            name: name(command),
            function_name: function.to_string(),
            keywords: Vec::new(),
            requires_authorization: authorize,
        }
    }

    fn setup() -> (Dispatcher, NullSignatureService, HandlerRegistry) {
        let table = CommandTable::new(vec![
            descriptor("ping", "doPing", false),
            descriptor("reboot", "doReboot", true),
            descriptor("missing", "doMissing", false),
        ]);
        let mut handlers = HandlerRegistry::new();
        handlers.register("doPing", |i: &Interest| {
            Data::new(i.name.clone()).with_content(b"pong".to_vec())
        });
        handlers.register("doReboot", |i: &Interest| {
            Data::new(i.name.clone()).with_content(b"ok".to_vec())
        });
        (
            Dispatcher::new(name("/home/pi"), table),
            NullSignatureService::with_identity(&name("/home/pi")),
            handlers,
        )
    }

    #[test]
    fn unknown_response_shape() {
        let data = unknown_command_response(&Interest::new(name("/home/pi/dance")));
        assert_eq!(data.name, name("/home/pi/dance/unknown"));
        assert_eq!(data.content, UNKNOWN_COMMAND_CONTENT.to_vec());
        assert_eq!(data.meta_info.freshness_period_ms, Some(1000));
    }

    #[test]
    fn open_command_runs_handler() {
        let (dispatcher, mut signer, handlers) = setup();
        let request = Interest::new(name("/home/pi/ping/1"));
        match dispatcher.dispatch(&request, &mut signer, &handlers) {
            Dispatch::Response { function_name, data } => {
                assert_eq!(function_name, "doPing");
                assert_eq!(data.content, b"pong".to_vec());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(signer.verified_requests().is_empty());
    }

    #[test]
    fn unmatched_and_unregistered_are_unknown() {
        let (dispatcher, mut signer, handlers) = setup();
        for uri in ["/home/pi/dance", "/home/pi/missing"] {
            let request = Interest::new(name(uri));
            assert!(matches!(
                dispatcher.dispatch(&request, &mut signer, &handlers),
                Dispatch::Unknown(_)
            ));
        }
    }

    #[test]
    fn authorization_outcomes() {
        let (dispatcher, mut signer, handlers) = setup();
        let request = Interest::new(name("/home/pi/reboot"));

        signer.push_request_outcome(Outcome::Verified);
        signer.push_request_outcome(Outcome::Rejected);
        signer.push_request_outcome(Outcome::Error);

        assert!(matches!(
            dispatcher.dispatch(&request, &mut signer, &handlers),
            Dispatch::Response { .. }
        ));
        assert!(matches!(
            dispatcher.dispatch(&request, &mut signer, &handlers),
            Dispatch::Rejected { .. }
        ));
        assert!(matches!(
            dispatcher.dispatch(&request, &mut signer, &handlers),
            Dispatch::Unknown(_)
        ));
        assert_eq!(signer.verified_requests().len(), 3);
    }

    #[test]
    fn stored_certificate_is_served_verbatim() {
        let (dispatcher, mut signer, handlers) = setup();
        let certificate = certificate_signed_by(
            &name("/home/pi/ksk-2"),
            NULL_PUBLIC_KEY,
            Some(&name("/home/controller/KEY/ksk-1/ID-CERT/1")),
        );
        signer.storage_mut().add_certificate(&certificate).unwrap();
        let request = Interest::new(certificate.name().clone());
        assert_eq!(
            dispatcher.dispatch(&request, &mut signer, &handlers),
            Dispatch::Certificate(certificate.wire_encode().unwrap())
        );
    }
}
