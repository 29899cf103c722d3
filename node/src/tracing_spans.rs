//! [`tracing::Span`] constructors for the node's recurring operations.
//!
//! Consistent span names and fields make node logs easy to filter and
//! correlate.

use tracing::{info_span, Span};

use fieldnode_types::Name;

/// Span covering the dispatch of one incoming request.
pub fn dispatch_span(request: &Name) -> Span {
    info_span!("dispatch", name = %request)
}

/// Span covering one bootstrap transition.
pub fn bootstrap_span(state: &str) -> Span {
    info_span!("bootstrap", state = %state)
}

/// Span covering the handling of a response or timeout for an outstanding
/// request.
pub fn exchange_span(kind: &str, name: &Name) -> Span {
    info_span!("exchange", kind = %kind, name = %name)
}
