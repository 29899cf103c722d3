//! Field node: joins an NDN environment and serves verified commands.
//!
//! The node:
//! - Registers its prefix with the local forwarder
//! - Obtains a certificate from the environment's trust root
//! - Announces its commands to the controller
//! - Dispatches incoming requests to registered handlers, checking
//!   signatures where a command requires authorization

pub mod bootstrap;
pub mod command_table;
pub mod config;
pub mod config_tree;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod pending;
pub mod serial;
pub mod shutdown;
pub mod timers;
pub mod tracing_spans;

pub use bootstrap::{
    Bootstrap, BootstrapConfig, BootstrapEvent, BootstrapState, Effect, FailureReason, TimerEvent,
    DEFAULT_CERTIFICATE_ATTEMPTS, MAX_CERTIFICATE_ATTEMPTS, REGISTRATION_ATTEMPTS,
};
pub use command_table::{CommandDescriptor, CommandTable};
pub use config::{Config, NodeConfig};
pub use config_tree::{ConfigError, ConfigTree};
pub use dispatcher::{unknown_command_response, Dispatch, Dispatcher};
pub use error::NodeError;
pub use handlers::{Handler, HandlerRegistry};
pub use logging::{init_logging, LogFormat, LogLevelHandle};
pub use metrics::NodeMetrics;
pub use node::{IotNode, NodeOptions, ReadyContext, SetupHook};
pub use pending::{AttemptLimit, PendingOperation};
pub use serial::platform_serial;
pub use shutdown::ShutdownController;
pub use timers::TimerQueue;
