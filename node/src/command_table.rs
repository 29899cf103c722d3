//! Configured device commands.

use fieldnode_messages::{DeviceCapability, NameMessage, UpdateCapabilitiesCommandMessage};
use fieldnode_types::Name;

use crate::config_tree::{ConfigError, ConfigTree};

/// One configured command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Command name relative to the device prefix.
    pub name: Name,
    /// Name of the registered handler that executes the command.
    pub function_name: String,
    pub keywords: Vec<String>,
    pub requires_authorization: bool,
}

impl CommandDescriptor {
    pub fn full_name(&self, device_prefix: &Name) -> Name {
        device_prefix.clone().append_name(&self.name)
    }
}

/// Commands in configured order. Order decides which descriptor handles a
/// request when several match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandTable {
    descriptors: Vec<CommandDescriptor>,
}

impl CommandTable {
    pub fn new(descriptors: Vec<CommandDescriptor>) -> Self {
        Self { descriptors }
    }

    /// Build the table from `device/command` entries. No entries means no
    /// commands. An `authorize` entry requires authorization unless its
    /// value is `false`.
    pub fn from_config(tree: &ConfigTree) -> Result<Self, ConfigError> {
        let commands = match tree.lookup("device/command") {
            Ok(commands) => commands,
            Err(ConfigError::NotFound(_)) => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        let mut descriptors = Vec::with_capacity(commands.len());
        for command in commands {
            let name = command.first_value("name")?;
            let name = Name::from_uri(name)
                .map_err(|e| ConfigError::Invalid(format!("command name {name:?}: {e}")))?;
            let keywords = match command.lookup("keyword") {
                Ok(nodes) => nodes
                    .iter()
                    .filter_map(|node| node.value())
                    .map(str::to_string)
                    .collect(),
                Err(_) => Vec::new(),
            };
            let requires_authorization = match command.lookup("authorize") {
                Ok(nodes) => nodes.first().and_then(|node| node.value()) != Some("false"),
                Err(_) => false,
            };
            descriptors.push(CommandDescriptor {
                name,
                function_name: command.first_value("functionName")?.to_string(),
                keywords,
                requires_authorization,
            });
        }
        Ok(Self { descriptors })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.descriptors.iter()
    }

    /// The first descriptor whose full name is a prefix of `request`.
    pub fn find(&self, device_prefix: &Name, request: &Name) -> Option<&CommandDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.full_name(device_prefix).is_prefix_of(request))
    }

    /// Payload announcing every command to the controller.
    pub fn capabilities(&self, device_prefix: &Name) -> UpdateCapabilitiesCommandMessage {
        UpdateCapabilitiesCommandMessage {
            capabilities: self
                .descriptors
                .iter()
                .map(|descriptor| DeviceCapability {
                    command_prefix: Some(NameMessage::from(&descriptor.full_name(device_prefix))),
                    keywords: descriptor.keywords.clone(),
                    needs_signature: descriptor.requires_authorization,
                })
                .collect(),
        }
    }
}
