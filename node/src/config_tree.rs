//! Path-addressable view of the configuration file.
//!
//! Every TOML table becomes a node whose children are its keys; an array
//! becomes one child per element under the same key, in file order. Scalars
//! become leaf values. `lookup("device/command")` therefore returns every
//! `[[device.command]]` table, in the order they were written.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no configuration entry at {0}")]
    NotFound(String),

    #[error("configuration entry {0} has no value")]
    MissingValue(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot parse configuration: {0}")]
    Parse(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigTree {
    value: Option<String>,
    children: Vec<(String, ConfigTree)>,
}

impl ConfigTree {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(Self::from_table(&table))
    }

    pub fn from_table(table: &toml::Table) -> Self {
        let mut children = Vec::new();
        for (key, value) in table {
            match value {
                toml::Value::Array(items) => {
                    for item in items {
                        children.push((key.clone(), Self::from_value(item)));
                    }
                }
                other => children.push((key.clone(), Self::from_value(other))),
            }
        }
        Self {
            value: None,
            children,
        }
    }

    fn from_value(value: &toml::Value) -> Self {
        let leaf = |text: String| Self {
            value: Some(text),
            children: Vec::new(),
        };
        match value {
            toml::Value::Table(table) => Self::from_table(table),
            toml::Value::String(text) => leaf(text.clone()),
            toml::Value::Integer(number) => leaf(number.to_string()),
            toml::Value::Float(number) => leaf(number.to_string()),
            toml::Value::Boolean(flag) => leaf(flag.to_string()),
            toml::Value::Datetime(datetime) => leaf(datetime.to_string()),
            // Nested arrays flatten into repeated leaves of the parent key.
            toml::Value::Array(items) => Self {
                value: None,
                children: items
                    .iter()
                    .map(|item| (String::new(), Self::from_value(item)))
                    .collect(),
            },
        }
    }

    /// Scalar value of this node, if it is a leaf.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// All nodes reached by following `path` (segments separated by `/`).
    pub fn lookup(&self, path: &str) -> Result<Vec<&ConfigTree>, ConfigError> {
        let mut current = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(|node| {
                    node.children
                        .iter()
                        .filter(move |(key, _)| key == segment)
                        .map(|(_, child)| child)
                })
                .collect();
        }
        if current.is_empty() {
            return Err(ConfigError::NotFound(path.to_string()));
        }
        Ok(current)
    }

    /// Value of the first node at `path`.
    pub fn first_value(&self, path: &str) -> Result<&str, ConfigError> {
        self.lookup(path)?
            .first()
            .and_then(|node| node.value())
            .ok_or_else(|| ConfigError::MissingValue(path.to_string()))
    }

    /// Value of the first node at `path`, or `None` when the path is absent.
    pub fn optional_value(&self, path: &str) -> Result<Option<&str>, ConfigError> {
        match self.first_value(path) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
