//! Command handlers, registered by function name.

use std::collections::HashMap;

use fieldnode_types::{Data, Interest};

/// A command implementation: builds the response for a request.
pub type Handler = Box<dyn Fn(&Interest) -> Data + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `function_name`, replacing any previous one.
    pub fn register<H>(&mut self, function_name: impl Into<String>, handler: H)
    where
        H: Fn(&Interest) -> Data + Send + Sync + 'static,
    {
        self.handlers.insert(function_name.into(), Box::new(handler));
    }

    pub fn get(&self, function_name: &str) -> Option<&Handler> {
        self.handlers.get(function_name)
    }

    pub fn contains(&self, function_name: &str) -> bool {
        self.handlers.contains_key(function_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldnode_types::Name;

    #[test]
    fn registered_handler_builds_response() {
        let mut registry = HandlerRegistry::new();
        registry.register("doPing", |interest: &Interest| {
            Data::new(interest.name.clone()).with_content(b"pong".to_vec())
        });
        let request = Interest::new(Name::from_uri("/home/pi/ping").unwrap());
        let handler = registry.get("doPing").unwrap();
        assert_eq!(handler(&request).content, b"pong".to_vec());
        assert!(registry.get("doReboot").is_none());
    }
}
