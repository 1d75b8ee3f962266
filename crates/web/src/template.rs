//! Shared, read-only data behind every per-request object.

use std::sync::Arc;

use http::Extensions;

use crate::config::Config;

/// A typed value map populated before the application serves.
///
/// Per-request objects read from it through [`Template::get`]; nothing on the
/// request path can write to it.
#[derive(Debug, Clone, Default)]
pub struct Template {
    values: Extensions,
}

impl Template {
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.get::<T>().is_some()
    }

    /// Stores `value`, returning the one it replaced.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.values.insert(value)
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.values.remove::<T>()
    }
}

/// The three templates: context, request and response facing.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub context: Template,
    pub request: Template,
    pub response: Template,
}

/// Everything a per-request object shares with the application.
#[derive(Debug, Clone, Default)]
pub struct Shared {
    pub config: Config,
    pub templates: Templates,
}

impl Shared {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self { config, templates: Templates::default() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Greeting(&'static str);

    #[test]
    fn test_template_values() {
        let mut template = Template::default();
        assert!(!template.contains::<Greeting>());

        assert_eq!(template.insert(Greeting("hello")), None);
        assert_eq!(template.get::<Greeting>(), Some(&Greeting("hello")));
        assert_eq!(template.insert(Greeting("hi")), Some(Greeting("hello")));
        assert_eq!(template.remove::<Greeting>(), Some(Greeting("hi")));
        assert!(!template.contains::<Greeting>());
    }

    #[test]
    fn test_make_mut_copies_on_write() {
        let mut shared = Shared::new(Config::default());
        let running = Arc::clone(&shared);

        Arc::make_mut(&mut shared).templates.context.insert(Greeting("late"));

        assert!(shared.templates.context.contains::<Greeting>());
        assert!(!running.templates.context.contains::<Greeting>());
    }
}
