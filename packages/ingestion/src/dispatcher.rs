//! Routes links to extraction capabilities by host.
//!
//! Routes are registered once at startup through the builder and frozen;
//! the built dispatcher is read-only and safe to share across concurrent
//! lookups. Registration order defines precedence: the first predicate
//! matching the link's host wins.

use url::Url;

use crate::error::{IngestError, Result};
use crate::traits::extractor::Extractor;

/// Predicate over a link's host.
pub type HostPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Builds a fresh capability for a matched route.
pub type CapabilityFactory = Box<dyn Fn() -> Box<dyn Extractor> + Send + Sync>;

struct Route {
    predicate: HostPredicate,
    factory: CapabilityFactory,
}

/// Immutable host-to-capability routing table.
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder { routes: Vec::new() }
    }

    /// Capability for the first route whose predicate matches the link's
    /// host. Links without a parseable host are unroutable.
    pub fn lookup(&self, link: &str) -> Result<Box<dyn Extractor>> {
        let host = host_of(link).ok_or_else(|| IngestError::UnroutableLink {
            host: link.to_string(),
        })?;

        self.routes
            .iter()
            .find(|route| (route.predicate)(&host))
            .map(|route| (route.factory)())
            .ok_or(IngestError::UnroutableLink { host })
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Fluent, chainable route registration.
pub struct DispatcherBuilder {
    routes: Vec<Route>,
}

impl DispatcherBuilder {
    /// Register a capability for hosts matching `predicate`.
    pub fn register(
        mut self,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        factory: impl Fn() -> Box<dyn Extractor> + Send + Sync + 'static,
    ) -> Self {
        self.routes.push(Route {
            predicate: Box::new(predicate),
            factory: Box::new(factory),
        });
        self
    }

    /// Register a capability for hosts containing `fragment`.
    pub fn register_host(
        self,
        fragment: impl Into<String>,
        factory: impl Fn() -> Box<dyn Extractor> + Send + Sync + 'static,
    ) -> Self {
        let fragment = fragment.into();
        self.register(move |host| host.contains(&fragment), factory)
    }

    /// Freeze the routing table.
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            routes: self.routes,
        }
    }
}

/// Host portion of a link, when it has one.
pub(crate) fn host_of(link: &str) -> Option<String> {
    Url::parse(link)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
}
