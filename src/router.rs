//! Name-keyed dispatch tables.

use std::collections::BTreeMap;

use crate::error::{ProviderError, SchemaError};

/// What a router dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Managed resources.
    Resource,
    /// Data sources.
    DataSource,
    /// Provider functions.
    Function,
    /// Actions.
    Action,
}

impl RouteKind {
    /// Lower-case name used in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::DataSource => "data source",
            Self::Function => "function",
            Self::Action => "action",
        }
    }

    /// The error reported when `name` has no route.
    pub fn unsupported(self, name: &str) -> ProviderError {
        match self {
            Self::Resource | Self::DataSource => ProviderError::UnsupportedType(name.to_string()),
            Self::Function => ProviderError::UnsupportedFunction(name.to_string()),
            Self::Action => ProviderError::UnsupportedAction(name.to_string()),
        }
    }
}

/// An immutable map from type name to registration.
#[derive(Debug, Clone)]
pub struct Router<T> {
    kind: RouteKind,
    routes: BTreeMap<String, T>,
}

impl<T> Router<T> {
    /// Start building a router.
    pub fn builder(kind: RouteKind) -> RouterBuilder<T> {
        RouterBuilder {
            kind,
            routes: BTreeMap::new(),
        }
    }

    /// Look up a registration, failing with the matching `Unsupported*` error.
    pub fn route(&self, name: &str) -> Result<&T, ProviderError> {
        self.routes.get(name).ok_or_else(|| self.kind.unsupported(name))
    }

    /// What this router dispatches to.
    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    /// Registered names in order.
    pub fn names(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    /// Iterate over registrations in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.routes.iter().map(|(name, route)| (name.as_str(), route))
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects registrations, rejecting duplicates.
#[derive(Debug)]
pub struct RouterBuilder<T> {
    kind: RouteKind,
    routes: BTreeMap<String, T>,
}

impl<T> RouterBuilder<T> {
    /// Register `route` under `name`.
    pub fn insert(&mut self, name: impl Into<String>, route: T) -> Result<(), SchemaError> {
        let name = name.into();
        if self.routes.contains_key(&name) {
            return Err(SchemaError::DuplicateRegistration {
                kind: self.kind.as_str(),
                name,
            });
        }
        self.routes.insert(name, route);
        Ok(())
    }

    /// Freeze the router.
    pub fn build(self) -> Router<T> {
        Router {
            kind: self.kind,
            routes: self.routes,
        }
    }
}
