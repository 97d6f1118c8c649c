//! The seam modules extend the application pipeline through.
//!
//! The HTTP surface itself lives outside the core; during the configure
//! stage each module appends route and middleware registrations here and
//! the external layer materializes them.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RouteRegistration {
    /// Module that contributed the route
    pub module_id: String,
    pub path: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MiddlewareRegistration {
    pub module_id: String,
    pub name: String,
}

/// Ordered collection of pipeline contributions.
///
/// Registration order follows module dependency order, so middleware from
/// a dependency always precedes its dependents'.
#[derive(Debug, Default, Serialize)]
pub struct AppBuilder {
    routes: Vec<RouteRegistration>,
    middleware: Vec<MiddlewareRegistration>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_route(&mut self, module_id: &str, path: &str, description: &str) -> &mut Self {
        self.routes.push(RouteRegistration {
            module_id: module_id.to_string(),
            path: path.to_string(),
            description: description.to_string(),
        });
        self
    }

    pub fn use_middleware(&mut self, module_id: &str, name: &str) -> &mut Self {
        self.middleware.push(MiddlewareRegistration {
            module_id: module_id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn routes(&self) -> &[RouteRegistration] {
        &self.routes
    }

    pub fn middleware(&self) -> &[MiddlewareRegistration] {
        &self.middleware
    }
}
