//! Route table and request matching.
//!
//! # Responsibilities
//! - Compile `RouteConfig` entries into immutable routes
//! - Look up the route for a (method, path) pair
//! - Return the matched route with its captured values, or no match
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc by every snapshot)
//! - Precedence is explicit, never list order alone:
//!   more literal segments, then method-restricted routes, then declaration order
//! - O(n) scan (acceptable for typical route counts)

use std::cmp::Reverse;

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};

use crate::config::schema::{ResponseCondition, ResponseHeaderConfig, RouteConfig};
use crate::routing::pattern::{PathPattern, PathTemplate, PatternError, RouteValues};

/// Error produced while compiling a route.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route `{route}`: invalid path pattern: {source}")]
    Pattern {
        route: String,
        #[source]
        source: PatternError,
    },
    #[error("route `{route}`: invalid path transform: {source}")]
    Transform {
        route: String,
        #[source]
        source: PatternError,
    },
    #[error("route `{route}`: invalid method `{method}`")]
    Method { route: String, method: String },
    #[error("route `{route}`: method filter is empty")]
    EmptyMethodFilter { route: String },
    #[error("route `{route}`: invalid response header `{name}`")]
    Header { route: String, name: String },
}

/// A header set on the upstream response.
#[derive(Debug, Clone)]
pub struct HeaderTransform {
    pub name: HeaderName,
    pub value: HeaderValue,
    pub overwrite: bool,
    pub when: ResponseCondition,
}

impl HeaderTransform {
    fn from_config(route: &str, config: &ResponseHeaderConfig) -> Result<Self, RouteError> {
        let invalid = || RouteError::Header {
            route: route.to_string(),
            name: config.name.clone(),
        };
        Ok(Self {
            name: HeaderName::from_bytes(config.name.as_bytes()).map_err(|_| invalid())?,
            value: HeaderValue::from_str(&config.value).map_err(|_| invalid())?,
            overwrite: config.overwrite,
            when: config.when,
        })
    }

    /// Whether the transform applies to a response with this status.
    pub fn applies_to(&self, status: StatusCode) -> bool {
        match self.when {
            ResponseCondition::Always => true,
            ResponseCondition::Success => status.is_success(),
            ResponseCondition::Failure => !status.is_success(),
        }
    }
}

/// A compiled routing rule.
#[derive(Debug, Clone)]
pub struct Route {
    id: String,
    cluster_id: String,
    pattern: PathPattern,
    methods: Option<Vec<Method>>,
    authorization_policy: Option<String>,
    path_transform: Option<PathTemplate>,
    response_headers: Vec<HeaderTransform>,
}

impl Route {
    /// Compile a route from its configuration.
    pub fn from_config(config: &RouteConfig) -> Result<Self, RouteError> {
        let pattern: PathPattern = config.path.parse().map_err(|source| RouteError::Pattern {
            route: config.id.clone(),
            source,
        })?;

        let path_transform = match &config.path_transform {
            Some(raw) => {
                let template: PathTemplate = raw
                    .parse()
                    .and_then(|t: PathTemplate| t.check_against(&pattern).map(|_| t))
                    .map_err(|source| RouteError::Transform {
                        route: config.id.clone(),
                        source,
                    })?;
                Some(template)
            }
            None => None,
        };

        let methods = match &config.methods {
            Some(raw) if raw.is_empty() => {
                return Err(RouteError::EmptyMethodFilter {
                    route: config.id.clone(),
                })
            }
            Some(raw) => Some(
                raw.iter()
                    .map(|m| {
                        Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
                            RouteError::Method {
                                route: config.id.clone(),
                                method: m.clone(),
                            }
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        let response_headers = config
            .response_headers
            .iter()
            .map(|h| HeaderTransform::from_config(&config.id, h))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: config.id.clone(),
            cluster_id: config.cluster_id.clone(),
            pattern,
            methods,
            authorization_policy: config.authorization_policy.clone(),
            path_transform,
            response_headers,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn methods(&self) -> Option<&[Method]> {
        self.methods.as_deref()
    }

    /// Policy the caller must satisfy; `None` means the route is open.
    pub fn authorization_policy(&self) -> Option<&str> {
        self.authorization_policy.as_deref()
    }

    pub fn path_transform(&self) -> Option<&PathTemplate> {
        self.path_transform.as_ref()
    }

    pub fn response_headers(&self) -> &[HeaderTransform] {
        &self.response_headers
    }

    /// Returns true if the method filter is absent or contains `method`.
    pub fn accepts_method(&self, method: &Method) -> bool {
        self.methods
            .as_ref()
            .map_or(true, |methods| methods.contains(method))
    }

    /// Upstream path for a request matched with `values`.
    pub fn upstream_path(&self, request_path: &str, values: &RouteValues) -> String {
        match &self.path_transform {
            Some(template) => template.render(values),
            None => request_path.to_string(),
        }
    }
}

/// A route selected for a request, with the values its pattern captured.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub values: RouteValues,
}

/// The fixed, ordered set of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Compile every route in `configs`, failing on the first invalid one.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        let routes = configs
            .iter()
            .map(Route::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the highest-precedence route accepting this request.
    pub fn match_request(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .enumerate()
            .filter(|(_, route)| route.accepts_method(method))
            .filter_map(|(index, route)| {
                route
                    .pattern
                    .match_path(path)
                    .map(|values| (index, route, values))
            })
            .min_by_key(|(index, route, _)| {
                (
                    Reverse(route.pattern.literal_count()),
                    route.methods.is_none(),
                    *index,
                )
            })
            .map(|(_, route, values)| RouteMatch { route, values })
    }
}
