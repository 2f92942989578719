//! Data-driven routing for the relay loop.
//!
//! Each watched stream has a [`Role`]; a [`Route`] says where bytes read from
//! one role are written. Routes are resolved against the session's
//! [`Topology`] so that roles backed by the same descriptor collapse into
//! one, and a stream is never read by two routes.

use std::fmt;

/// A stream watched by the relay loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    ConfiguredInput,
    ConfiguredOutput,
    OwnStdin,
    /// Destination only; never read
    OwnStdout,
}

impl Role {
    /// Operation name used when a read from this role fails
    pub fn read_op(&self) -> &'static str {
        match self {
            Role::ConfiguredInput => "read from input descriptor",
            Role::ConfiguredOutput => "read from output descriptor",
            Role::OwnStdin => "read from stdin",
            Role::OwnStdout => "read from stdout",
        }
    }

    /// Operation name used when a write to this role fails
    pub fn write_op(&self) -> &'static str {
        match self {
            Role::ConfiguredInput => "write to input descriptor",
            Role::ConfiguredOutput => "write to output descriptor",
            Role::OwnStdin => "write to stdin",
            Role::OwnStdout => "write to stdout",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::ConfiguredInput => f.write_str("configured input"),
            Role::ConfiguredOutput => f.write_str("configured output"),
            Role::OwnStdin => f.write_str("stdin"),
            Role::OwnStdout => f.write_str("stdout"),
        }
    }
}

/// Bytes read from `source` are written to `dest`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub source: Role,
    pub dest: Role,
}

impl Route {
    pub const fn new(source: Role, dest: Role) -> Self {
        Self { source, dest }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.dest)
    }
}

/// Candidate routes in service priority order
pub const ROUTES: [Route; 3] = [
    Route::new(Role::ConfiguredInput, Role::ConfiguredOutput),
    Route::new(Role::ConfiguredOutput, Role::OwnStdout),
    Route::new(Role::OwnStdin, Role::ConfiguredOutput),
];

/// Which roles are backed by their own descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    pub input_configured: bool,
    pub output_configured: bool,
    /// Input and output are one descriptor
    pub shared: bool,
}

impl Topology {
    /// The role whose descriptor actually backs `role`
    pub fn resolve(&self, role: Role) -> Role {
        match role {
            Role::ConfiguredInput if !self.input_configured => Role::OwnStdin,
            Role::ConfiguredOutput if self.shared => Role::ConfiguredInput,
            Role::ConfiguredOutput if !self.output_configured => Role::OwnStdout,
            other => other,
        }
    }
}

/// Active routes, at most one per source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    /// Resolve the candidate routes against `topology`, dropping self-loops
    /// and routes whose source is already read by an earlier route
    pub fn build(topology: Topology) -> Self {
        let mut routes: Vec<Route> = Vec::with_capacity(ROUTES.len());
        for candidate in ROUTES {
            let route = Route::new(topology.resolve(candidate.source), topology.resolve(candidate.dest));
            if route.source == route.dest || route.source == Role::OwnStdout {
                continue;
            }
            if routes.iter().any(|existing| existing.source == route.source) {
                continue;
            }
            routes.push(route);
        }
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_source(&self, role: Role) -> bool {
        self.routes.iter().any(|route| route.source == role)
    }

    pub fn dest_for(&self, source: Role) -> Option<Role> {
        self.routes
            .iter()
            .find(|route| route.source == source)
            .map(|route| route.dest)
    }

    /// Stop servicing `source`, returning the route it fed
    pub fn retire(&mut self, source: Role) -> Option<Route> {
        let index = self.routes.iter().position(|route| route.source == source)?;
        Some(self.routes.remove(index))
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
