//! Stub registry.
//!
//! Holds the fixed, ordered set of stub definitions and answers match
//! queries against request paths. The registry is built once and never
//! changes afterwards, so it can be shared across requests without locking.

use crate::error::{InterceptError, Result};
use crate::fixture::FixtureSource;
use crate::stub::{BuiltinStub, StubDefinition, BUILTIN_STUBS};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Immutable, ordered list of stubs. Earlier entries win.
#[derive(Debug, Clone)]
pub struct StubRegistry {
    stubs: Vec<StubDefinition>,
}

impl StubRegistry {
    /// Build a registry from a fixed set of definitions.
    ///
    /// Rejects empty path fragments (they would match every request) and
    /// duplicate ids.
    pub fn new(stubs: Vec<StubDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for stub in &stubs {
            if stub.id.is_empty() {
                return Err(InterceptError::InvalidStub {
                    id: stub.id.clone(),
                    reason: "stub id cannot be empty".to_string(),
                });
            }
            if stub.path_fragment.is_empty() {
                return Err(InterceptError::InvalidStub {
                    id: stub.id.clone(),
                    reason: "path fragment cannot be empty".to_string(),
                });
            }
            if !seen.insert(stub.id.as_str()) {
                return Err(InterceptError::InvalidStub {
                    id: stub.id.clone(),
                    reason: "duplicate stub id".to_string(),
                });
            }
        }

        debug!(stubs = stubs.len(), "Stub registry built");
        Ok(Self { stubs })
    }

    /// Build the registry from the built-in stub table.
    ///
    /// A fixture that fails to load leaves its stub without a payload, unless
    /// `strict` is set, in which case the failure is returned.
    pub fn builtin(fixtures: &dyn FixtureSource, strict: bool) -> Result<Self> {
        Self::from_table(BUILTIN_STUBS, fixtures, strict)
    }

    pub(crate) fn from_table(
        table: &[BuiltinStub],
        fixtures: &dyn FixtureSource,
        strict: bool,
    ) -> Result<Self> {
        let mut stubs = Vec::with_capacity(table.len());

        for entry in table {
            let payload = match entry.fixture {
                Some(name) => match fixtures.load(name) {
                    Ok(data) => Some(data),
                    Err(e) if strict => return Err(e.into()),
                    Err(e) => {
                        warn!(
                            stub_id = entry.id,
                            fixture = name,
                            error = %e,
                            "Fixture unavailable, stub will answer with an empty body"
                        );
                        None
                    }
                },
                None => None,
            };

            stubs.push(StubDefinition {
                id: entry.id.to_string(),
                path_fragment: entry.path_fragment.to_string(),
                status: entry.status,
                payload,
                error: entry.error,
            });
        }

        info!(
            stubs = stubs.len(),
            source = %fixtures.describe(),
            "Loaded built-in stubs"
        );
        Self::new(stubs)
    }

    /// Find the first stub whose path fragment occurs in `path`.
    pub fn find_match(&self, path: &str) -> Option<&StubDefinition> {
        self.stubs.iter().find(|stub| stub.matches(path))
    }

    /// Look up a stub by id.
    pub fn get(&self, id: &str) -> Option<&StubDefinition> {
        self.stubs.iter().find(|stub| stub.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StubDefinition> {
        self.stubs.iter()
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }
}
