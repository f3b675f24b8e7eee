//! Circular dependency detection infrastructure.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::ServiceIdentifier;
use super::FastHashMap;

pub(crate) const MAX_DEPTH: usize = 1024;

/// Ordered path of identifiers currently being compiled.
///
/// Membership is O(1) through the index map; the vector keeps the order
/// needed to report the cycle.
#[derive(Default)]
pub(crate) struct CallSiteChain {
    path: Vec<ServiceIdentifier>,
    members: FastHashMap<ServiceIdentifier, usize>,
}

impl CallSiteChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with `identifier` pushed on the chain, popping it on every exit path.
    pub(crate) fn scoped<R, F>(&mut self, identifier: &ServiceIdentifier, f: F) -> DiResult<R>
    where
        F: FnOnce(&mut Self) -> DiResult<R>,
    {
        self.push(identifier)?;
        let result = f(self);
        self.pop(identifier);
        result
    }

    fn push(&mut self, identifier: &ServiceIdentifier) -> DiResult<()> {
        if self.members.contains_key(identifier) {
            let mut cycle: Vec<String> = self.path.iter().map(ToString::to_string).collect();
            cycle.push(identifier.to_string());
            return Err(DiError::CircularDependency(cycle));
        }

        if self.path.len() >= MAX_DEPTH {
            return Err(DiError::DepthExceeded(self.path.len()));
        }

        self.members.insert(identifier.clone(), self.path.len());
        self.path.push(identifier.clone());
        Ok(())
    }

    fn pop(&mut self, identifier: &ServiceIdentifier) {
        if let Some(last) = self.path.pop() {
            debug_assert_eq!(&last, identifier);
            self.members.remove(&last);
        }
    }

    /// True outside any compilation, i.e. for a top-level request.
    pub(crate) fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.path.len()
    }
}

/// Identifiers currently being produced on one logical resolution.
///
/// Every factory and every cached construction pushes its identifier, and
/// the scope handle carries the path down into factories. A request for a
/// service that is already being produced further up gets a
/// `CircularDependency` error instead of waiting forever on that service's
/// construction lock.
#[derive(Clone, Default)]
pub(crate) struct ResolutionPath {
    head: Option<Arc<PathNode>>,
}

struct PathNode {
    identifier: ServiceIdentifier,
    parent: Option<Arc<PathNode>>,
}

impl ResolutionPath {
    pub(crate) fn contains(&self, identifier: &ServiceIdentifier) -> bool {
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            if &current.identifier == identifier {
                return true;
            }
            node = current.parent.as_deref();
        }
        false
    }

    pub(crate) fn push(&self, identifier: &ServiceIdentifier) -> Self {
        Self {
            head: Some(Arc::new(PathNode {
                identifier: identifier.clone(),
                parent: self.head.clone(),
            })),
        }
    }

    /// Path from the outermost production to `identifier`, for error reporting.
    pub(crate) fn cycle_to(&self, identifier: &ServiceIdentifier) -> DiError {
        let mut names = Vec::new();
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            names.push(current.identifier.to_string());
            node = current.parent.as_deref();
        }
        names.reverse();
        names.push(identifier.to_string());
        DiError::CircularDependency(names)
    }
}
