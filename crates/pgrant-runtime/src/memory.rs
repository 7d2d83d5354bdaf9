//! In-process privilege store.
//!
//! Behaves like the Postgres gateway as far as the orchestrator can tell:
//! grants and revokes are idempotent, and revoking a token set that contains
//! the kind's READ marker drops every privilege held on the pair. Individual
//! pairs can be made to fail for testing partial batches. A small object
//! catalog backs change propagation.

use async_trait::async_trait;
use pgrant_core::{GrantRegistry, ObjectKind, ObjectRef, PrivilegeSet};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::adapter::{ObjectCatalog, PrivilegeMutation, PrivilegeQuery};
use crate::error::GatewayError;

type PairKey = (ObjectKind, ObjectRef, String);

/// Which calls an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Every call for the pair fails.
    All,
    /// Reads succeed, grants and revokes fail.
    Mutations,
}

pub struct MemoryGateway {
    registry: Arc<GrantRegistry>,
    privileges: RwLock<HashMap<PairKey, PrivilegeSet>>,
    failures: RwLock<HashMap<(ObjectRef, String), FailureMode>>,
    objects: RwLock<Vec<(ObjectKind, ObjectRef)>>,
    owned_sequences: RwLock<HashMap<ObjectRef, Vec<ObjectRef>>>,
}

// Every critical section is a single map operation, so a poisoned lock
// still guards consistent data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryGateway {
    pub fn new(registry: Arc<GrantRegistry>) -> Self {
        Self {
            registry,
            privileges: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            objects: RwLock::new(Vec::new()),
            owned_sequences: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_object(self, kind: ObjectKind, object: ObjectRef) -> Self {
        self.add_object(kind, object);
        self
    }

    /// Registers `sequence` as owned by `table`, and as a catalog object.
    pub fn with_owned_sequence(self, table: ObjectRef, sequence: ObjectRef) -> Self {
        self.add_object(ObjectKind::Sequence, sequence.clone());
        write(&self.owned_sequences)
            .entry(table)
            .or_default()
            .push(sequence);
        self
    }

    pub fn add_object(&self, kind: ObjectKind, object: ObjectRef) {
        let mut objects = write(&self.objects);
        if !objects.iter().any(|(k, o)| *k == kind && *o == object) {
            objects.push((kind, object));
        }
    }

    /// Builder-style seeding.
    pub fn with_privileges<S: AsRef<str>>(
        self,
        kind: ObjectKind,
        object: ObjectRef,
        principal: &str,
        tokens: &[S],
    ) -> Self {
        self.set_privileges(kind, object, principal, tokens);
        self
    }

    pub fn set_privileges<S: AsRef<str>>(
        &self,
        kind: ObjectKind,
        object: ObjectRef,
        principal: &str,
        tokens: &[S],
    ) {
        let set: PrivilegeSet = tokens.iter().map(|t| t.as_ref()).collect();
        write(&self.privileges).insert((kind, object, principal.to_string()), set);
    }

    /// Snapshot of what a pair currently holds.
    pub fn privileges(&self, kind: ObjectKind, object: &ObjectRef, principal: &str) -> PrivilegeSet {
        read(&self.privileges)
            .get(&(kind, object.clone(), principal.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_pair(&self, object: ObjectRef, principal: &str, mode: FailureMode) {
        write(&self.failures).insert((object, principal.to_string()), mode);
    }

    pub fn heal_pair(&self, object: &ObjectRef, principal: &str) {
        write(&self.failures).remove(&(object.clone(), principal.to_string()));
    }

    fn check_failure(
        &self,
        object: &ObjectRef,
        principal: &str,
        mutation: bool,
    ) -> Result<(), GatewayError> {
        match read(&self.failures).get(&(object.clone(), principal.to_string())) {
            Some(FailureMode::All) => Err(injected(object, principal)),
            Some(FailureMode::Mutations) if mutation => Err(injected(object, principal)),
            _ => Ok(()),
        }
    }

    fn update<F>(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
        apply: F,
    ) -> Result<(), GatewayError>
    where
        F: FnOnce(&mut PrivilegeSet),
    {
        self.check_failure(object, principal, true)?;
        let mut guard = write(&self.privileges);
        let held = guard
            .entry((kind, object.clone(), principal.to_string()))
            .or_default();
        apply(held);
        Ok(())
    }
}

fn injected(object: &ObjectRef, principal: &str) -> GatewayError {
    GatewayError::Backend(anyhow::anyhow!(
        "injected failure for {} on {}",
        principal,
        object
    ))
}

#[async_trait]
impl PrivilegeQuery for MemoryGateway {
    async fn fetch_privileges(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
    ) -> Result<PrivilegeSet, GatewayError> {
        self.check_failure(object, principal, false)?;
        Ok(self.privileges(kind, object, principal))
    }
}

#[async_trait]
impl PrivilegeMutation for MemoryGateway {
    async fn grant(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
        tokens: &[String],
    ) -> Result<(), GatewayError> {
        self.update(kind, object, principal, |held| {
            for token in tokens {
                held.insert(token);
            }
        })
    }

    async fn revoke(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
        tokens: &[String],
    ) -> Result<(), GatewayError> {
        let cascade = self
            .registry
            .read_marker(kind)
            .is_some_and(|marker| tokens.iter().any(|t| t.eq_ignore_ascii_case(marker)));

        self.update(kind, object, principal, |held| {
            if cascade {
                held.clear();
            } else {
                for token in tokens {
                    held.remove(token);
                }
            }
        })
    }
}

#[async_trait]
impl ObjectCatalog for MemoryGateway {
    async fn owned_sequences(&self, table: &ObjectRef) -> Result<Vec<ObjectRef>, GatewayError> {
        Ok(read(&self.owned_sequences)
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    async fn schema_objects(
        &self,
        kind: ObjectKind,
        schema: &str,
    ) -> Result<Vec<ObjectRef>, GatewayError> {
        Ok(read(&self.objects)
            .iter()
            .filter(|(k, o)| *k == kind && o.schema.as_deref() == Some(schema))
            .map(|(_, o)| o.clone())
            .collect())
    }
}
