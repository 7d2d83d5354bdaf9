use async_trait::async_trait;
use pgrant_core::{ObjectKind, ObjectRef, PrivilegeSet};

use crate::error::GatewayError;

/// Read side of the store holding the privileges.
#[async_trait]
pub trait PrivilegeQuery: Send + Sync {
    /// Currently effective tokens for a principal on an object. A missing
    /// object/principal pair is an empty set, not an error.
    async fn fetch_privileges(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
    ) -> Result<PrivilegeSet, GatewayError>;
}

/// Write side of the store.
///
/// Both calls must be idempotent: granting a held token or revoking an unheld
/// one succeeds as a no-op. Revoking a set that contains the kind's READ
/// marker must also remove every dependent privilege the store manages for
/// that kind.
#[async_trait]
pub trait PrivilegeMutation: Send + Sync {
    async fn grant(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
        tokens: &[String],
    ) -> Result<(), GatewayError>;

    async fn revoke(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
        tokens: &[String],
    ) -> Result<(), GatewayError>;
}

/// Object listing used to carry a change to the objects that depend on it.
#[async_trait]
pub trait ObjectCatalog: Send + Sync {
    /// Sequences owned by a column of `table`.
    async fn owned_sequences(&self, table: &ObjectRef) -> Result<Vec<ObjectRef>, GatewayError>;

    /// Every object of `kind` inside `schema`.
    async fn schema_objects(
        &self,
        kind: ObjectKind,
        schema: &str,
    ) -> Result<Vec<ObjectRef>, GatewayError>;
}
