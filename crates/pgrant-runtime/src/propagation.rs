//! Derived changes that keep dependent objects in step with a change.
//!
//! Access to a table is useless without USAGE on its schema, and a writer
//! needs the table's owned sequences to insert rows. Access set on a schema
//! covers everything inside it. [`propagate`] turns a batch of changes into
//! the batch plus these derived changes:
//!
//! | change        | derived                                                    |
//! |---------------|------------------------------------------------------------|
//! | TABLE READ    | parent schema at least READ, owned sequences at most READ   |
//! | TABLE WRITE   | parent schema at least READ, owned sequences at least WRITE |
//! | TABLE NONE    | owned sequences NONE                                        |
//! | SCHEMA WRITE  | tables, sequences and types WRITE, functions EXECUTE        |
//! | SCHEMA READ   | tables and sequences READ, functions EXECUTE, types NONE    |
//! | SCHEMA NONE   | every member NONE                                           |
//!
//! Other kinds and targets derive nothing.

use pgrant_core::{AccessChange, Action, ChangeMode, ObjectKind, ObjectRef};
use std::collections::HashSet;

use crate::adapter::ObjectCatalog;
use crate::error::GatewayError;

type PairKey = (ObjectKind, ObjectRef, String);

const SCHEMA_MEMBERS: [ObjectKind; 4] = [
    ObjectKind::Table,
    ObjectKind::Sequence,
    ObjectKind::Function,
    ObjectKind::Type,
];

/// `changes` followed by their derived changes.
///
/// A derived change never overrides an explicit one for the same pair, and
/// the first derivation of a pair wins over later ones.
pub async fn propagate<C>(
    catalog: &C,
    changes: &[AccessChange],
) -> Result<Vec<AccessChange>, GatewayError>
where
    C: ObjectCatalog + ?Sized,
{
    let mut seen: HashSet<PairKey> = changes.iter().map(pair_key).collect();
    let mut out = changes.to_vec();

    for change in changes {
        for derived in derive(catalog, change).await? {
            if seen.insert(pair_key(&derived)) {
                out.push(derived);
            }
        }
    }

    tracing::debug!(
        explicit = changes.len(),
        derived = out.len() - changes.len(),
        "propagated access changes"
    );
    Ok(out)
}

fn pair_key(change: &AccessChange) -> PairKey {
    (change.kind, change.object.clone(), change.principal.clone())
}

async fn derive<C>(catalog: &C, change: &AccessChange) -> Result<Vec<AccessChange>, GatewayError>
where
    C: ObjectCatalog + ?Sized,
{
    let mut out = Vec::new();
    match change.kind {
        ObjectKind::Table => {
            let (sequence_target, sequence_mode) = match change.target {
                Action::Write => (Action::Write, ChangeMode::AtLeast),
                Action::Read => (Action::Read, ChangeMode::AtMost),
                Action::None => (Action::None, ChangeMode::Exact),
                Action::Execute => return Ok(out),
            };
            if change.target != Action::None
                && let Some(schema) = &change.object.schema
            {
                out.push(derived(
                    change,
                    ObjectKind::Schema,
                    ObjectRef::new(schema.clone()),
                    Action::Read,
                    ChangeMode::AtLeast,
                ));
            }
            for sequence in catalog.owned_sequences(&change.object).await? {
                out.push(derived(
                    change,
                    ObjectKind::Sequence,
                    sequence,
                    sequence_target,
                    sequence_mode,
                ));
            }
        }
        ObjectKind::Schema => {
            for kind in SCHEMA_MEMBERS {
                let Some(target) = member_target(kind, change.target) else {
                    continue;
                };
                for object in catalog.schema_objects(kind, &change.object.name).await? {
                    out.push(derived(change, kind, object, target, ChangeMode::Exact));
                }
            }
        }
        _ => {}
    }
    Ok(out)
}

/// Level a schema member takes when its schema moves to `schema_target`.
fn member_target(kind: ObjectKind, schema_target: Action) -> Option<Action> {
    match (schema_target, kind) {
        (Action::Execute, _) => None,
        (Action::None, _) => Some(Action::None),
        (_, ObjectKind::Function) => Some(Action::Execute),
        (Action::Read, ObjectKind::Type) => Some(Action::None),
        (target, _) => Some(target),
    }
}

fn derived(
    parent: &AccessChange,
    kind: ObjectKind,
    object: ObjectRef,
    target: Action,
    mode: ChangeMode,
) -> AccessChange {
    AccessChange {
        kind,
        object,
        principal: parent.principal.clone(),
        target,
        mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGateway;
    use pgrant_core::{AccessTarget, GrantRegistry};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn catalog() -> MemoryGateway {
        MemoryGateway::new(Arc::new(GrantRegistry::postgres()))
            .with_object(ObjectKind::Table, ObjectRef::qualified("shop", "orders"))
            .with_owned_sequence(
                ObjectRef::qualified("shop", "orders"),
                ObjectRef::qualified("shop", "orders_id_seq"),
            )
            .with_object(ObjectKind::Function, ObjectRef::qualified("shop", "total"))
            .with_object(ObjectKind::Type, ObjectRef::qualified("shop", "status"))
    }

    fn change(kind: ObjectKind, object: ObjectRef, target: Action) -> AccessChange {
        AccessTarget::new(kind, object, "alice".to_string()).change_to(target)
    }

    fn summary(changes: &[AccessChange]) -> Vec<(ObjectKind, String, Action, ChangeMode)> {
        changes
            .iter()
            .map(|c| (c.kind, c.object.to_string(), c.target, c.mode))
            .collect()
    }

    #[tokio::test]
    async fn test_table_write_reaches_schema_and_sequences() {
        let changes = vec![change(
            ObjectKind::Table,
            ObjectRef::qualified("shop", "orders"),
            Action::Write,
        )];
        let out = propagate(&catalog(), &changes).await.unwrap();
        assert_eq!(
            summary(&out),
            vec![
                (ObjectKind::Table, "shop.orders".to_string(), Action::Write, ChangeMode::Exact),
                (ObjectKind::Schema, "shop".to_string(), Action::Read, ChangeMode::AtLeast),
                (
                    ObjectKind::Sequence,
                    "shop.orders_id_seq".to_string(),
                    Action::Write,
                    ChangeMode::AtLeast
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_table_read_caps_sequences() {
        let changes = vec![change(
            ObjectKind::Table,
            ObjectRef::qualified("shop", "orders"),
            Action::Read,
        )];
        let out = propagate(&catalog(), &changes).await.unwrap();
        assert_eq!(out[2].target, Action::Read);
        assert_eq!(out[2].mode, ChangeMode::AtMost);
    }

    #[tokio::test]
    async fn test_table_none_leaves_schema_alone() {
        let changes = vec![change(
            ObjectKind::Table,
            ObjectRef::qualified("shop", "orders"),
            Action::None,
        )];
        let out = propagate(&catalog(), &changes).await.unwrap();
        assert_eq!(
            summary(&out[1..]),
            vec![(
                ObjectKind::Sequence,
                "shop.orders_id_seq".to_string(),
                Action::None,
                ChangeMode::Exact
            )]
        );
    }

    #[tokio::test]
    async fn test_schema_read_fans_out() {
        let changes = vec![change(ObjectKind::Schema, ObjectRef::new("shop"), Action::Read)];
        let out = propagate(&catalog(), &changes).await.unwrap();
        assert_eq!(
            summary(&out[1..]),
            vec![
                (ObjectKind::Table, "shop.orders".to_string(), Action::Read, ChangeMode::Exact),
                (
                    ObjectKind::Sequence,
                    "shop.orders_id_seq".to_string(),
                    Action::Read,
                    ChangeMode::Exact
                ),
                (ObjectKind::Function, "shop.total".to_string(), Action::Execute, ChangeMode::Exact),
                (ObjectKind::Type, "shop.status".to_string(), Action::None, ChangeMode::Exact),
            ]
        );
    }

    #[tokio::test]
    async fn test_explicit_changes_win_over_derived() {
        let changes = vec![
            change(ObjectKind::Table, ObjectRef::qualified("shop", "orders"), Action::Write),
            change(ObjectKind::Schema, ObjectRef::new("shop"), Action::None),
        ];
        let out = propagate(&catalog(), &changes).await.unwrap();

        let schema: Vec<_> = out.iter().filter(|c| c.kind == ObjectKind::Schema).collect();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0].target, Action::None);

        let tables: Vec<_> = out.iter().filter(|c| c.kind == ObjectKind::Table).collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].target, Action::Write);
    }

    #[tokio::test]
    async fn test_unsupported_targets_derive_nothing() {
        let changes = vec![change(
            ObjectKind::Table,
            ObjectRef::qualified("shop", "orders"),
            Action::Execute,
        )];
        let out = propagate(&catalog(), &changes).await.unwrap();
        assert_eq!(out.len(), 1);
    }
}
