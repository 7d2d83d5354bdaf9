use pgrant_core::{ObjectKind, ObjectRef};
use serde::Serialize;
use sqlx::{PgPool, Row};

/// Excluded from every listing.
const SYSTEM_SCHEMAS: &str = "('pg_catalog', 'information_schema', 'pg_toast')";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectListing {
    pub kind: ObjectKind,
    pub objects: Vec<ObjectRef>,
}

/// Enumerate objects of `kind` for bulk selection.
///
/// Schema-scoped kinds need `schema`; databases and schemas ignore it.
pub async fn list_objects(
    pool: &PgPool,
    kind: ObjectKind,
    schema: Option<&str>,
) -> anyhow::Result<ObjectListing> {
    let objects: Vec<ObjectRef> = match kind {
        ObjectKind::Database => {
            let rows = sqlx::query(
                "select datname as name from pg_database where not datistemplate order by datname",
            )
            .fetch_all(pool)
            .await?;
            rows.into_iter()
                .map(|r| ObjectRef::new(r.get::<String, _>("name")))
                .collect()
        }
        ObjectKind::Schema => {
            let sql = format!(
                "select nspname as name from pg_namespace \
                 where nspname not in {} and nspname not like 'pg_temp_%' \
                 and nspname not like 'pg_toast_temp_%' order by nspname",
                SYSTEM_SCHEMAS
            );
            let rows = sqlx::query(&sql).fetch_all(pool).await?;
            rows.into_iter()
                .map(|r| ObjectRef::new(r.get::<String, _>("name")))
                .collect()
        }
        scoped => {
            let schema = schema.ok_or_else(|| {
                anyhow::anyhow!("listing {} objects needs a schema", scoped)
            })?;
            let rows = sqlx::query(scoped_listing_query(scoped))
                .bind(schema)
                .fetch_all(pool)
                .await?;
            rows.into_iter()
                .map(|r| ObjectRef::qualified(schema, r.get::<String, _>("name")))
                .collect()
        }
    };

    tracing::debug!(%kind, ?schema, count = objects.len(), "listed objects");
    Ok(ObjectListing { kind, objects })
}

/// Sequences owned by a column of `table`: serial defaults and identity
/// columns.
pub async fn owned_sequences(pool: &PgPool, table: &ObjectRef) -> anyhow::Result<Vec<ObjectRef>> {
    let schema = table
        .schema
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("table '{}' needs a schema", table))?;
    let rows = sqlx::query(OWNED_SEQUENCES_QUERY)
        .bind(schema)
        .bind(&table.name)
        .fetch_all(pool)
        .await?;

    let sequences: Vec<ObjectRef> = rows
        .into_iter()
        .map(|r| ObjectRef::qualified(r.get::<String, _>("schema"), r.get::<String, _>("name")))
        .collect();
    tracing::debug!(%table, count = sequences.len(), "listed owned sequences");
    Ok(sequences)
}

const OWNED_SEQUENCES_QUERY: &str = r#"
    select s.relname as name, sn.nspname as schema
    from pg_depend d
    join pg_class s on s.oid = d.objid and s.relkind = 'S'
    join pg_namespace sn on sn.oid = s.relnamespace
    join pg_class t on t.oid = d.refobjid
    join pg_namespace tn on tn.oid = t.relnamespace
    where d.classid = 'pg_class'::regclass
      and d.refclassid = 'pg_class'::regclass
      and d.deptype in ('a', 'i')
      and tn.nspname = $1
      and t.relname = $2
    order by s.relname
"#;

fn scoped_listing_query(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Table => {
            r#"
            select c.relname as name
            from pg_class c
            join pg_namespace n on n.oid = c.relnamespace
            where n.nspname = $1 and c.relkind in ('r', 'p', 'v', 'm', 'f')
            order by c.relname
            "#
        }
        ObjectKind::Sequence => {
            r#"
            select c.relname as name
            from pg_class c
            join pg_namespace n on n.oid = c.relnamespace
            where n.nspname = $1 and c.relkind = 'S'
            order by c.relname
            "#
        }
        ObjectKind::Function => {
            r#"
            select distinct p.proname as name
            from pg_proc p
            join pg_namespace n on n.oid = p.pronamespace
            where n.nspname = $1 and p.prokind = 'f'
            order by p.proname
            "#
        }
        // Row types of tables and array types are managed with their owners.
        _ => {
            r#"
            select t.typname as name
            from pg_type t
            join pg_namespace n on n.oid = t.typnamespace
            left join pg_class c on c.oid = t.typrelid
            where n.nspname = $1
              and t.typelem = 0
              and (t.typrelid = 0 or c.relkind = 'c')
            order by t.typname
            "#
        }
    }
}
