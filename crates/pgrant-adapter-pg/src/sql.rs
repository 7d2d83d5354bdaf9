//! Statement rendering for GRANT/REVOKE and the catalog ACL lookups.
//!
//! Identifiers are always double-quoted and privilege keywords are checked
//! against a fixed allow-list, so nothing caller-supplied reaches the server
//! unescaped.

use pgrant_core::{ObjectKind, ObjectRef};
use pgrant_runtime::GatewayError;

const ALLOWED_PRIVILEGES: &[&str] = &[
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "TRUNCATE",
    "REFERENCES",
    "TRIGGER",
    "CREATE",
    "CONNECT",
    "TEMPORARY",
    "TEMP",
    "EXECUTE",
    "USAGE",
];

pub fn quote_ident(ident: &str) -> Result<String, GatewayError> {
    if ident.is_empty() || ident.contains('\0') {
        return Err(GatewayError::InvalidIdentifier(ident.to_string()));
    }
    Ok(format!("\"{}\"", ident.replace('"', "\"\"")))
}

fn privilege_list(tokens: &[String]) -> Result<String, GatewayError> {
    if tokens.is_empty() {
        return Err(GatewayError::InvalidToken(String::new()));
    }
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let upper = token.trim().to_ascii_uppercase();
        if !ALLOWED_PRIVILEGES.contains(&upper.as_str()) {
            return Err(GatewayError::InvalidToken(token.clone()));
        }
        out.push(upper);
    }
    Ok(out.join(", "))
}

fn object_keyword(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Database => "DATABASE",
        ObjectKind::Schema => "SCHEMA",
        ObjectKind::Table => "TABLE",
        ObjectKind::Function => "FUNCTION",
        ObjectKind::Sequence => "SEQUENCE",
        ObjectKind::Type => "TYPE",
    }
}

/// Check that `object` has the shape `kind` needs: schema-scoped kinds carry
/// a schema, databases and schemas do not.
pub fn check_object(kind: ObjectKind, object: &ObjectRef) -> Result<(), GatewayError> {
    match (kind.is_schema_scoped(), &object.schema) {
        (true, None) => Err(GatewayError::InvalidObject {
            kind,
            reason: format!("'{}' needs a schema", object.name),
        }),
        (false, Some(_)) => Err(GatewayError::InvalidObject {
            kind,
            reason: format!("'{}' must not be schema-qualified", object),
        }),
        _ => Ok(()),
    }
}

fn object_name(kind: ObjectKind, object: &ObjectRef) -> Result<String, GatewayError> {
    check_object(kind, object)?;
    match &object.schema {
        Some(schema) => Ok(format!(
            "{}.{}",
            quote_ident(schema)?,
            quote_ident(&object.name)?
        )),
        None => quote_ident(&object.name),
    }
}

pub fn render_grant(
    kind: ObjectKind,
    object: &ObjectRef,
    principal: &str,
    tokens: &[String],
) -> Result<String, GatewayError> {
    Ok(format!(
        "GRANT {} ON {} {} TO {}",
        privilege_list(tokens)?,
        object_keyword(kind),
        object_name(kind, object)?,
        quote_ident(principal)?
    ))
}

/// `cascade_all` turns the statement into `REVOKE ALL PRIVILEGES`, used when
/// the revoked set contains the kind's READ marker.
pub fn render_revoke(
    kind: ObjectKind,
    object: &ObjectRef,
    principal: &str,
    tokens: &[String],
    cascade_all: bool,
) -> Result<String, GatewayError> {
    let privileges = if cascade_all {
        "ALL PRIVILEGES".to_string()
    } else {
        privilege_list(tokens)?
    };
    Ok(format!(
        "REVOKE {} ON {} {} FROM {}",
        privileges,
        object_keyword(kind),
        object_name(kind, object)?,
        quote_ident(principal)?
    ))
}

/// Query returning one `privilege_type` row per effective privilege.
///
/// Binds `$1 = name, $2 = principal` for databases and schemas and
/// `$1 = schema, $2 = name, $3 = principal` for everything else. A NULL ACL
/// falls back to the owner defaults.
pub fn privileges_query(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Database => {
            r#"
            select distinct a.privilege_type
            from pg_database d
            cross join lateral aclexplode(coalesce(d.datacl, acldefault('d', d.datdba))) a
            join pg_roles r on r.oid = a.grantee
            where d.datname = $1 and r.rolname = $2
            "#
        }
        ObjectKind::Schema => {
            r#"
            select distinct a.privilege_type
            from pg_namespace n
            cross join lateral aclexplode(coalesce(n.nspacl, acldefault('n', n.nspowner))) a
            join pg_roles r on r.oid = a.grantee
            where n.nspname = $1 and r.rolname = $2
            "#
        }
        ObjectKind::Table => {
            r#"
            select distinct a.privilege_type
            from pg_class c
            join pg_namespace n on n.oid = c.relnamespace
            cross join lateral aclexplode(coalesce(c.relacl, acldefault('r', c.relowner))) a
            join pg_roles r on r.oid = a.grantee
            where c.relkind in ('r', 'p', 'v', 'm', 'f')
              and n.nspname = $1 and c.relname = $2 and r.rolname = $3
            "#
        }
        ObjectKind::Sequence => {
            r#"
            select distinct a.privilege_type
            from pg_class c
            join pg_namespace n on n.oid = c.relnamespace
            cross join lateral aclexplode(coalesce(c.relacl, acldefault('s', c.relowner))) a
            join pg_roles r on r.oid = a.grantee
            where c.relkind = 'S'
              and n.nspname = $1 and c.relname = $2 and r.rolname = $3
            "#
        }
        ObjectKind::Function => {
            r#"
            select distinct a.privilege_type
            from pg_proc p
            join pg_namespace n on n.oid = p.pronamespace
            cross join lateral aclexplode(coalesce(p.proacl, acldefault('f', p.proowner))) a
            join pg_roles r on r.oid = a.grantee
            where n.nspname = $1 and p.proname = $2 and r.rolname = $3
            "#
        }
        ObjectKind::Type => {
            r#"
            select distinct a.privilege_type
            from pg_type t
            join pg_namespace n on n.oid = t.typnamespace
            cross join lateral aclexplode(coalesce(t.typacl, acldefault('T', t.typowner))) a
            join pg_roles r on r.oid = a.grantee
            where n.nspname = $1 and t.typname = $2 and r.rolname = $3
            "#
        }
    }
}
