use async_trait::async_trait;
use pgrant_core::{GrantRegistry, ObjectKind, ObjectRef, PrivilegeSet, UpstreamConfig};
use pgrant_runtime::{GatewayError, ObjectCatalog, PrivilegeMutation, PrivilegeQuery};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;

pub mod introspect;
pub mod sql;

/// Reads effective ACLs from the system catalogs and issues GRANT/REVOKE.
pub struct PostgresGateway {
    pool: PgPool,
    registry: Arc<GrantRegistry>,
}

impl PostgresGateway {
    pub async fn connect(
        upstream: &UpstreamConfig,
        registry: Arc<GrantRegistry>,
    ) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(upstream.pool.max_connections)
            .acquire_timeout(Duration::from_secs(upstream.pool.acquire_timeout_seconds))
            .connect(&upstream.connection_string())
            .await?;
        tracing::info!(
            host = %upstream.host,
            database = %upstream.database,
            "connected to upstream"
        );
        Ok(Self::from_pool(pool, registry))
    }

    pub fn from_pool(pool: PgPool, registry: Arc<GrantRegistry>) -> Self {
        Self { pool, registry }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute(&self, statement: String) -> Result<(), GatewayError> {
        tracing::debug!(sql = %statement, "executing privilege statement");
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

fn backend(err: sqlx::Error) -> GatewayError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            GatewayError::Unavailable(err.to_string())
        }
        other => GatewayError::Backend(other.into()),
    }
}

#[async_trait]
impl PrivilegeQuery for PostgresGateway {
    async fn fetch_privileges(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
    ) -> Result<PrivilegeSet, GatewayError> {
        sql::check_object(kind, object)?;

        let mut query = sqlx::query(sql::privileges_query(kind));
        if let Some(schema) = &object.schema {
            query = query.bind(schema);
        }
        let rows = query
            .bind(&object.name)
            .bind(principal)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut privileges = PrivilegeSet::new();
        for row in rows {
            let token: String = row.try_get("privilege_type").map_err(backend)?;
            privileges.insert(&token);
        }
        Ok(privileges)
    }
}

#[async_trait]
impl PrivilegeMutation for PostgresGateway {
    async fn grant(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
        tokens: &[String],
    ) -> Result<(), GatewayError> {
        self.execute(sql::render_grant(kind, object, principal, tokens)?)
            .await
    }

    async fn revoke(
        &self,
        kind: ObjectKind,
        object: &ObjectRef,
        principal: &str,
        tokens: &[String],
    ) -> Result<(), GatewayError> {
        let cascade_all = self
            .registry
            .read_marker(kind)
            .is_some_and(|marker| tokens.iter().any(|t| t.eq_ignore_ascii_case(marker)));
        self.execute(sql::render_revoke(kind, object, principal, tokens, cascade_all)?)
            .await
    }
}

#[async_trait]
impl ObjectCatalog for PostgresGateway {
    async fn owned_sequences(&self, table: &ObjectRef) -> Result<Vec<ObjectRef>, GatewayError> {
        Ok(introspect::owned_sequences(&self.pool, table).await?)
    }

    async fn schema_objects(
        &self,
        kind: ObjectKind,
        schema: &str,
    ) -> Result<Vec<ObjectRef>, GatewayError> {
        Ok(introspect::list_objects(&self.pool, kind, Some(schema)).await?.objects)
    }
}
