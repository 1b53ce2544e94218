//! PostgreSQL target: pooled connections and transactional batch inserts.

mod params;
pub mod tls;

use async_trait::async_trait;
use deadpool_postgres::{
    Hook, HookError, Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime,
};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Config as PgConfig, NoTls, Statement};
use tracing::{debug, info, warn};

use crate::config::{validate_pool, TargetConfig};
use crate::core::traits::{BatchWriter, InsertOutcome, TargetStore};
use crate::core::value::Row;
use crate::error::{MigrateError, Result};

use self::tls::SslMode;

const ROW_SAVEPOINT: &str = "copy_row";

/// Pooled PostgreSQL target.
pub struct PgPool {
    pool: Pool,
}

impl PgPool {
    /// Create the pool and verify the server is reachable.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let bounds = &config.pool;
        validate_pool("target", bounds)?;

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.connect_timeout(bounds.connect_timeout());

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        let mgr = match tls::connector(ssl_mode)? {
            Some(connector) => Manager::from_config(pg_config, connector, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, NoTls, mgr_config)
            }
        };

        let max_lifetime = bounds.max_lifetime();
        let pool = Pool::builder(mgr)
            .max_size(bounds.max_open as usize)
            .runtime(Runtime::Tokio1)
            .create_timeout(Some(bounds.connect_timeout()))
            .wait_timeout(Some(bounds.connect_timeout()))
            .pre_recycle(Hook::sync_fn(move |_client, metrics| {
                if metrics.age() > max_lifetime {
                    Err(HookError::Message("connection exceeded max_lifetime".into()))
                } else {
                    Ok(())
                }
            }))
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let client = pool.get().await.map_err(|e| {
            MigrateError::Connection(format!(
                "cannot connect to PostgreSQL {}:{}/{}: {}",
                config.host, config.port, config.database, e
            ))
        })?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::Connection(format!("PostgreSQL ping failed: {}", e)))?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{} (max_open={}, max_lifetime={}s)",
            config.host, config.port, config.database, bounds.max_open, bounds.max_lifetime_secs
        );
        debug!(
            "max_idle={} requested; the pool keeps up to max_open idle connections",
            bounds.max_idle
        );

        Ok(Self { pool })
    }

    async fn get_client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL connection"))
    }
}

#[async_trait]
impl TargetStore for PgPool {
    async fn open_writer(&self, insert_sql: &str) -> Result<Box<dyn BatchWriter>> {
        let client = self.get_client().await?;
        Ok(Box::new(PgBatchWriter {
            client,
            insert_sql: insert_sql.to_string(),
            statement: None,
        }))
    }

    async fn has_rows(&self, qualified_table: &str) -> Result<bool> {
        let client = self.get_client().await?;
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {})", qualified_table);
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.try_get::<_, bool>(0)?)
    }

    async fn truncate(&self, qualified_table: &str) -> Result<()> {
        let client = self.get_client().await?;
        client
            .batch_execute(&format!("TRUNCATE TABLE {}", qualified_table))
            .await?;
        Ok(())
    }
}

/// Runs the prepared INSERT inside explicit transactions on one pooled
/// connection. The statement is prepared on `begin` and discarded when the
/// transaction ends.
pub struct PgBatchWriter {
    client: Object,
    insert_sql: String,
    statement: Option<Statement>,
}

impl PgBatchWriter {
    fn statement(&self) -> Result<&Statement> {
        self.statement
            .as_ref()
            .ok_or_else(|| MigrateError::Config("insert issued outside a transaction".into()))
    }
}

fn bind(row: &Row) -> Vec<&(dyn ToSql + Sync)> {
    row.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl BatchWriter for PgBatchWriter {
    async fn begin(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        let statement = self.client.prepare(&self.insert_sql).await?;
        self.statement = Some(statement);
        Ok(())
    }

    async fn insert(&mut self, row: &Row) -> Result<()> {
        let statement = self.statement()?;
        self.client.execute(statement, &bind(row)).await?;
        Ok(())
    }

    async fn insert_isolated(&mut self, row: &Row) -> Result<InsertOutcome> {
        let statement = self.statement()?;
        self.client
            .batch_execute(&format!("SAVEPOINT {}", ROW_SAVEPOINT))
            .await?;

        match self.client.execute(statement, &bind(row)).await {
            Ok(_) => {
                self.client
                    .batch_execute(&format!("RELEASE SAVEPOINT {}", ROW_SAVEPOINT))
                    .await?;
                Ok(InsertOutcome::Inserted)
            }
            Err(e) => {
                self.client
                    .batch_execute(&format!("ROLLBACK TO SAVEPOINT {}", ROW_SAVEPOINT))
                    .await?;
                Ok(InsertOutcome::Rejected(e.to_string()))
            }
        }
    }

    async fn commit(&mut self) -> Result<()> {
        self.statement = None;
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.statement = None;
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }
}
