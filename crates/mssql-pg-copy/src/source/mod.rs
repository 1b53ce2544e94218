//! SQL Server source: catalog reader and row streaming.

mod types;

pub use types::{decode_column, decode_row};

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use futures::TryStreamExt;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, QueryItem};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::{validate_pool, SourceConfig};
use crate::core::identifier::qualify_mssql;
use crate::core::schema::{Column, QualifiedName};
use crate::core::traits::{RowSink, SourceStore};
use crate::error::{MigrateError, Result};

/// Connection manager for bb8 pool with tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: SourceConfig,
}

impl TiberiusConnectionManager {
    fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        if self.config.encrypt {
            if self.config.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Pooled SQL Server source.
pub struct MssqlPool {
    pool: Pool<TiberiusConnectionManager>,
}

impl MssqlPool {
    /// Create the pool and verify the server is reachable.
    pub async fn new(config: SourceConfig) -> Result<Self> {
        let bounds = config.pool.clone();
        validate_pool("source", &bounds)?;
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(bounds.max_open)
            .min_idle(Some(bounds.max_idle))
            .max_lifetime(Some(bounds.max_lifetime()))
            .connection_timeout(bounds.connect_timeout())
            .build(manager)
            .await
            .map_err(|e| {
                MigrateError::Connection(format!(
                    "cannot connect to SQL Server {}:{}/{}: {}",
                    config.host, config.port, config.database, e
                ))
            })?;

        {
            let mut conn = pool.get().await.map_err(|e| {
                MigrateError::Connection(format!(
                    "cannot connect to SQL Server {}:{}/{}: {}",
                    config.host, config.port, config.database, e
                ))
            })?;
            conn.simple_query("SELECT 1")
                .await
                .map_err(|e| MigrateError::Connection(format!("SQL Server ping failed: {}", e)))?
                .into_row()
                .await
                .map_err(|e| MigrateError::Connection(format!("SQL Server ping failed: {}", e)))?;
        }

        info!(
            "Connected to MSSQL: {}:{}/{} (max_open={}, max_idle={}, max_lifetime={}s)",
            config.host,
            config.port,
            config.database,
            bounds.max_open,
            bounds.max_idle,
            bounds.max_lifetime_secs
        );

        Ok(Self { pool })
    }

    /// Get a pooled connection.
    async fn get_client(&self) -> Result<PooledConnection<'_, TiberiusConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting MSSQL connection"))
    }

    /// Run a parameterized catalog query and return the first result set.
    async fn catalog_query(
        &self,
        context: &str,
        sql: &str,
        params: &[&str],
    ) -> Result<Vec<tiberius::Row>> {
        let mut client = self.get_client().await?;
        let mut query = Query::new(sql);
        for p in params {
            query.bind(*p);
        }

        let stream = query
            .query(&mut client)
            .await
            .map_err(|e| MigrateError::metadata(context, e))?;
        stream
            .into_first_result()
            .await
            .map_err(|e| MigrateError::metadata(context, e))
    }

    /// Run a scalar `bigint` query.
    async fn scalar_i64(&self, context: &str, sql: &str, params: &[&str]) -> Result<i64> {
        let rows = self.catalog_query(context, sql, params).await?;
        let row = rows
            .first()
            .ok_or_else(|| MigrateError::metadata(context, "query returned no rows"))?;
        row.try_get::<i64, _>(0)
            .map(|v| v.unwrap_or(0))
            .map_err(|e| MigrateError::metadata(context, e))
    }
}

#[async_trait]
impl SourceStore for MssqlPool {
    async fn list_tables(&self, schemas: &[String]) -> Result<Vec<QualifiedName>> {
        if schemas.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (1..=schemas.len()).map(|i| format!("@P{}", i)).collect();
        let sql = format!(
            "SELECT TABLE_SCHEMA, TABLE_NAME \
             FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA IN ({}) \
             ORDER BY TABLE_SCHEMA, TABLE_NAME",
            placeholders.join(", ")
        );
        let params: Vec<&str> = schemas.iter().map(String::as_str).collect();

        let rows = self.catalog_query("list tables", &sql, &params).await?;
        let tables: Vec<QualifiedName> = rows
            .iter()
            .map(|row| {
                QualifiedName::new(
                    row.get::<&str, _>(0).unwrap_or_default(),
                    row.get::<&str, _>(1).unwrap_or_default(),
                )
            })
            .collect();

        info!(
            "Discovered {} base tables in schemas [{}]",
            tables.len(),
            schemas.join(", ")
        );
        Ok(tables)
    }

    async fn load_columns(&self, table: &QualifiedName) -> Result<Vec<Column>> {
        let query = r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE,
                CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
                ORDINAL_POSITION
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
            ORDER BY ORDINAL_POSITION
        "#;

        let context = format!("columns of {}", table);
        let rows = self
            .catalog_query(&context, query, &[table.schema.as_str(), table.name.as_str()])
            .await?;

        let columns: Vec<Column> = rows
            .iter()
            .map(|row| Column {
                name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                data_type: row.get::<&str, _>(1).unwrap_or_default().to_string(),
                is_nullable: row.get::<i32, _>(2).unwrap_or(0) == 1,
                ordinal: row.get::<i32, _>(3).unwrap_or(0),
            })
            .collect();

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn load_primary_key(&self, table: &QualifiedName) -> Result<Vec<String>> {
        let query = r#"
            SELECT c.name
            FROM sys.indexes i
            JOIN sys.index_columns ic ON i.object_id = ic.object_id AND i.index_id = ic.index_id
            JOIN sys.columns c ON ic.object_id = c.object_id AND ic.column_id = c.column_id
            JOIN sys.tables t ON i.object_id = t.object_id
            JOIN sys.schemas s ON t.schema_id = s.schema_id
            WHERE i.is_primary_key = 1 AND s.name = @P1 AND t.name = @P2
            ORDER BY ic.key_ordinal
        "#;

        let context = format!("primary key of {}", table);
        let rows = self
            .catalog_query(&context, query, &[table.schema.as_str(), table.name.as_str()])
            .await?;

        let pk: Vec<String> = rows
            .iter()
            .map(|row| row.get::<&str, _>(0).unwrap_or_default().to_string())
            .collect();

        debug!("Primary key for {}: {:?}", table, pk);
        Ok(pk)
    }

    async fn row_count(&self, table: &QualifiedName) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT_BIG(1) FROM {}",
            qualify_mssql(&table.schema, &table.name)?
        );
        let count = self
            .scalar_i64(&format!("row count of {}", table), &sql, &[])
            .await?;
        debug!("Row count for {}: {}", table, count);
        Ok(count)
    }

    async fn size_mb(&self, table: &QualifiedName) -> Result<i64> {
        let query = r#"
            SELECT CAST(ISNULL(SUM(used_page_count), 0) * 8 / 1024 AS BIGINT)
            FROM sys.dm_db_partition_stats
            WHERE object_id = OBJECT_ID(@P1)
        "#;
        let object_name = qualify_mssql(&table.schema, &table.name)?;
        let size = self
            .scalar_i64(&format!("size of {}", table), query, &[object_name.as_str()])
            .await?;
        debug!("Size of {}: {} MB", table, size);
        Ok(size)
    }

    async fn stream_rows(&self, select_sql: &str, sink: &mut dyn RowSink) -> Result<u64> {
        let mut client = self.get_client().await?;
        debug!("Streaming: {}", select_sql);

        let mut stream = client.simple_query(select_sql).await?;
        let mut read = 0u64;
        while let Some(item) = stream.try_next().await? {
            if let QueryItem::Row(row) = item {
                sink.accept(decode_row(row)?).await?;
                read += 1;
            }
        }

        Ok(read)
    }
}
