//! Database handle

use crate::connection::{Connection, QueryResult, TlsRegistry};
use crate::descriptor::NormalizedDescriptor;
use crate::migrate::{self, EntityShape, ReconcileReport};
use crate::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Long-lived database handle
///
/// Cheap to clone and safe to share across tasks. Every clone refers to the
/// same single connection; concurrent callers are serialized.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> tidb_bootstrap::Result<()> {
/// use tidb_bootstrap::connection::TlsRegistry;
/// use tidb_bootstrap::descriptor::normalize;
/// use tidb_bootstrap::Database;
///
/// let registry = TlsRegistry::new();
/// let descriptor = normalize("root:@tcp(127.0.0.1:4000)/test", &registry, None)?;
/// let db = Database::open(&descriptor, &registry).await?;
///
/// db.ping().await?;
/// let result = db.query("SELECT VERSION()").await?;
/// println!("{:?}", result.rows);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    descriptor: Arc<str>,
}

impl Database {
    /// Open a connection described by a normalized descriptor
    ///
    /// Named trust profiles referenced by the descriptor are looked up in
    /// `registry`.
    pub async fn open(descriptor: &NormalizedDescriptor, registry: &TlsRegistry) -> Result<Self> {
        let config = descriptor.descriptor().to_config(registry)?;
        let conn = Connection::connect(&config).await?;
        Ok(Self::from_connection(conn, descriptor.redacted()))
    }

    /// Wrap an established connection
    pub fn from_connection(conn: Connection, descriptor: impl Into<Arc<str>>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            descriptor: descriptor.into(),
        }
    }

    /// Descriptor with the password masked
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Execute a statement, returning the number of affected rows
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        self.conn.lock().await.execute(sql).await
    }

    /// Run a query and collect its rows
    pub async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.conn.lock().await.query(sql).await
    }

    /// Check that the server is alive
    pub async fn ping(&self) -> Result<()> {
        self.conn.lock().await.ping().await
    }

    /// Reconcile the schema of `entities`
    pub async fn reconcile(&self, entities: &[EntityShape]) -> Result<ReconcileReport> {
        let mut conn = self.conn.lock().await;
        migrate::reconcile(&mut conn, entities).await
    }

    /// Server version reported in the handshake
    pub async fn server_version(&self) -> String {
        self.conn.lock().await.server_version().to_string()
    }

    /// Whether the connection is encrypted
    pub async fn is_tls(&self) -> bool {
        self.conn.lock().await.is_tls()
    }

    /// Close the underlying connection
    ///
    /// Affects every clone. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        self.conn.lock().await.close().await
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
