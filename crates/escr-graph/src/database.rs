use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

use crate::accessor::ProjectionContentGraph;
use crate::error::{GraphError, GraphResult, StatementContext};
use crate::schema;
use crate::tables::TableNames;

/// Owner of the SQLite connection backing one content graph.
#[derive(Debug)]
pub struct GraphDatabase {
    conn: Connection,
    tables: TableNames,
}

impl GraphDatabase {
    /// Open (or create) a database file. Parent directories are created.
    pub fn open(path: impl AsRef<Path>, tables: TableNames) -> GraphResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        debug!(path = %path.display(), prefix = tables.prefix(), "content graph opened");
        Ok(Self { conn, tables })
    }

    pub fn open_in_memory(tables: TableNames) -> GraphResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            tables,
        })
    }

    /// Create the schema. Safe to call on an existing database.
    pub fn setup(&self) -> GraphResult<()> {
        schema::create_schema(&self.conn, &self.tables)
    }

    /// Remove all projected state, including the checkpoint.
    pub fn reset(&mut self) -> GraphResult<()> {
        let tx = self.conn.transaction()?;
        schema::truncate_all(&tx, &self.tables)?;
        tx.commit()?;
        info!(prefix = self.tables.prefix(), "content graph reset");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Read-side accessor outside of any transaction.
    pub fn graph(&self) -> ProjectionContentGraph<'_> {
        ProjectionContentGraph::new(&self.conn, &self.tables)
    }

    /// Run `f` inside one transaction. It commits if `f` succeeds and rolls
    /// back otherwise.
    pub fn transactional<T, E>(
        &mut self,
        f: impl FnOnce(&Transaction<'_>, &TableNames) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<GraphError>,
    {
        let tx = self.conn.transaction().map_err(GraphError::from)?;
        let value = f(&tx, &self.tables)?;
        tx.commit().map_err(GraphError::from)?;
        Ok(value)
    }
}

/// Per-projection record of the last applied sequence number.
pub struct Checkpoints;

impl Checkpoints {
    /// The last applied sequence number, `0` if nothing was applied yet.
    pub fn get(conn: &Connection, tables: &TableNames, projection: &str) -> GraphResult<u64> {
        let value: Option<i64> = conn
            .query_row(
                &format!(
                    "SELECT sequencenumber FROM {} WHERE projection = ?1",
                    tables.checkpoint()
                ),
                params![projection],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.map_or(0, |v| v.max(0) as u64))
    }

    pub fn update(
        conn: &Connection,
        tables: &TableNames,
        projection: &str,
        sequence_number: u64,
    ) -> GraphResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO {} (projection, sequencenumber) VALUES (?1, ?2)
                 ON CONFLICT (projection) DO UPDATE SET sequencenumber = excluded.sequencenumber",
                tables.checkpoint()
            ),
            params![projection, sequence_number as i64],
        )
        .during("checkpoint update")?;
        Ok(())
    }
}
