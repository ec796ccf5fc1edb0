use rusqlite::{params, Connection, Row};

use escr_types::{ContentStreamId, ContentStreamStatus};

use crate::error::{GraphResult, StatementContext};
use crate::row;
use crate::tables::TableNames;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentStreamRecord {
    pub id: ContentStreamId,
    pub version: u64,
    pub source_content_stream_id: Option<ContentStreamId>,
    pub source_content_stream_version: Option<u64>,
    pub status: ContentStreamStatus,
    /// Soft-deletion flag; removed streams keep their row as fork lineage.
    pub removed: bool,
}

impl ContentStreamRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row::parsed(row, 0)?,
            version: row.get::<_, i64>(1)? as u64,
            source_content_stream_id: row::parsed_opt(row, 2)?,
            source_content_stream_version: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
            status: row::parsed(row, 4)?,
            removed: row.get(5)?,
        })
    }

    pub fn add(&self, conn: &Connection, tables: &TableNames) -> GraphResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO {} (id, version, sourcecontentstreamid, sourcecontentstreamversion,
                    status, removed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                tables.content_stream()
            ),
            params![
                self.id.as_str(),
                self.version as i64,
                self.source_content_stream_id.as_ref().map(|id| id.as_str()),
                self.source_content_stream_version.map(|v| v as i64),
                self.status.as_str(),
                self.removed,
            ],
        )
        .during("content stream insert")?;
        Ok(())
    }
}

/// Column-level updates of content stream rows.
pub struct ContentStreams;

impl ContentStreams {
    pub fn update_status(
        conn: &Connection,
        tables: &TableNames,
        id: &ContentStreamId,
        status: ContentStreamStatus,
    ) -> GraphResult<()> {
        conn.execute(
            &format!("UPDATE {} SET status = ?2 WHERE id = ?1", tables.content_stream()),
            params![id.as_str(), status.as_str()],
        )
        .during("content stream status update")?;
        Ok(())
    }

    pub fn update_version(
        conn: &Connection,
        tables: &TableNames,
        id: &ContentStreamId,
        version: u64,
    ) -> GraphResult<()> {
        conn.execute(
            &format!("UPDATE {} SET version = ?2 WHERE id = ?1", tables.content_stream()),
            params![id.as_str(), version as i64],
        )
        .during("content stream version update")?;
        Ok(())
    }

    pub fn mark_removed(conn: &Connection, tables: &TableNames, id: &ContentStreamId) -> GraphResult<()> {
        conn.execute(
            &format!("UPDATE {} SET removed = 1 WHERE id = ?1", tables.content_stream()),
            params![id.as_str()],
        )
        .during("content stream removal")?;
        Ok(())
    }
}
