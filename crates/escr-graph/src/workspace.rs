use rusqlite::{params, Connection, Row};

use escr_types::{ContentStreamId, WorkspaceName, WorkspaceStatus};

use crate::error::{GraphResult, StatementContext};
use crate::row;
use crate::tables::TableNames;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceRecord {
    pub name: WorkspaceName,
    pub base_workspace_name: Option<WorkspaceName>,
    pub current_content_stream_id: ContentStreamId,
    pub status: WorkspaceStatus,
}

impl WorkspaceRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row::parsed(row, 0)?,
            base_workspace_name: row::parsed_opt(row, 1)?,
            current_content_stream_id: row::parsed(row, 2)?,
            status: row::parsed(row, 3)?,
        })
    }

    pub fn add(&self, conn: &Connection, tables: &TableNames) -> GraphResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO {} (name, baseworkspacename, currentcontentstreamid, status)
                 VALUES (?1, ?2, ?3, ?4)",
                tables.workspace()
            ),
            params![
                self.name.as_str(),
                self.base_workspace_name.as_ref().map(|n| n.as_str()),
                self.current_content_stream_id.as_str(),
                self.status.as_str(),
            ],
        )
        .during("workspace insert")?;
        Ok(())
    }
}

/// Column-level updates of workspace rows.
pub struct Workspaces;

impl Workspaces {
    pub fn update_content_stream(
        conn: &Connection,
        tables: &TableNames,
        name: &WorkspaceName,
        content_stream_id: &ContentStreamId,
    ) -> GraphResult<()> {
        conn.execute(
            &format!(
                "UPDATE {} SET currentcontentstreamid = ?2 WHERE name = ?1",
                tables.workspace()
            ),
            params![name.as_str(), content_stream_id.as_str()],
        )
        .during("workspace content stream update")?;
        Ok(())
    }

    pub fn update_base_workspace(
        conn: &Connection,
        tables: &TableNames,
        name: &WorkspaceName,
        base: &WorkspaceName,
    ) -> GraphResult<()> {
        conn.execute(
            &format!("UPDATE {} SET baseworkspacename = ?2 WHERE name = ?1", tables.workspace()),
            params![name.as_str(), base.as_str()],
        )
        .during("workspace base update")?;
        Ok(())
    }

    pub fn update_status(
        conn: &Connection,
        tables: &TableNames,
        name: &WorkspaceName,
        status: WorkspaceStatus,
    ) -> GraphResult<()> {
        conn.execute(
            &format!("UPDATE {} SET status = ?2 WHERE name = ?1", tables.workspace()),
            params![name.as_str(), status.as_str()],
        )
        .during("workspace status update")?;
        Ok(())
    }

    /// Mark every workspace based on `base` as outdated.
    pub fn mark_dependents_outdated(
        conn: &Connection,
        tables: &TableNames,
        base: &WorkspaceName,
    ) -> GraphResult<usize> {
        conn.execute(
            &format!(
                "UPDATE {} SET status = ?2 WHERE baseworkspacename = ?1",
                tables.workspace()
            ),
            params![base.as_str(), WorkspaceStatus::Outdated.as_str()],
        )
        .during("dependent workspace update")
    }

    pub fn remove(conn: &Connection, tables: &TableNames, name: &WorkspaceName) -> GraphResult<()> {
        conn.execute(
            &format!("DELETE FROM {} WHERE name = ?1", tables.workspace()),
            params![name.as_str()],
        )
        .during("workspace removal")?;
        Ok(())
    }
}
