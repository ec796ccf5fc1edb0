use rusqlite::Connection;
use tracing::info;

use crate::error::GraphResult;
use crate::tables::TableNames;

/// Create all tables and indexes if they do not exist yet.
pub fn create_schema(conn: &Connection, tables: &TableNames) -> GraphResult<()> {
    let node = tables.node();
    let hierarchy = tables.hierarchy_relation();
    let reference = tables.reference_relation();
    let restriction = tables.restriction_relation();
    let points = tables.dimension_space_points();
    let content_stream = tables.content_stream();
    let workspace = tables.workspace();
    let checkpoint = tables.checkpoint();

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {node} (
            relationanchorpoint INTEGER PRIMARY KEY AUTOINCREMENT,
            nodeaggregateid TEXT NOT NULL,
            origindimensionspacepoint TEXT NOT NULL,
            origindimensionspacepointhash TEXT NOT NULL,
            nodetypename TEXT NOT NULL,
            classification TEXT NOT NULL,
            name TEXT NULL,
            properties TEXT NOT NULL,
            created TEXT NOT NULL,
            lastmodified TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS {node}_aggregate ON {node} (nodeaggregateid);

        CREATE TABLE IF NOT EXISTS {hierarchy} (
            parentnodeanchor INTEGER NOT NULL,
            childnodeanchor INTEGER NOT NULL,
            contentstreamid TEXT NOT NULL,
            dimensionspacepointhash TEXT NOT NULL,
            position INTEGER NOT NULL,
            subtreetags TEXT NOT NULL DEFAULT '{{}}',
            PRIMARY KEY (childnodeanchor, contentstreamid, dimensionspacepointhash)
        );
        CREATE INDEX IF NOT EXISTS {hierarchy}_parent
            ON {hierarchy} (parentnodeanchor, contentstreamid, dimensionspacepointhash, position);
        CREATE INDEX IF NOT EXISTS {hierarchy}_subgraph
            ON {hierarchy} (contentstreamid, dimensionspacepointhash);

        CREATE TABLE IF NOT EXISTS {points} (
            hash TEXT PRIMARY KEY,
            dimensionspacepoint TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {reference} (
            nodeanchorpoint INTEGER NOT NULL,
            name TEXT NOT NULL,
            position INTEGER NOT NULL,
            destinationnodeaggregateid TEXT NOT NULL,
            properties TEXT NULL,
            PRIMARY KEY (nodeanchorpoint, name, position)
        );

        CREATE TABLE IF NOT EXISTS {restriction} (
            contentstreamid TEXT NOT NULL,
            dimensionspacepointhash TEXT NOT NULL,
            originnodeaggregateid TEXT NOT NULL,
            affectednodeaggregateid TEXT NOT NULL,
            PRIMARY KEY (contentstreamid, dimensionspacepointhash,
                         originnodeaggregateid, affectednodeaggregateid)
        );
        CREATE INDEX IF NOT EXISTS {restriction}_affected
            ON {restriction} (contentstreamid, dimensionspacepointhash, affectednodeaggregateid);

        CREATE TABLE IF NOT EXISTS {content_stream} (
            id TEXT PRIMARY KEY,
            version INTEGER NOT NULL DEFAULT 0,
            sourcecontentstreamid TEXT NULL,
            sourcecontentstreamversion INTEGER NULL,
            status TEXT NOT NULL,
            removed INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS {workspace} (
            name TEXT PRIMARY KEY,
            baseworkspacename TEXT NULL,
            currentcontentstreamid TEXT NOT NULL,
            status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {checkpoint} (
            projection TEXT PRIMARY KEY,
            sequencenumber INTEGER NOT NULL
        );
        "#
    ))?;
    info!(prefix = tables.prefix(), "content graph schema ready");
    Ok(())
}

/// Delete every row from every table, keeping the schema.
pub fn truncate_all(conn: &Connection, tables: &TableNames) -> GraphResult<()> {
    let statements: String = tables
        .all()
        .iter()
        .map(|table| format!("DELETE FROM {table};"))
        .collect();
    conn.execute_batch(&statements)?;
    info!(prefix = tables.prefix(), "content graph truncated");
    Ok(())
}
