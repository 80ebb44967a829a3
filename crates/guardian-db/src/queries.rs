use crate::Database;
use crate::models::{ImageContentRow, ImageRow, NewImage};
use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension, Row};

const IMAGE_COLUMNS: &str =
    "id, owner_id, status, confidence, file_name, content_type, size, sha256, created_at";

impl Database {
    // -- Workflow --

    /// Insert a placeholder in `pending` state.
    pub fn create_image(&self, new: &NewImage<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO images (id, owner_id, content, content_type, file_name, size, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    new.id,
                    new.owner_id,
                    new.content,
                    new.content_type,
                    new.file_name,
                    new.content.len() as i64,
                    new.sha256,
                    new.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Attach a verdict. Only a `pending` row can be finalized, and only once.
    pub fn finalize_image(&self, id: &str, status: &str, confidence: f64) -> Result<()> {
        if status == "pending" {
            bail!("Cannot finalize image {} back to pending", id);
        }

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE images SET status = ?2, confidence = ?3 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![id, status, confidence],
            )?;
            if changed == 0 {
                bail!("Image {} is missing or already finalized", id);
            }
            Ok(())
        })
    }

    /// Compensating delete for a placeholder whose workflow failed.
    /// Returns whether a row was removed.
    pub fn discard_image(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM images WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    /// Drop every `pending` row. Only safe while no ingestion is in flight,
    /// i.e. at startup, to clear placeholders left by a process that died
    /// mid-workflow.
    pub fn sweep_pending(&self) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM images WHERE status = 'pending'", [])?))
    }

    // -- Owner-scoped reads and writes --
    //
    // Pending rows belong to an in-flight ingestion and are never visible here.

    pub fn get_image(&self, id: &str, owner_id: &str) -> Result<Option<ImageRow>> {
        self.with_conn(|conn| query_image(conn, id, owner_id))
    }

    /// Newest first; ties on `created_at` fall back to insertion order.
    pub fn list_images(&self, owner_id: &str, limit: u32, offset: u64) -> Result<Vec<ImageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {IMAGE_COLUMNS} FROM images
                 WHERE owner_id = ?1 AND status != 'pending'
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![owner_id, limit, offset as i64], map_image_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_images(&self, owner_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM images WHERE owner_id = ?1 AND status != 'pending'",
                [owner_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    pub fn rename_image(&self, id: &str, owner_id: &str, file_name: &str) -> Result<Option<ImageRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE images SET file_name = ?3
                 WHERE id = ?1 AND owner_id = ?2 AND status != 'pending'",
                rusqlite::params![id, owner_id, file_name],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_image(conn, id, owner_id)
        })
    }

    pub fn delete_image(&self, id: &str, owner_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM images WHERE id = ?1 AND owner_id = ?2 AND status != 'pending'",
                [id, owner_id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn get_image_content(&self, id: &str, owner_id: &str) -> Result<Option<ImageContentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT content, content_type, sha256 FROM images
                     WHERE id = ?1 AND owner_id = ?2 AND status != 'pending'",
                    [id, owner_id],
                    |row| {
                        Ok(ImageContentRow {
                            content: row.get(0)?,
                            content_type: row.get(1)?,
                            sha256: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn query_image(conn: &Connection, id: &str, owner_id: &str) -> Result<Option<ImageRow>> {
    let sql = format!(
        "SELECT {IMAGE_COLUMNS} FROM images
         WHERE id = ?1 AND owner_id = ?2 AND status != 'pending'"
    );
    let row = conn.query_row(&sql, [id, owner_id], map_image_row).optional()?;
    Ok(row)
}

fn map_image_row(row: &Row<'_>) -> rusqlite::Result<ImageRow> {
    Ok(ImageRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        status: row.get(2)?,
        confidence: row.get(3)?,
        file_name: row.get(4)?,
        content_type: row.get(5)?,
        size: row.get(6)?,
        sha256: row.get(7)?,
        created_at: row.get(8)?,
    })
}
