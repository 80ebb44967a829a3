use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (images)");
        conn.execute_batch(
            "
            CREATE TABLE images (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL,
                content         BLOB NOT NULL,
                content_type    TEXT NOT NULL,
                file_name       TEXT,
                size            INTEGER NOT NULL,
                sha256          TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'safe', 'unsafe')),
                confidence      REAL,
                created_at      TEXT NOT NULL,
                CHECK (
                    (status = 'pending' AND confidence IS NULL)
                    OR (status != 'pending' AND confidence IS NOT NULL)
                )
            );

            CREATE INDEX idx_images_owner
                ON images(owner_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
