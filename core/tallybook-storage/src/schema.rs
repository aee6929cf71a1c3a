use rusqlite::Connection;

pub(crate) fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS license_records (
            id TEXT PRIMARY KEY,
            token TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('active', 'expired', 'superseded')),
            activated_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            company_hint TEXT,
            email_hint TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_license_records_single_active
            ON license_records(status) WHERE status = 'active';

        CREATE TABLE IF NOT EXISTS login_counters (
            identity TEXT PRIMARY KEY,
            count INTEGER NOT NULL CHECK (count > 0),
            first_failure TEXT NOT NULL,
            last_failure TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recovery_windows (
            identity TEXT PRIMARY KEY,
            opened_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            consumed INTEGER NOT NULL DEFAULT 0,
            consumed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS credentials (
            identity TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            timestamp TEXT NOT NULL,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            severity TEXT NOT NULL,
            outcome TEXT NOT NULL,
            detail TEXT NOT NULL,
            event_json TEXT NOT NULL,
            prev_hash TEXT NOT NULL,
            hash TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_log_actor ON audit_log(actor);
        "#,
    )
}
