use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_sprint_history",
        sql: r#"
CREATE TABLE IF NOT EXISTS sprint_history (
    sprint_id UBIGINT NOT NULL,
    sprint_name TEXT NOT NULL,
    start_date TEXT,
    end_date TEXT NOT NULL,
    achieved_points DOUBLE NOT NULL CHECK (achieved_points >= 0),
    achieved_seconds UBIGINT NOT NULL,
    duration_days DOUBLE CHECK (duration_days >= 0),
    available_days DOUBLE CHECK (available_days >= 0),
    seq BIGINT NOT NULL
);
"#,
    },
    Migration {
        version: "0002_sprint_history_seq",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_sprint_history_seq ON sprint_history(seq);
CREATE INDEX IF NOT EXISTS idx_sprint_history_sprint ON sprint_history(sprint_id);
"#,
    },
];

/// Bring the schema up to date; already-applied versions are skipped.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
            tracing::debug!(version = migration.version, "applied history migration");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let connection = Connection::open_in_memory().expect("in-memory db");
        apply_migrations(&connection).expect("first run");
        apply_migrations(&connection).expect("second run");

        let versions: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(versions, MIGRATIONS.len() as i64);
    }
}
