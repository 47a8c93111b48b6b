use sqlx::PgPool;

const MIGRATIONS: &[(&str, &str)] = &[(
    "001_init_schema",
    include_str!("../../sql/001_init_schema.sql"),
)];

pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS "_migrations" (
            "id" SERIAL PRIMARY KEY,
            "name" TEXT NOT NULL UNIQUE,
            "applied_at" TIMESTAMP NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    let applied: Vec<String> =
        sqlx::query_scalar(r#"SELECT "name" FROM "_migrations" ORDER BY "id""#)
            .fetch_all(pool)
            .await?;

    let mut applied_count = 0;

    for (name, sql) in pending(MIGRATIONS, &applied) {
        tracing::info!(migration = name, "Applying migration...");

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| MigrationError::Migration {
                name: name.to_string(),
                source: e,
            })?;
        sqlx::query(r#"INSERT INTO "_migrations" ("name") VALUES ($1)"#)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        applied_count += 1;
        tracing::info!(migration = name, "Migration applied");
    }

    if applied_count > 0 {
        tracing::info!(count = applied_count, "Database migrations completed");
    } else {
        tracing::info!("Database is up to date");
    }

    Ok(())
}

fn pending<'a>(
    all: &'a [(&'a str, &'a str)],
    applied: &[String],
) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    let applied: Vec<String> = applied.to_vec();
    all.iter()
        .copied()
        .filter(move |(name, _)| !applied.iter().any(|done| done == name))
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Migration '{name}' failed: {source}")]
    Migration {
        name: String,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_skips_applied_names() {
        let all = [("001_a", "SELECT 1"), ("002_b", "SELECT 2")];
        let applied = vec!["001_a".to_string()];
        let names: Vec<&str> = pending(&all, &applied).map(|(name, _)| name).collect();
        assert_eq!(names, vec!["002_b"]);
    }

    #[test]
    fn embedded_schema_creates_core_tables() {
        let (_, sql) = MIGRATIONS[0];
        for table in ["\"users\"", "\"courses\"", "\"submissions\"", "\"ai_messages\""] {
            assert!(sql.contains(table), "schema is missing {table}");
        }
    }
}
