//! Embedded schema migrations for the Postgres store.

use sqlx::PgPool;

/// Apply every pending migration from `ident_core/migrations/`.
///
/// Safe to call on each start; applied versions are skipped.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
