use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema scripts in order; entry `n` upgrades `user_version` from `n` to `n + 1`.
const MIGRATIONS: &[(&str, &str)] = &[("schema_v1.sql", include_str!("schemas/schema_v1.sql"))];

pub fn schema_version() -> i32 {
    MIGRATIONS.len() as i32
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let target = schema_version();
    let found: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if found < 0 {
        bail!("tour store schema version {found} is invalid");
    }
    if found > target {
        bail!("tour store schema v{found} is newer than this build supports (v{target})");
    }
    if found == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    for (name, script) in &MIGRATIONS[found as usize..] {
        tx.execute_batch(script)
            .with_context(|| format!("failed to execute {name}"))?;
    }

    tx.pragma_update(None, "user_version", target)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    info!("Tour store schema migrated v{found} -> v{target}");
    Ok(())
}
