//! Health and maintenance commands.

use crate::cli::output;
use crate::core::domain::HealthStatus;
use crate::core::service::Keysmith;
use crate::error::Result;

/// Report engine reachability. Exits non-zero when the engine is down.
pub fn execute(app: &Keysmith, json: bool) -> Result<()> {
    let health = app.health();

    if json {
        output::data(&serde_json::to_string_pretty(&health)?);
    } else {
        match health.status {
            HealthStatus::Healthy => output::success("engine reachable"),
            HealthStatus::Degraded => output::warn("engine reachable, service degraded"),
            HealthStatus::Unavailable => output::error("engine unavailable"),
        }
        output::kv("engine", health.engine);
        if let Some(version) = &health.engine_version {
            output::kv("version", version);
        }
        output::kv("keyring", app.keyring().dir().display());
        output::kv("staging", app.staging().dir().display());
        if let Some(detail) = &health.detail {
            output::kv("detail", detail);
        }
    }

    if !health.is_live() {
        std::process::exit(1);
    }
    Ok(())
}

/// Remove orphaned staged files now instead of waiting for the next start.
pub fn sweep(app: &Keysmith) -> Result<()> {
    let removed = app.sweep_staging()?;
    if removed == 0 {
        output::dimmed("nothing to sweep");
    } else {
        output::success(&format!(
            "removed {} orphaned file{}",
            removed,
            if removed == 1 { "" } else { "s" }
        ));
    }
    Ok(())
}
