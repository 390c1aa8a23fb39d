//! Session status dashboard command.

use anyhow::Result;
use chrono::Utc;
use console::style;

use sessionvault_core::session::RestoreOutcome;

use crate::state::AppState;

/// Display the restore outcome, security metadata, and storage summary.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let session = state.store.current_session();
    let security = state.store.security_metadata();
    let outcome = state.store.restore_outcome();
    let entries = state.stored_entries().await?;
    let now = Utc::now();

    let servers = session.as_ref().map_or(0, |s| s.servers.len());
    let archived = session
        .as_ref()
        .map_or(0, |s| s.servers.iter().filter(|srv| srv.archived).count());
    let messages = session.as_ref().map_or(0, |s| s.message_history.len());
    let contexts = session.as_ref().map_or(0, |s| s.file_contexts.len());

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "backend": state.backend_label(),
            "restore_outcome": outcome.map(|o| o.to_string()),
            "session_id": session.as_ref().map(|s| s.session_id.to_string()),
            "servers": { "total": servers, "archived": archived },
            "messages": messages,
            "file_contexts": contexts,
            "security": security.as_ref().map(|m| serde_json::json!({
                "encryption_version": m.encryption_version,
                "last_validation": m.last_validation,
                "age_secs": m.age_secs(now),
                "access_count": m.access_count,
            })),
            "stored_entries": entries.iter().map(|e| serde_json::json!({
                "key": e.key,
                "size": e.size,
                "updated_at": e.updated_at,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} SessionVault v{}",
        style("🔒").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Session ──").dim());
    let outcome_display = match outcome {
        Some(RestoreOutcome::Restored) => style("restored".to_string()).green(),
        Some(RestoreOutcome::Fallback) => style("fallback (in-memory only)".to_string()).red(),
        Some(other) => style(other.to_string()).yellow(),
        None => style("not initialized".to_string()).dim(),
    };
    println!("  Outcome:  {outcome_display}");
    if let Some(session) = &session {
        println!("  ID:       {}", style(session.session_id).dim());
    }
    println!(
        "  Servers:  {} ({} archived)",
        style(servers).bold(),
        archived
    );
    println!("  Messages: {}", style(messages).bold());
    println!("  Contexts: {}", style(contexts).bold());
    println!();

    println!("  {}", style("── Security ──").dim());
    match &security {
        Some(meta) => {
            let age = meta.age_secs(now);
            let limit = state.config.validation_interval_secs as i64;
            let age_display = if age > limit {
                style(format!("{age}s")).red()
            } else {
                style(format!("{age}s")).green()
            };
            println!("  Version:  {}", meta.encryption_version);
            println!("  Age:      {age_display} (limit {limit}s)");
            println!("  Accesses: {}", meta.access_count);
        }
        None => println!("  {}", style("no security metadata").yellow()),
    }
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Backend:  {}", state.backend_label());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    for entry in &entries {
        println!(
            "  {} {} ({} bytes, {})",
            style("•").dim(),
            entry.key,
            entry.size,
            entry.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();

    Ok(())
}
