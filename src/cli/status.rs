//! Status command for the autopatch CLI.

use crate::update::{UpdateOrchestrator, UpdateState};

/// Render the persisted state as human-readable lines.
pub fn format_status(state: &UpdateState) -> Vec<String> {
    let mut lines = vec![format!("Phase:            {}", state.phase)];

    if let Some(target) = &state.target_version {
        lines.push(format!("Target version:   {}", target));
    }
    if let Some(previous) = &state.previous_version {
        lines.push(format!("Previous version: {}", previous));
    }
    if let Some(committed) = &state.committed_version {
        lines.push(format!("Committed:        {}", committed));
    }
    if let Some(backup) = &state.backup {
        lines.push(format!("Backup:           {}", backup.path.display()));
    }
    if let Some(due) = state.health_check_due_at {
        lines.push(format!("Health check due: {}", due.to_rfc3339()));
    }
    if let Some(last_check) = state.last_check {
        lines.push(format!("Last check:       {}", last_check.to_rfc3339()));
    }
    if let Some(outcome) = &state.last_outcome {
        lines.push(format!("Last outcome:     {}", outcome));
    }
    if let Some(reason) = &state.flagged_reason {
        lines.push(format!("FLAGGED:          {}", reason));
    }
    lines
}

/// `autopatch status`.
pub fn handle_status_command(orchestrator: &UpdateOrchestrator) -> i32 {
    let state = orchestrator.status();
    for line in format_status(&state) {
        println!("{}", line);
    }

    let audit = orchestrator.audit_log();
    let entries = audit.entries();
    if let Some(last) = entries.last() {
        println!("Audit log:        {} ({} entries)", audit.path().display(), entries.len());
        println!("Last error:       {}", last);
    }

    if state.is_flagged() {
        super::update::EXIT_MANUAL_INTERVENTION
    } else {
        super::update::EXIT_OK
    }
}
