//! Prompt assembly for the external agent CLIs.

use crate::types::LaunchRequest;

/// Build the prompt passed to the agent CLI.
///
/// Sections appear in a fixed order: task, mode, scenario root, and an
/// "Additional Context" section only when the notes are non-blank.
pub fn compose_prompt(request: &LaunchRequest) -> String {
    let mut sections = Vec::new();

    sections.push(format!("# Task\n\n{}\n", request.task));
    sections.push(format!("**Mode:** {}\n", request.mode));
    sections.push(format!(
        "**Scenario root:** {}\n",
        request.scenario_root.display()
    ));

    let notes = request.notes.trim();
    if !notes.is_empty() {
        sections.push(format!("# Additional Context\n\n{notes}\n"));
    }

    sections.join("\n---\n\n")
}
