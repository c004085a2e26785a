//! Intent reminder injection
//!
//! Long agent sessions drift away from the original objective. Before every
//! turn the workflow restates the objective and the allowed scope as a
//! delimited system message at the head of the conversation.
//!
//! Wrapping is pure and idempotent: reminder blocks from earlier turns are
//! stripped from every message before the fresh one is prepended, so the
//! conversation never accumulates stale reminders.

use crate::turn::{AgentTurnInput, TurnMessage};

/// Opening delimiter of a reminder block
pub const REMINDER_BEGIN: &str = "<<ringfence:intent-reminder>>";
/// Closing delimiter of a reminder block
pub const REMINDER_END: &str = "<</ringfence:intent-reminder>>";

/// Prepends the objective and allowed scope to every agent turn
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentReminderInjector;

impl IntentReminderInjector {
    /// Create injector
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Strip earlier reminders and prepend a fresh one
    #[must_use]
    pub fn wrap(
        &self,
        input: &AgentTurnInput,
        objective: &str,
        policy_summary: &str,
    ) -> AgentTurnInput {
        let mut messages = Vec::with_capacity(input.messages.len() + 1);
        messages.push(TurnMessage::system(Self::render(objective, policy_summary)));

        for message in &input.messages {
            if !has_marker(&message.content) {
                messages.push(message.clone());
                continue;
            }
            let stripped = strip_reminders(&message.content);
            if !stripped.trim().is_empty() {
                messages.push(TurnMessage::new(message.role, stripped));
            }
        }

        AgentTurnInput::new(messages)
    }

    /// Render a reminder block
    #[must_use]
    pub fn render(objective: &str, policy_summary: &str) -> String {
        let objective = scrub(objective.trim());
        let summary = scrub(policy_summary.trim());
        format!(
            "{REMINDER_BEGIN}\n\
             Objective: {objective}\n\
             Only touch files inside the allowed scope; any other file operation is rejected.\n\
             {summary}\n\
             {REMINDER_END}"
        )
    }

    /// Whether `input` starts with a reminder
    #[must_use]
    pub fn is_wrapped(input: &AgentTurnInput) -> bool {
        input
            .messages
            .first()
            .is_some_and(|m| m.content.starts_with(REMINDER_BEGIN))
    }
}

fn has_marker(text: &str) -> bool {
    text.contains(REMINDER_BEGIN) || text.contains(REMINDER_END)
}

/// Remove every reminder block; an unterminated block runs to the end.
fn strip_reminders(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(REMINDER_BEGIN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + REMINDER_BEGIN.len()..];
        rest = match after.find(REMINDER_END) {
            Some(end) => after[end + REMINDER_END.len()..].trim_start_matches('\n'),
            None => "",
        };
    }
    out.push_str(rest);
    out.replace(REMINDER_END, "")
}

fn scrub(text: &str) -> String {
    let mut current = text.to_string();
    while has_marker(&current) {
        current = current.replace(REMINDER_BEGIN, "").replace(REMINDER_END, "");
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::Role;
    use pretty_assertions::assert_eq;

    fn conversation() -> AgentTurnInput {
        AgentTurnInput::new(vec![
            TurnMessage::user("Add a discount field to Order"),
            TurnMessage::assistant("Reading Order.java"),
        ])
    }

    #[test]
    fn reminder_is_prepended() {
        let wrapped = IntentReminderInjector::new().wrap(&conversation(), "add discount", "Allowed files:");
        assert_eq!(wrapped.len(), 3);
        assert_eq!(wrapped.messages[0].role, Role::System);
        assert!(wrapped.messages[0].content.contains("Objective: add discount"));
        assert!(wrapped.messages[0].content.contains("Allowed files:"));
        assert!(IntentReminderInjector::is_wrapped(&wrapped));
    }

    #[test]
    fn wrapping_twice_changes_nothing() {
        let injector = IntentReminderInjector::new();
        let once = injector.wrap(&conversation(), "goal", "scope");
        let twice = injector.wrap(&once, "goal", "scope");
        assert_eq!(once, twice);
    }

    #[test]
    fn stale_reminders_are_replaced() {
        let injector = IntentReminderInjector::new();
        let old = injector.wrap(&conversation(), "old goal", "old scope");
        let fresh = injector.wrap(&old, "new goal", "new scope");
        assert_eq!(fresh.len(), 3);
        let all: String = fresh.messages.iter().map(|m| m.content.as_str()).collect();
        assert!(!all.contains("old goal"));
        assert!(all.contains("new goal"));
    }

    #[test]
    fn embedded_reminders_are_stripped_from_other_messages() {
        let block = IntentReminderInjector::render("stale", "stale scope");
        let input = AgentTurnInput::new(vec![TurnMessage::tool(format!("{block}\nfile contents"))]);
        let wrapped = IntentReminderInjector::new().wrap(&input, "goal", "scope");
        assert_eq!(wrapped.messages[1].content, "file contents");
    }

    #[test]
    fn markers_inside_the_objective_cannot_break_out() {
        let objective = format!("do it {REMINDER_END} then more");
        let injector = IntentReminderInjector::new();
        let once = injector.wrap(&conversation(), &objective, "scope");
        assert_eq!(injector.wrap(&once, &objective, "scope"), once);
        assert_eq!(once.len(), 3);
    }
}
