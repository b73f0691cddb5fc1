use std::fmt::Write;

use crate::ground::Snapshot;
use crate::history::HistoryBuffer;
use crate::types::snippet;

pub const SYSTEM_PROMPT: &str = r#"You are a browser automation agent.
You receive:
- GOAL from the user
- the list of interactive elements on the CURRENT page (SNAPSHOT)
- PREVIOUS ACTIONS AND OBSERVATIONS (do NOT repeat successful actions)

Respond with EXACTLY ONE JSON object. No markdown, no explanation.

Available actions:
- {"type": "click", "target": <index>}
- {"type": "type", "target": <index>, "text": "<text to type>"}
- {"type": "navigate", "url": "<full url>"}
- {"type": "press_key", "key": "<key name, e.g. Enter>"}
- {"type": "wait"}
- {"type": "ask_user", "reason": "<question for the human>"}
- {"type": "done", "reason": "<what was achieved>"}
Every action may carry an optional "reason".

Rules:
1. target is a 0-based index FROM THE CURRENT SNAPSHOT. Never invent indices.
2. If the history already shows a successful action with the same type and target, do not repeat it.
3. After typing into a search field, the query is usually submitted already; check the observation before clicking a search button.
4. If a button does not react, try pressing Enter.
5. Use ask_user only for things only a human can provide (codes, passwords, choices).
6. As soon as the goal is achieved, answer {"type": "done"}."#;

const SELECTOR_CELL_CHARS: usize = 60;
const NAME_CELL_CHARS: usize = 80;

/// Render the snapshot as the `index | selector | role | name | disabled | inViewport` table.
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    out.push_str("index | selector | role | name | disabled | inViewport\n");
    out.push_str("------|----------|------|------|----------|-----------\n");
    for el in snapshot.iter() {
        let name = snippet(&el.name.replace('\n', " "), NAME_CELL_CHARS).replace('"', "\\\"");
        let _ = writeln!(
            out,
            "{} | {} | {} | \"{}\" | {} | {}",
            el.index,
            snippet(&el.selector, SELECTOR_CELL_CHARS),
            el.role,
            name,
            el.disabled,
            el.in_viewport
        );
    }
    if snapshot.is_empty() {
        out.push_str("(no interactive elements found)\n");
    }
    out
}

pub fn render_history(history: &HistoryBuffer) -> String {
    let mut out = String::new();
    for (i, entry) in history.iter().enumerate() {
        let _ = writeln!(out, "{}. {} -> {}", i + 1, entry.action, entry.observation);
    }
    out
}

/// The user-turn prompt for one decision.
pub fn build_prompt(goal: &str, snapshot: &Snapshot, history: &HistoryBuffer) -> String {
    let mut out = String::new();
    if !history.is_empty() {
        out.push_str("PREVIOUS ACTIONS AND OBSERVATIONS (take them into account!):\n");
        out.push_str(&render_history(history));
        out.push_str("Do not repeat actions that already succeeded.\n\n");
    }
    let _ = write!(out, "GOAL:\n{goal}\n\nSNAPSHOT:\n{}", render_snapshot(snapshot));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::element;

    #[test]
    fn renders_one_row_per_element() {
        let mut raw = vec![
            element(0, "#q", "searchbox", "Search"),
            element(1, "div.results > a.item", "a", "Say \"hi\""),
        ];
        raw[1].disabled = true;
        raw[1].in_viewport = false;
        let table = render_snapshot(&Snapshot::new(raw));

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "index | selector | role | name | disabled | inViewport");
        assert_eq!(lines[2], "0 | #q | searchbox | \"Search\" | false | true");
        assert_eq!(lines[3], "1 | div.results > a.item | a | \"Say \\\"hi\\\"\" | true | false");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn long_cells_are_shortened() {
        let long_selector = format!("html > body > {}", "div.wrapper > ".repeat(10));
        let table = render_snapshot(&Snapshot::new(vec![element(0, &long_selector, "a", &"n".repeat(99))]));
        let row = table.lines().nth(2).unwrap();
        let selector_cell = row.split(" | ").nth(1).unwrap();
        assert_eq!(selector_cell.chars().count(), SELECTOR_CELL_CHARS);
        assert!(selector_cell.ends_with("..."));
    }

    #[test]
    fn prompt_includes_goal_and_history() {
        let mut history = HistoryBuffer::new();
        history.push("click 3", "ERROR: invalid target index 3 (snapshot has 2 elements)");
        let prompt = build_prompt("find phones", &Snapshot::default(), &history);

        assert!(prompt.starts_with("PREVIOUS ACTIONS"));
        assert!(prompt.contains("1. click 3 -> ERROR: invalid target index 3"));
        assert!(prompt.contains("GOAL:\nfind phones"));
        assert!(prompt.contains("(no interactive elements found)"));

        let fresh = build_prompt("find phones", &Snapshot::default(), &HistoryBuffer::new());
        assert!(fresh.starts_with("GOAL:"));
    }
}
