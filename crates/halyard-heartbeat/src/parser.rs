use std::path::Path;

use crate::error::Result;
use crate::types::{Task, MAX_TASKS};

fn checklist_text(rest: &str) -> &str {
    match rest.find("] ") {
        Some(idx) => &rest[idx + 2..],
        None => rest,
    }
}

/// Parse `- [ ]` / `- [x]` / `- [X]` checklist lines out of markdown.
/// Blank lines and `#` headers are skipped; everything else is ignored
/// (so prose notes between tasks don't become phantom tasks).
pub fn parse(contents: &str) -> Vec<Task> {
    let mut tasks = Vec::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        if tasks.len() >= MAX_TASKS {
            break;
        }
        let line = raw_line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_num = (idx + 1) as u32;
        if let Some(pos) = line.find("- [x]").or_else(|| line.find("- [X]")) {
            tasks.push(Task {
                text: checklist_text(&line[pos..]).to_string(),
                completed: true,
                line: line_num,
            });
        } else if let Some(pos) = line.find("- [ ]") {
            tasks.push(Task {
                text: checklist_text(&line[pos..]).to_string(),
                completed: false,
                line: line_num,
            });
        }
    }
    tasks
}

/// Parse the checklist at `path`. A missing file yields an empty list —
/// "no HEARTBEAT.md" is treated as "nothing pending", not an error.
pub fn parse_file(path: &Path) -> Result<Vec<Task>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse(&contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pending_and_completed_tasks() {
        let md = "# Heartbeat\n\n- [ ] write the report\n- [x] send the invoice\n- [X] file taxes\nsome prose\n";
        let tasks = parse(md);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0], Task { text: "write the report".into(), completed: false, line: 3 });
        assert_eq!(tasks[1], Task { text: "send the invoice".into(), completed: true, line: 4 });
        assert_eq!(tasks[2], Task { text: "file taxes".into(), completed: true, line: 5 });
    }

    #[test]
    fn missing_separator_space_falls_back_to_whole_line() {
        // If no "] " separator is found, the whole line is used as the task text.
        let tasks = parse("- [ ]no-space-after-bracket\n");
        assert_eq!(tasks[0].text, "- [ ]no-space-after-bracket");
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let tasks = parse_file(Path::new("/nonexistent/HEARTBEAT.md")).unwrap();
        assert!(tasks.is_empty());
    }
}
