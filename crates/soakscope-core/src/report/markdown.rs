//! Markdown sink for [`ReportDocument`].

use super::{Entry, ReportDocument};

/// Renders `doc` as markdown.
///
/// Level-2 headings are followed by a blank line and level-3 headings are
/// not. Every section after the header is separated from the previous line
/// by exactly one blank line, so an empty level-2 section reads as the
/// parent of the level-3 sections that follow it. The output ends with a
/// single newline.
#[must_use]
pub fn render_markdown(doc: &ReportDocument) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# {}", doc.title));
    lines.push(String::new());
    lines.extend(doc.header.iter().map(render_entry));

    for section in &doc.sections {
        if lines.last().is_some_and(|line| !line.is_empty()) {
            lines.push(String::new());
        }
        lines.push(format!("{} {}", "#".repeat(usize::from(section.level)), section.heading));
        if section.level <= 2 {
            lines.push(String::new());
        }
        lines.extend(section.entries.iter().map(render_entry));
    }

    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }

    let mut out = String::with_capacity(lines.iter().map(|line| line.len() + 1).sum());
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn render_entry(entry: &Entry) -> String {
    match entry {
        Entry::Field { label, value } => format!("- {label}: {value}"),
        Entry::Code { label, value } => format!("- {label}: `{value}`"),
        Entry::Ranking { label, count } => format!("- {label}: {count}"),
        Entry::Item { text } => format!("- {text}"),
    }
}
