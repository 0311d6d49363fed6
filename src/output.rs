//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! ## Expand
//!
//! ```text
//! 001 trip.md → trip.html (2 tags)
//! 002 2020/plain.md → 2020/plain.html
//!
//! Expanded 2 documents, 2 tags
//! ```
//!
//! ## Authors
//!
//! ```text
//! Jane Doe
//!     bio: Photographer and walker.
//!     avatar: /images/jane.jpg
//! ```

use crate::authors::Author;
use crate::expand::ExpandedFile;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Format the result of an `expand` run.
pub fn format_expand_output(files: &[ExpandedFile]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, file) in files.iter().enumerate() {
        let mut line = format!(
            "{} {} → {}",
            format_index(i + 1),
            file.source.display(),
            file.output.display()
        );
        if file.tags > 0 {
            line.push_str(&format!(" ({})", plural(file.tags, "tag", "tags")));
        }
        lines.push(line);
    }

    let total: usize = files.iter().map(|f| f.tags).sum();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Expanded {}, {}",
        plural(files.len(), "document", "documents"),
        plural(total, "tag", "tags")
    ));
    lines
}

pub fn print_expand_output(files: &[ExpandedFile]) {
    for line in format_expand_output(files) {
        println!("{}", line);
    }
}

/// Format an author's attributes after patching.
pub fn format_author(author: &Author) -> Vec<String> {
    let mut lines = vec![author.name.clone()];
    if author.metadata.is_empty() {
        lines.push(format!("{}(no attributes)", indent(1)));
    }
    for (key, value) in author.metadata.iter() {
        lines.push(format!("{}{}: {}", indent(1), key, value));
    }
    lines
}

pub fn print_author(author: &Author) {
    for line in format_author(author) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(source: &str, output: &str, tags: usize) -> ExpandedFile {
        ExpandedFile {
            source: PathBuf::from(source),
            output: PathBuf::from(output),
            tags,
        }
    }

    #[test]
    fn expand_output_lists_files_and_totals() {
        let lines = format_expand_output(&[
            file("trip.md", "trip.html", 2),
            file("plain.md", "plain.html", 0),
        ]);
        assert_eq!(
            lines,
            vec![
                "001 trip.md → trip.html (2 tags)",
                "002 plain.md → plain.html",
                "",
                "Expanded 2 documents, 2 tags",
            ]
        );
    }

    #[test]
    fn expand_output_singular() {
        let lines = format_expand_output(&[file("a.md", "a.md", 1)]);
        assert_eq!(lines[0], "001 a.md → a.md (1 tag)");
        assert_eq!(lines.last().unwrap(), "Expanded 1 document, 1 tag");
    }

    #[test]
    fn expand_output_empty() {
        assert_eq!(
            format_expand_output(&[]),
            vec!["Expanded 0 documents, 0 tags"]
        );
    }

    #[test]
    fn author_output_lists_attributes() {
        let mut author = Author::new("Jane Doe");
        author.metadata.bio = Some("hi".into());
        author.metadata.extra.insert("mastodon".into(), "@jane".into());
        assert_eq!(
            format_author(&author),
            vec!["Jane Doe", "    bio: hi", "    mastodon: @jane"]
        );
    }

    #[test]
    fn author_output_renders_non_string_values() {
        let mut author = Author::new("Jane Doe");
        author.metadata.extra.insert("posts".into(), toml::Value::Integer(12));
        author.metadata.extra.insert(
            "links".into(),
            toml::Value::Array(vec![toml::Value::String("a".into())]),
        );
        assert_eq!(
            format_author(&author),
            vec!["Jane Doe", r#"    links: ["a"]"#, "    posts: 12"]
        );
    }

    #[test]
    fn author_output_without_attributes() {
        let author = Author::new("Jane Doe");
        assert_eq!(format_author(&author), vec!["Jane Doe", "    (no attributes)"]);
    }
}
