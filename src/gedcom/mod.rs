//! GEDCOM line parser
//!
//! Turns the `LEVEL [@XREF@] TAG [VALUE]` line format into a tree of [`Node`]s.
//! The parser is deliberately lenient: it does not validate tags or structure,
//! it only rebuilds the hierarchy from level numbers and folds `CONC`/`CONT`
//! continuation lines into the value they extend.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::path::Path;

const LOG_TARGET: &str = "gedmelt::gedcom";

static LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s+(?:(@[^@\s]+@)\s+)?(\S+)(?:\s(.*))?$").unwrap()
});

/// One element of the parsed record tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub pointer: Option<String>,
    pub value: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Node {
            tag: tag.into(),
            pointer: None,
            value: None,
            children: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Read and parse a GEDCOM file into its top-level records
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<Node>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let text = decode(path, &bytes);
    let records = parse_str(&text);
    log::info!(target: LOG_TARGET, "Parsed {} top-level records from {}", records.len(), path.display());
    Ok(records)
}

/// Decode file contents as UTF-8, replacing invalid bytes with U+FFFD.
/// ANSEL and ANSI encoded files are read this way too, with a warning.
fn decode<'a>(path: &Path, bytes: &'a [u8]) -> Cow<'a, str> {
    let text = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = text {
        log::warn!(
            target: LOG_TARGET,
            "{} is not valid UTF-8; invalid bytes were replaced",
            path.display()
        );
    }
    text
}

/// Parse GEDCOM text into its top-level records
pub fn parse_str(input: &str) -> Vec<Node> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut roots = Vec::new();
    let mut open: Vec<(usize, Node)> = Vec::new();

    for (line_no, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let Some(caps) = LINE_REGEX.captures(line) else {
            log::warn!(target: LOG_TARGET, "Skipping malformed line {}: {:?}", line_no + 1, line);
            continue;
        };

        let Ok(level) = caps[1].parse::<usize>() else {
            log::warn!(target: LOG_TARGET, "Skipping line {} with unreadable level", line_no + 1);
            continue;
        };
        let tag = &caps[3];
        let value = caps.get(4).map(|m| m.as_str());

        close_to_level(&mut open, &mut roots, level);

        if tag == "CONC" || tag == "CONT" {
            match open.last_mut() {
                Some((_, parent)) => {
                    let current = parent.value.get_or_insert_with(String::new);
                    if tag == "CONT" {
                        current.push('\n');
                    }
                    current.push_str(value.unwrap_or(""));
                }
                None => {
                    log::warn!(target: LOG_TARGET, "Line {}: {} without a record to continue", line_no + 1, tag);
                }
            }
            continue;
        }

        let mut node = Node::new(tag);
        node.pointer = caps.get(2).map(|m| m.as_str().to_string());
        node.value = value.filter(|v| !v.is_empty()).map(str::to_string);
        open.push((level, node));
    }

    close_to_level(&mut open, &mut roots, 0);
    roots
}

/// Pop every open node at `level` or deeper, attaching each to the node above it
fn close_to_level(open: &mut Vec<(usize, Node)>, roots: &mut Vec<Node>, level: usize) {
    while open.last().is_some_and(|(l, _)| *l >= level) {
        let Some((_, node)) = open.pop() else { break };
        match open.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

/// The distinct top-level tags, in order of first appearance
pub fn top_level_tags(records: &[Node]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for record in records {
        if !tags.iter().any(|t| t == &record.tag) {
            tags.push(record.tag.clone());
        }
    }
    tags
}
