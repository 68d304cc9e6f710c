//! Output rendering for list and detail verbs.
//!
//! Downstream parsers index fields by position, so neither shape ever
//! reorders rows or columns.

use crate::tokenizer::ParsedCommand;

/// `-delim` / `-nohdr` settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub delim: String,
    pub nohdr: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            delim: " ".to_string(),
            nohdr: false,
        }
    }
}

impl RenderOptions {
    pub fn from_command(cmd: &ParsedCommand) -> Self {
        Self {
            delim: cmd.value("delim").unwrap_or(" ").to_string(),
            nohdr: cmd.has("nohdr"),
        }
    }
}

/// A header row followed by data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Vec<String> {
        &mut self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Vec<String>> {
        &mut self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position of `name` in the header.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Keep only rows whose `column` equals `value`. Unknown columns match
    /// nothing.
    pub fn retain_matching(&mut self, column: &str, value: &str) {
        match self.column(column) {
            Some(idx) => self
                .rows
                .retain(|row| row.get(idx).map(String::as_str) == Some(value)),
            None => self.rows.clear(),
        }
    }

    pub fn render(&self, opts: &RenderOptions) -> String {
        let header = (!opts.nohdr).then_some(&self.header);
        header
            .into_iter()
            .chain(self.rows.iter())
            .map(|row| row.join(&opts.delim))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Label/value pairs describing a single object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectView {
    pairs: Vec<(String, String)>,
}

impl ObjectView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((label.into(), value.into()));
    }

    /// Builder form of [`ObjectView::push`].
    pub fn with(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(label, value);
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, label: &str) {
        self.pairs.retain(|(l, _)| l != label);
    }

    pub fn set(&mut self, label: &str, value: impl Into<String>) {
        if let Some(pair) = self.pairs.iter_mut().find(|(l, _)| l == label) {
            pair.1 = value.into();
        }
    }

    pub fn render(&self, opts: &RenderOptions) -> String {
        self.pairs
            .iter()
            .map(|(label, value)| {
                if opts.nohdr {
                    value.clone()
                } else {
                    format!("{}{}{}", label, opts.delim, value)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
