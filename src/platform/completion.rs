//! Tab completion for the prompt editor: slash commands and `@` attachments.

use std::collections::HashSet;
use std::fs::read_dir;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

fn path_delimiters() -> &'static HashSet<char> {
    static DELIMITERS: OnceLock<HashSet<char>> = OnceLock::new();
    DELIMITERS.get_or_init(|| [' ', '\t', '"', '\'', '='].into_iter().collect())
}

fn find_last_delimiter(text: &str) -> Option<usize> {
    text.char_indices()
        .rev()
        .find(|(_, ch)| path_delimiters().contains(ch))
        .map(|(idx, _)| idx)
}

fn find_unclosed_quote_start(text: &str) -> Option<usize> {
    let mut quote_start = None;
    for (idx, ch) in text.char_indices() {
        if ch == '"' {
            quote_start = match quote_start {
                Some(_) => None,
                None => Some(idx),
            };
        }
    }
    quote_start
}

fn is_token_start(text: &str, index: usize) -> bool {
    text[..index]
        .chars()
        .last()
        .map(|ch| path_delimiters().contains(&ch))
        .unwrap_or(true)
}

/// The `@"...` token under the cursor when a quote is still open.
fn extract_quoted_prefix(text: &str) -> Option<&str> {
    let quote_start = find_unclosed_quote_start(text)?;
    let at = quote_start.checked_sub(1)?;
    if text.as_bytes()[at] != b'@' || !is_token_start(text, at) {
        return None;
    }
    Some(&text[at..])
}

fn extract_attachment_prefix(text: &str) -> Option<&str> {
    if find_unclosed_quote_start(text).is_some() {
        return extract_quoted_prefix(text);
    }
    let start = find_last_delimiter(text).map_or(0, |idx| idx + 1);
    let token = &text[start..];
    token.starts_with('@').then_some(token)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedPathPrefix {
    raw_prefix: String,
    is_quoted_prefix: bool,
}

fn parse_path_prefix(prefix: &str) -> ParsedPathPrefix {
    if let Some(rest) = prefix.strip_prefix("@\"") {
        return ParsedPathPrefix {
            raw_prefix: rest.to_string(),
            is_quoted_prefix: true,
        };
    }
    ParsedPathPrefix {
        raw_prefix: prefix.strip_prefix('@').unwrap_or(prefix).to_string(),
        is_quoted_prefix: false,
    }
}

#[derive(Debug, Clone, Copy)]
struct CompletionOptions {
    is_directory: bool,
    is_quoted_prefix: bool,
}

/// Directories keep their quote open so completion can continue inside them.
fn build_completion_value(path: &str, options: CompletionOptions) -> String {
    let needs_quotes = options.is_quoted_prefix || path.contains(' ');
    match (needs_quotes, options.is_directory) {
        (false, _) => format!("@{path}"),
        (true, true) => format!("@\"{path}"),
        (true, false) => format!("@\"{path}\""),
    }
}

/// Splits `dir/na` into (`dir/`, `na`).
fn split_path_prefix(raw: &str) -> (&str, &str) {
    match raw.rfind('/') {
        Some(idx) => raw.split_at(idx + 1),
        None => ("", raw),
    }
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir == "." {
        return name.to_string();
    }
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

fn expand_home_path(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    /// Text that replaces the token under the cursor.
    pub value: String,
    /// Text shown in the candidate list.
    pub label: String,
}

/// Completion rules independent of the line editor.
pub struct PromptCompleter {
    base_dir: PathBuf,
    commands: Vec<String>,
    accepts_file: fn(&Path) -> bool,
}

impl PromptCompleter {
    /// Completes paths relative to `base_dir`; every file is offered until
    /// [`PromptCompleter::with_file_filter`] narrows it.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            commands: Vec::new(),
            accepts_file: |_| true,
        }
    }

    #[must_use]
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_file_filter(mut self, accepts_file: fn(&Path) -> bool) -> Self {
        self.accepts_file = accepts_file;
        self
    }

    /// Returns the byte offset the candidates replace from, and the candidates.
    pub fn complete(&self, line: &str, pos: usize) -> (usize, Vec<CompletionItem>) {
        let Some(text) = line.get(..pos) else {
            return (pos, Vec::new());
        };

        if let Some(result) = self.command_items(text) {
            return result;
        }
        if let Some(prefix) = extract_attachment_prefix(text) {
            return (pos - prefix.len(), self.file_items(prefix));
        }
        (pos, Vec::new())
    }

    fn command_items(&self, text: &str) -> Option<(usize, Vec<CompletionItem>)> {
        let trimmed = text.trim_start();
        if !trimmed.starts_with('/') || trimmed.contains(char::is_whitespace) {
            return None;
        }
        let items = self
            .commands
            .iter()
            .filter(|command| command.starts_with(trimmed))
            .map(|command| CompletionItem {
                value: command.clone(),
                label: command.clone(),
            })
            .collect();
        Some((text.len() - trimmed.len(), items))
    }

    fn file_items(&self, prefix: &str) -> Vec<CompletionItem> {
        let parsed = parse_path_prefix(prefix);
        let (display_dir, name_prefix) = split_path_prefix(&parsed.raw_prefix);

        let search_dir = if display_dir.is_empty() {
            self.base_dir.clone()
        } else {
            let expanded = expand_home_path(display_dir);
            if expanded.is_absolute() {
                expanded
            } else {
                self.base_dir.join(expanded)
            }
        };

        let Ok(entries) = read_dir(&search_dir) else {
            return Vec::new();
        };

        let name_prefix_lower = name_prefix.to_lowercase();
        let mut items = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') && !name_prefix.starts_with('.') {
                continue;
            }
            if !name.to_lowercase().starts_with(&name_prefix_lower) {
                continue;
            }

            let path = entry.path();
            let is_directory = path.is_dir();
            if !is_directory && !(self.accepts_file)(&path) {
                continue;
            }

            let mut path_value = join_path(display_dir, &name);
            if is_directory {
                path_value.push('/');
            }
            items.push(CompletionItem {
                value: build_completion_value(
                    &path_value,
                    CompletionOptions {
                        is_directory,
                        is_quoted_prefix: parsed.is_quoted_prefix,
                    },
                ),
                label: format!("{name}{}", if is_directory { "/" } else { "" }),
            });
        }

        items.sort_by(|a, b| {
            let a_is_dir = a.label.ends_with('/');
            let b_is_dir = b.label.ends_with('/');
            b_is_dir.cmp(&a_is_dir).then_with(|| a.label.cmp(&b.label))
        });
        items
    }
}

/// rustyline helper that only contributes completion.
pub struct PromptHelper {
    completer: PromptCompleter,
}

impl PromptHelper {
    pub fn new(completer: PromptCompleter) -> Self {
        Self { completer }
    }
}

impl Completer for PromptHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, items) = self.completer.complete(line, pos);
        let candidates = items
            .into_iter()
            .map(|item| Pair {
                display: item.label,
                replacement: item.value,
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for PromptHelper {
    type Hint = String;
}

impl Highlighter for PromptHelper {}

impl Validator for PromptHelper {}

impl Helper for PromptHelper {}
