//! Subtask extraction from raw model output.
//!
//! Models are asked for `{"subtasks": [...]}` but routinely answer with the
//! JSON wrapped in markdown fences, with objects instead of strings, or with a
//! plain numbered list. [`SubtaskExtractor::normalize`] accepts all of these and
//! always produces a usable list.
//!
//! # Pipeline
//! ```text
//! raw text ──► strip fences ──► JSON {"subtasks": [...]} ──┐
//!                    │                                      ├─► dedup + bound ──► SubtaskList
//!                    └──────► free-text line extraction ────┘          │
//!                                                                      └─ < min ─► fallback list
//! ```
//!
//! The extractor is a pure function of its inputs; it never fails and never
//! returns an empty list.

pub mod prompt;

pub use prompt::{build_prompt, Prompt};

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Leading phrases that introduce a list rather than being part of it.
const FILLER_PREFIXES: &[&str] = &[
    "here are",
    "here is",
    "below are",
    "following",
    "the following",
    "sure",
];

/// Object fields tried, in order, when a subtask element is an object.
const OBJECT_TITLE_FIELDS: &[&str] = &["title", "name", "text"];

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?i)```(?:json)?").unwrap())
}

fn list_marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"^\s*(?:\d+[.)]\s*|\d+\s+|[-•*][.)]?\s*)").unwrap())
}

/// Where the items of a [`SubtaskList`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    /// Parsed from a `{"subtasks": [...]}` JSON object
    Structured,
    /// Picked out of free-form lines of text
    FreeText,
    /// Generated locally from the task name
    Fallback,
}

/// Ordered, non-empty, duplicate-free list of subtasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskList {
    items: Vec<String>,
    source: ExtractionSource,
}

impl SubtaskList {
    /// The fallback list for `task_name`.
    pub fn fallback(task_name: &str) -> Self {
        Self {
            items: fallback_subtasks(task_name),
            source: ExtractionSource::Fallback,
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn source(&self) -> ExtractionSource {
        self.source
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ExtractionSource::Fallback
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<String> {
        self.items
    }
}

/// Bounds applied to extracted lists and free-text candidate lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    /// Fewer usable entries than this means the fallback list is used
    pub min_items: usize,
    /// Longer lists are truncated to this many entries
    pub max_items: usize,
    /// Free-text lines must be shorter than this many characters
    pub max_line_len: usize,
    /// Drop free-text lines containing a full stop (descriptive sentences)
    pub reject_sentences: bool,
}

impl ExtractionLimits {
    /// Short titles only: under 80 characters and no sentences.
    pub fn strict() -> Self {
        Self {
            min_items: 3,
            max_items: 5,
            max_line_len: 80,
            reject_sentences: true,
        }
    }

    /// Accepts longer lines (under 200 characters), sentences included.
    pub fn lenient() -> Self {
        Self {
            max_line_len: 200,
            reject_sentences: false,
            ..Self::strict()
        }
    }
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self::strict()
    }
}

/// Turns raw model output into a [`SubtaskList`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtaskExtractor {
    limits: ExtractionLimits,
}

impl SubtaskExtractor {
    pub fn new(limits: ExtractionLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ExtractionLimits {
        self.limits
    }

    /// Normalize `raw` into a subtask list, falling back to a list built from
    /// `task_name` when nothing usable can be extracted.
    ///
    /// # Postconditions
    /// - Result is non-empty and duplicate-free
    /// - Extracted results hold between `min_items` and `max_items` entries
    pub fn normalize(&self, raw: &str, task_name: &str) -> SubtaskList {
        let text = strip_fences(raw);

        let (candidates, source) = match parse_structured(&text) {
            Some(items) => (items, ExtractionSource::Structured),
            None => (self.extract_lines(&text), ExtractionSource::FreeText),
        };

        match self.bound(dedup(candidates)) {
            Some(items) => SubtaskList { items, source },
            None => SubtaskList::fallback(task_name),
        }
    }

    /// Pick subtask-looking lines out of free-form text.
    fn extract_lines(&self, text: &str) -> Vec<String> {
        text.lines()
            .map(clean_line)
            .filter(|line| self.accept_line(line))
            .collect()
    }

    fn accept_line(&self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        let lower = line.to_lowercase();
        if FILLER_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return false;
        }
        if line.chars().count() >= self.limits.max_line_len {
            return false;
        }
        if self.limits.reject_sentences && line.contains('.') {
            return false;
        }
        line.chars().next().is_some_and(char::is_uppercase)
    }

    /// Apply count bounds: `None` below the minimum, truncation above the maximum.
    fn bound(&self, mut items: Vec<String>) -> Option<Vec<String>> {
        if items.len() < self.limits.min_items {
            return None;
        }
        items.truncate(self.limits.max_items);
        Some(items)
    }
}

/// Normalize with the default (strict) limits.
pub fn normalize(raw: &str, task_name: &str) -> SubtaskList {
    SubtaskExtractor::default().normalize(raw, task_name)
}

/// Generic subtasks used when nothing can be extracted from the model.
pub fn fallback_subtasks(task_name: &str) -> Vec<String> {
    let task_name = task_name.trim();
    let first = if task_name.is_empty() {
        "Understand the task".to_string()
    } else {
        format!("Understand the task: {}", task_name)
    };
    vec![
        first,
        "Plan the required steps".to_string(),
        "Execute the main work".to_string(),
        "Review and finalize".to_string(),
    ]
}

/// Remove markdown code-fence delimiters (with or without a `json` tag).
pub fn strip_fences(raw: &str) -> String {
    fence_regex().replace_all(raw, "").trim().to_string()
}

/// Parse `{"subtasks": [...]}`, returning `None` when the text is not such an
/// object or `subtasks` is not an array.
fn parse_structured(text: &str) -> Option<Vec<String>> {
    let object = parse_json_object(text)?;
    let items = object.get("subtasks")?.as_array()?;
    Some(items.iter().filter_map(element_text).collect())
}

fn parse_json_object(text: &str) -> Option<Value> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    // Tolerate a line of prose before or after the object.
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Text of one `subtasks` element; `None` for null or blank elements.
fn element_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => OBJECT_TITLE_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(field_text))
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Strip bold markup, a leading list marker and a trailing colon.
fn clean_line(line: &str) -> String {
    let unbolded = line.replace("**", "").replace("__", "");
    let unmarked = list_marker_regex().replace(&unbolded, "");
    let trimmed = unmarked.trim();
    trimmed
        .strip_suffix(':')
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Drop repeated entries (case-insensitive), keeping first-seen order.
fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(list: &SubtaskList) -> Vec<&str> {
        list.items().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_plain_json() {
        let list = normalize(r#"{"subtasks": ["a", "b", "c"]}"#, "Task");
        assert_eq!(items(&list), vec!["a", "b", "c"]);
        assert_eq!(list.source(), ExtractionSource::Structured);
    }

    #[test]
    fn test_fenced_json_matches_unwrapped() {
        let plain = r#"{"subtasks": ["Draft outline", "Write body", "Edit"]}"#;
        let fenced = format!("```json\n{}\n```", plain);
        assert_eq!(normalize(&fenced, "Essay"), normalize(plain, "Essay"));

        let bare_fence = format!("```\n{}\n```", plain);
        assert_eq!(normalize(&bare_fence, "Essay"), normalize(plain, "Essay"));
    }

    #[test]
    fn test_object_elements() {
        let raw = r#"{"subtasks": [
            {"title": "Do X"},
            {"name": "Do Y", "text": "ignored"},
            {"text": "Do Z"},
            {"id": 4}
        ]}"#;
        let list = normalize(raw, "Task");
        assert_eq!(items(&list), vec!["Do X", "Do Y", "Do Z", r#"{"id":4}"#]);
    }

    #[test]
    fn test_mixed_elements_drop_blank_and_null() {
        let raw = r#"{"subtasks": ["  First  ", "", null, 42, true, "   "]}"#;
        let list = normalize(raw, "Task");
        assert_eq!(items(&list), vec!["First", "42", "true"]);
    }

    #[test]
    fn test_non_array_subtasks_uses_fallback() {
        let list = normalize(r#"{"subtasks": "Plan, build, ship"}"#, "Launch");
        assert!(list.is_fallback());
        assert_eq!(list.items(), fallback_subtasks("Launch").as_slice());
    }

    #[test]
    fn test_json_inside_prose() {
        let raw = r#"Sure! {"subtasks": ["Book venue", "Send invites", "Order food"]} Good luck."#;
        let list = normalize(raw, "Party");
        assert_eq!(items(&list), vec!["Book venue", "Send invites", "Order food"]);
    }

    #[test]
    fn test_numbered_free_text() {
        let raw = "1. Plan the approach\n2. Gather materials\n3. Execute and verify";
        let list = normalize(raw, "Task");
        assert_eq!(
            items(&list),
            vec!["Plan the approach", "Gather materials", "Execute and verify"]
        );
        assert_eq!(list.source(), ExtractionSource::FreeText);
    }

    #[test]
    fn test_free_text_cleanup_and_filters() {
        let raw = "Here are the subtasks:\n\
                   - **Research options**:\n\
                   * Compare prices\n\
                   2) Buy the item\n\
                   This line describes the work in a full sentence.\n\
                   lowercase line\n\
                   • Set up delivery";
        let list = normalize(raw, "Buy a laptop");
        assert_eq!(
            items(&list),
            vec!["Research options", "Compare prices", "Buy the item", "Set up delivery"]
        );
    }

    #[test]
    fn test_line_length_limits() {
        let long = format!("Prepare {}", "x".repeat(100));
        let raw = format!("1. Alpha step\n2. Beta step\n3. {}\n4. Gamma step", long);

        let strict = normalize(&raw, "Task");
        assert_eq!(items(&strict), vec!["Alpha step", "Beta step", "Gamma step"]);

        let lenient = SubtaskExtractor::new(ExtractionLimits::lenient()).normalize(&raw, "Task");
        assert_eq!(lenient.len(), 4);
        assert_eq!(lenient.items()[2], long);
    }

    #[test]
    fn test_lenient_keeps_sentences() {
        let raw = "1. Write the draft.\n2. Review it.\n3. Publish it.";
        assert!(normalize(raw, "Post").is_fallback());

        let list = SubtaskExtractor::new(ExtractionLimits::lenient()).normalize(raw, "Post");
        assert_eq!(
            items(&list),
            vec!["Write the draft.", "Review it.", "Publish it."]
        );
    }

    #[test]
    fn test_empty_input_falls_back_with_task_name() {
        let list = normalize("", "Clean the garage");
        assert!(list.len() >= 3);
        assert!(list.items().iter().any(|s| s.contains("Clean the garage")));
        assert!(list.is_fallback());
    }

    #[test]
    fn test_truncates_to_five() {
        let raw = (1..=7)
            .map(|i| format!("{}. Step number {}", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let list = normalize(&raw, "Task");
        assert_eq!(
            items(&list),
            vec![
                "Step number 1",
                "Step number 2",
                "Step number 3",
                "Step number 4",
                "Step number 5"
            ]
        );
    }

    #[test]
    fn test_two_candidates_fall_back() {
        let list = normalize("1. Only one\n2. Only two", "Tiny task");
        assert!(list.is_fallback());
        assert_eq!(list.items(), fallback_subtasks("Tiny task").as_slice());
    }

    #[test]
    fn test_duplicates_collapse_before_bounding() {
        let raw = r#"{"subtasks": ["Plan", "plan", "Build", "Plan"]}"#;
        assert!(normalize(raw, "Task").is_fallback());

        let raw = r#"{"subtasks": ["Plan", "Build", "plan", "Ship"]}"#;
        assert_eq!(items(&normalize(raw, "Task")), vec!["Plan", "Build", "Ship"]);
    }

    #[test]
    fn test_garbage_input() {
        let list = normalize("{not json at all ```", "Fix bug");
        assert!(list.is_fallback());
        assert!(!list.is_empty());
    }

    #[test]
    fn test_fallback_shape() {
        assert_eq!(
            fallback_subtasks("  Move house "),
            vec![
                "Understand the task: Move house",
                "Plan the required steps",
                "Execute the main work",
                "Review and finalize"
            ]
        );
        assert_eq!(fallback_subtasks("")[0], "Understand the task");
    }

    #[test]
    fn test_idempotent() {
        let raw = "```json\n{\"subtasks\": [\"A\", \"B\", \"C\", \"D\"]}\n```";
        assert_eq!(normalize(raw, "T"), normalize(raw, "T"));
        assert_eq!(normalize("", "T"), normalize("", "T"));
    }
}
