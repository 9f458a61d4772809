use std::fmt;

/// One unit of work handed to the driver. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// One opaque search term, typed into the page's search box.
    Search(String),
    /// One structured form record, filled into the entry form and submitted.
    FormEntry {
        value: String,
        field: FieldKind,
        expected_impact: String,
    },
}

impl WorkItem {
    /// Short key used for failed-item reporting and dedupe.
    pub fn key(&self) -> &str {
        match self {
            WorkItem::Search(term) => term,
            WorkItem::FormEntry { value, .. } => value,
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Search(term) => write!(f, "{term}"),
            WorkItem::FormEntry {
                value,
                expected_impact,
                ..
            } => write!(f, "{value},{expected_impact}"),
        }
    }
}

/// Which form field a value belongs in, classified from its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `SC-` followed by six digits.
    ServiceComponent,
    /// Bare six digits.
    ServiceNumber,
}

/// Classifies a value by shape, or `None` for anything unrecognized.
pub fn classify_field(value: &str) -> Option<FieldKind> {
    if let Some(digits) = value.strip_prefix("SC-") {
        if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_digit()) {
            return Some(FieldKind::ServiceComponent);
        }
        return None;
    }
    if value.len() == 6 && value.chars().all(|c| c.is_ascii_digit()) {
        return Some(FieldKind::ServiceNumber);
    }
    None
}

/// Parses pasted search input: one term per line, trimmed, blanks dropped.
pub fn parse_search_items(raw: &str) -> Vec<WorkItem> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| WorkItem::Search(line.to_owned()))
        .collect()
}

/// Parses one raw form line of the shape `VALUE,Expected impact`.
///
/// The raw line format survives in the shared store between page reloads, so
/// this is also the parse the driver applies when it picks up the queue head.
pub fn parse_form_line(raw: &str) -> Result<WorkItem, String> {
    let mut parts = raw.trim().splitn(2, ',');
    let value = parts.next().unwrap_or_default().trim();
    let expected_impact = parts.next().map(str::trim).unwrap_or_default();
    if value.is_empty() || expected_impact.is_empty() {
        return Err(format!(
            "invalid format '{}': expected 'VALUE,Expected impact'",
            raw.trim()
        ));
    }
    let field = classify_field(value).ok_or_else(|| {
        format!("unrecognized value '{value}': expected 'SC-######' or '######'")
    })?;
    Ok(WorkItem::FormEntry {
        value: value.to_owned(),
        field,
        expected_impact: expected_impact.to_owned(),
    })
}
