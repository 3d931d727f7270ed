// diagnostics-service-rs/src/parser.rs
//
// Extraction of labeled fields from semi-structured inference output.

/// Substituted when the model never produced a `Title:` label.
pub const TITLE_PLACEHOLDER: &str = "Title not found";
/// Substituted when the model never produced a `Description:` label.
pub const DESCRIPTION_PLACEHOLDER: &str = "Description not found";

/// A title/description pair ready for publication.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
}

/// Raw extraction result. A `None` field means the label was absent from
/// the inference output; the draft loop keys its retry decision on the
/// title field, so absence is kept distinct from a placeholder here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftFields {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl DraftFields {
    /// True when a non-empty title was extracted.
    pub fn has_title(&self) -> bool {
        self.title.as_deref().map_or(false, |t| !t.trim().is_empty())
    }

    /// Commits the fields to a publishable draft, substituting the
    /// human-readable placeholders for anything the model left out.
    pub fn resolve(self) -> IssueDraft {
        IssueDraft {
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string()),
            description: self
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DESCRIPTION_PLACEHOLDER.to_string()),
        }
    }
}

/// Extracts `Title:` (rest of that line) and `Description:` (remainder of
/// the text, multi-line) from inference output.
///
/// Labels are matched at line starts, tolerating leading whitespace and
/// markdown decoration (`*`, `#`).
pub fn extract_title_description(text: &str) -> DraftFields {
    let mut fields = DraftFields::default();

    for line in text.lines() {
        let stripped = strip_decoration(line);
        if let Some(rest) = stripped.strip_prefix("Title:") {
            fields.title = Some(clean_value(rest).to_string());
            break;
        }
    }

    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let stripped = strip_decoration(line);
        if stripped.starts_with("Description:") {
            // Take the remainder of the whole text from just past the label.
            let label_start = offset + (line.len() - stripped.len());
            let value_start = label_start + "Description:".len();
            fields.description = Some(clean_value(&text[value_start..]).to_string());
            break;
        }
        offset += line.len();
    }

    fields
}

/// The diagnosis path treats the full inference output as opaque analysis
/// text; only surrounding whitespace is normalized.
pub fn extract_analysis(text: &str) -> String {
    text.trim().to_string()
}

fn strip_decoration(line: &str) -> &str {
    line.trim_start_matches(|c: char| c.is_whitespace() || c == '*' || c == '#')
}

fn clean_value(value: &str) -> &str {
    value
        .trim()
        .trim_start_matches('*')
        .trim_end_matches('*')
        .trim()
}
