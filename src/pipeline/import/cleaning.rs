//! Normalisation of text lifted from scanned or exported tax documents.

use std::sync::LazyLock;

use regex::Regex;

/// Lines at least this long are paragraphs and never re-joined.
const SHORT_LINE: usize = 80;

static LEADING_DEBRIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[\s\\/'")(]{0,5}"#).unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());
static BRACKETED_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\[({]\s*[A-Z]").unwrap());
static RUPEE_DOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Rs\s+\.\s+").unwrap());
static DASH_RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{4,}").unwrap());

/// Misreads seen on Form 16 and TRACES printouts.
static MISREADS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"(?i)FORM\s+1S(\D|$)").unwrap(), "FORM NO. 16$1"),
        (Regex::new(r"(?i)Governmentof").unwrap(), "Government of"),
        (Regex::new(r"(?i)Lastupdated").unwrap(), "Last updated"),
        (Regex::new(r"(?i)\(1f\s+available").unwrap(), "(If available"),
        (Regex::new(r"(?i)Enablin\s+g\s+System").unwrap(), "Enabling System"),
        (Regex::new(r"(?i)TRACES\s*-").unwrap(), "TRACES -"),
    ]
});

/// Clean extracted text without changing any figure in it.
pub fn clean_extracted_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let text = LEADING_DEBRIS.replace(text, "");
    let text = text.replace("\\'", "'").replace('\\', "");
    let text = text.replace("\r\n", "\n");
    let text = MULTI_SPACE.replace_all(&text, " ");

    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let mut line = lines[i].trim_end().to_string();
        let next = lines.get(i + 1).copied().unwrap_or("");
        if ends_lowercase(&line) && starts_lowercase(next) && line.chars().count() < SHORT_LINE {
            line.push_str(next.trim());
            i += 2;
        } else {
            i += 1;
        }

        let line = strip_orphans(&line).trim_end().to_string();
        if line.is_empty() {
            // Keep at most one blank line between paragraphs
            if out.last().is_some_and(|l| !l.is_empty()) {
                out.push(line);
            }
        } else {
            out.push(line);
        }
    }

    let mut text = out.join("\n");
    for (pattern, replacement) in MISREADS.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    let text = RUPEE_DOT.replace_all(&text, "Rs. ");
    let text = DASH_RULE.replace_all(&text, "---");
    let text = MULTI_SPACE.replace_all(&text, " ");

    text.trim().to_string()
}

fn ends_lowercase(line: &str) -> bool {
    line.chars().last().is_some_and(|c| c.is_lowercase())
}

fn starts_lowercase(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_lowercase())
}

/// Drop up to two stray symbols in front of a capital or digit.
fn strip_orphans(line: &str) -> &str {
    if BRACKETED_HEADING.is_match(line) {
        return line;
    }
    let chars: Vec<(usize, char)> = line.char_indices().take(3).collect();
    for n in (1..=2).rev() {
        let Some(&(idx, next)) = chars.get(n) else {
            continue;
        };
        let debris = chars[..n]
            .iter()
            .all(|(_, c)| !(c.is_alphanumeric() || *c == '_'));
        if debris && (next.is_ascii_uppercase() || next.is_ascii_digit()) {
            return &line[idx..];
        }
    }
    line
}
