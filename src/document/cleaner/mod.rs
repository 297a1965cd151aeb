
use fancy_regex::Regex;
use std::sync::LazyLock;

const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#x27;", "'"),
    ("&#x2F;", "/"),
];

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^<>]*>").expect("valid regex"));

/// Decode the HTML entities and paragraph markup found in item text
#[inline]
pub fn clean_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Tags go first so that decoded `&lt;` sequences are not mistaken for markup
    let mut cleaned = TAG_REGEX
        .replace_all(text, |caps: &fancy_regex::Captures| {
            let tag = caps.get(0).map_or("", |m| m.as_str());
            if tag == "<p>" || tag.starts_with("<br") {
                "\n"
            } else {
                ""
            }
        })
        .to_string();

    for (entity, replacement) in HTML_ENTITIES {
        cleaned = cleaned.replace(entity, replacement);
    }

    cleaned.trim().to_string()
}

/// Normalize whitespace in extracted text.
///
/// Line breaks (real or escaped as a literal `\n`) become spaces and runs of
/// whitespace collapse to one space. With `truncate_incomplete` the text is cut
/// after its last full stop to drop a dangling partial sentence.
#[inline]
pub fn clean_extracted_text(text: &str, truncate_incomplete: bool) -> String {
    let text = text.replace("\\n", " ");
    let mut cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if truncate_incomplete {
        if let Some(last_dot) = cleaned.rfind('.') {
            cleaned.truncate(last_dot + 1);
        }
    }

    cleaned
}
