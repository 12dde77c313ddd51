//! Derived output fields: first name, owner token, county formatting.

/// Lowercases a name and replaces punctuation with spaces so that
/// `"No-Name"`, `"no name."`, and `"NO NAME"` all compare equal.
fn fold_name(value: &str) -> String {
    let mut folded = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            folded.extend(ch.to_lowercase());
        } else {
            folded.push(' ');
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_placeholder(value: &str, placeholders: &[String]) -> bool {
    let folded = fold_name(value);
    folded.is_empty() || placeholders.iter().any(|p| fold_name(p) == folded)
}

fn starts_with_placeholder(value: &str, placeholders: &[String]) -> bool {
    let folded = fold_name(value);
    placeholders.iter().any(|p| {
        let prefix = fold_name(p);
        !prefix.is_empty() && folded.starts_with(&prefix)
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Extracts the first name for the export.
///
/// A contact equal to one of the configured placeholders (or empty) falls
/// back to the first token of the deal title, unless the title itself opens
/// with a placeholder phrase, in which case the result is empty.
pub fn extract_first_name(contact_person: &str, deal_title: &str, placeholders: &[String]) -> String {
    let name = contact_person.trim();
    if is_placeholder(name, placeholders) {
        let title = deal_title.trim();
        if title.is_empty() || starts_with_placeholder(title, placeholders) {
            return String::new();
        }
        return title
            .split_whitespace()
            .next()
            .map(capitalize)
            .unwrap_or_default();
    }

    name.split([' ', '/'])
        .next()
        .map(|word| capitalize(word.trim()))
        .unwrap_or_default()
}

/// First whitespace-delimited token of the owner field, or empty.
pub fn owner_first_token(deal_owner: &str) -> String {
    deal_owner
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_string()
}

/// Formats the comma-separated county list for the export.
///
/// Counties are grouped in pairs; a single group renders quoted as-is, and
/// multiple groups are joined with a final `and` (no Oxford comma). Empty
/// input renders empty.
pub fn format_county(deal_county: &str) -> String {
    let counties: Vec<&str> = deal_county
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if counties.is_empty() {
        return String::new();
    }

    let grouped: Vec<String> = counties.chunks(2).map(|pair| pair.join(", ")).collect();
    match grouped.as_slice() {
        [single] => format!("\"{single}\""),
        [first, second] => format!("\"{first} and {second}\""),
        _ => match grouped.split_last() {
            Some((last, rest)) => format!("\"{} and {last}\"", rest.join(", ")),
            None => String::new(),
        },
    }
}
