//! Hierarchical path derivation.
//!
//! A site's path is the slash-joined chain of its ancestors' slugs
//! followed by its own, e.g. `/main-parking/zone-a`.

/// Derive a URL-safe slug from a display name.
///
/// Lowercases, drops everything outside `[a-z0-9 -]`, turns whitespace
/// runs into a single hyphen, collapses hyphen runs and trims hyphens
/// from both ends. Total over any input; empty input yields `""`.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;

    for ch in lowered.chars() {
        match ch {
            'a'..='z' | '0'..='9' => {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(ch);
            }
            ' ' | '-' => pending_hyphen = true,
            _ => {}
        }
    }

    slug
}

/// Compute the path for a site named `name_en` under `parent_path`.
pub fn compute_path(parent_path: Option<&str>, name_en: &str) -> String {
    let slug = slugify(name_en);
    match parent_path {
        Some(parent) if !parent.is_empty() => format!("{parent}/{slug}"),
        _ => format!("/{slug}"),
    }
}
