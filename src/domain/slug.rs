//! Ids derived from display names

/// Derive a record id from a display name.
///
/// Lower-cases the name, collapses every run of non-alphanumeric characters
/// into one hyphen and trims hyphens from both ends: `"Erebor Gate"` becomes
/// `"erebor-gate"`. Only ASCII letters and digits survive, so a name with
/// none of them yields an empty string.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}
