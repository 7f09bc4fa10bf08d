//! Generates candidate email addresses from a person's name and domain.

/// Returns the fixed, priority-ordered candidate list for a person:
/// `first.last`, `first`, `firstlast`, `f.last`, `first.l`, `flast`, `firstl`,
/// all `@domain`.
///
/// Names are trimmed and lower-cased. Returns an empty vector when any input
/// is empty after trimming.
pub fn generate_email_patterns(first_name: &str, last_name: &str, domain: &str) -> Vec<String> {
    let first = first_name.trim().to_lowercase();
    let last = last_name.trim().to_lowercase();
    let domain = domain.trim();

    let (Some(f), Some(l)) = (first.chars().next(), last.chars().next()) else {
        tracing::debug!(
            "Cannot generate patterns: empty name part (Original: '{} {}')",
            first_name,
            last_name
        );
        return Vec::new();
    };
    if domain.is_empty() {
        tracing::debug!("Cannot generate patterns: empty domain");
        return Vec::new();
    }

    let local_parts = [
        format!("{}.{}", first, last),
        first.clone(),
        format!("{}{}", first, last),
        format!("{}.{}", f, last),
        format!("{}.{}", first, l),
        format!("{}{}", f, last),
        format!("{}{}", first, l),
    ];

    let patterns: Vec<String> = local_parts
        .iter()
        .map(|local| format!("{}@{}", local, domain))
        .collect();

    tracing::trace!(
        "Generated {} patterns for '{} {}' @ '{}'",
        patterns.len(),
        first_name,
        last_name,
        domain
    );
    patterns
}
