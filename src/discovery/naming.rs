//! Fallback title/slug derivation from a filename when front matter leaves
//! `title` unset.
//!
//! Generalized from the teacher's `NNN-name` convention parser: Bengal has
//! no numeric-prefix ordering (ordering here comes from front-matter
//! `weight`, per §4.5), but the same "split off decoration, turn dashes
//! into spaces for display" shape is reused for deriving a human title from
//! a bare filename stem (`my-first-post` → "My First Post").

/// Derive a display title from a filename stem with no front-matter title.
/// Dashes and underscores become spaces; each word is capitalized.
pub fn title_from_stem(stem: &str) -> String {
    stem.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Slugify a raw term/filename for URL use: lowercase, non-alphanumeric
/// runs collapsed to a single `-`, leading/trailing `-` trimmed.
pub fn slugify(input: &str) -> String {
    slug::slugify(input)
}
