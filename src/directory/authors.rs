// Author folder names: "First Last", "Last, First", and lists of either

use super::AuthorName;

/// Separators between several authors, tried in order
const SEPARATORS: &[&str] = &[" and ", " & ", "; ", ", "];

/// Parse an author folder name into author names.
///
/// `", "` is ambiguous: `"Sanderson, Brandon"` is one inverted name while
/// `"Brandon Sanderson, Janci Patterson"` is two. It only splits authors when
/// every piece has more than one word. A single-word name yields no author.
pub fn parse_author_folder(name: &str) -> Vec<AuthorName> {
    let name = name.trim();
    if name.is_empty() {
        return Vec::new();
    }

    let pieces: Vec<&str> = SEPARATORS
        .iter()
        .find(|sep| name.contains(**sep))
        .map(|sep| {
            let pieces: Vec<&str> = name.split(*sep).map(str::trim).collect();
            if *sep == ", " && pieces.iter().any(|p| p.split_whitespace().count() < 2) {
                vec![name]
            } else {
                pieces
            }
        })
        .unwrap_or_else(|| vec![name]);

    pieces
        .into_iter()
        .filter(|p| !p.is_empty())
        .filter_map(parse_author_name)
        .collect()
}

fn parse_author_name(name: &str) -> Option<AuthorName> {
    if let Some((last, first)) = name.split_once(", ") {
        let (first, last) = (first.trim(), last.trim());
        if first.is_empty() || last.is_empty() {
            return None;
        }
        return Some(AuthorName {
            first_name: first.to_string(),
            last_name: last.to_string(),
        });
    }

    let words: Vec<&str> = name.split_whitespace().collect();
    match words.split_last() {
        Some((last, first)) if !first.is_empty() => Some(AuthorName {
            first_name: first.join(" "),
            last_name: last.to_string(),
        }),
        _ => None,
    }
}
