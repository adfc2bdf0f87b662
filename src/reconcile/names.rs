// String cleanup and contributor-name splitting

/// Remove control characters, collapse whitespace runs, and trim.
///
/// Replacement characters left behind by lossy decoding are dropped too.
pub fn clean_string(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_whitespace() || !c.is_control())
        .filter(|c| *c != '\u{FFFD}')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split an artist-style string into author names.
///
/// `" and "`, `" & "`, `";"` and `","` all separate names. Fragments of two
/// characters or fewer are dropped; if nothing survives, the whole string is
/// returned as a single author.
///
/// "and" only separates when it stands alone with a space on each side, so
/// names such as "Alexander Anderson" or "Sandra Brown" stay whole.
pub fn split_authors(s: &str) -> Vec<String> {
    let s = clean_string(s);
    if s.is_empty() {
        return Vec::new();
    }

    let normalized = s.replace(" and ", ",").replace(" & ", ",").replace(';', ",");
    let mut authors: Vec<String> = Vec::new();
    for piece in normalized.split(',').map(str::trim) {
        if piece.chars().count() > 2 && !authors.iter().any(|a| a == piece) {
            authors.push(piece.to_string());
        }
    }

    if authors.is_empty() {
        vec![s]
    } else {
        authors
    }
}

const CONNECTING_WORDS: &[&str] = &["and", "the", "by", "of"];
const LOWERCASE_WORDS: &[&str] = &["of", "the", "in", "on", "at", "to"];

/// Split a narrator string into distinct, consistently capitalised names.
///
/// Separators are `,` `;` `/` and `&`. Names differing only in case are
/// merged, keeping the better-capitalised spelling. The result is sorted.
pub fn split_narrators(s: &str) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();

    for part in s.split([',', ';', '/', '&']) {
        let Some(name) = normalize_narrator(part) else {
            continue;
        };
        match unique.iter_mut().find(|n| n.to_lowercase() == name.to_lowercase()) {
            Some(existing) => {
                if prefer_spelling(existing, &name) {
                    *existing = name;
                }
            }
            None => unique.push(name),
        }
    }

    unique.sort();
    unique
}

fn normalize_narrator(raw: &str) -> Option<String> {
    let name = clean_string(raw)
        .replace(" and ", " ")
        .replace(" AND ", " ")
        .replace(" - ", " ");
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");

    if name.chars().count() <= 2 || CONNECTING_WORDS.contains(&name.to_lowercase().as_str()) {
        return None;
    }
    // Initials such as "J." stay as written
    if name.chars().count() <= 3 && name.ends_with('.') {
        return Some(name);
    }

    let words: Vec<String> = name
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && LOWERCASE_WORDS.contains(&lower.as_str()) {
                lower
            } else if word == lower || word == word.to_uppercase() {
                capitalize(&lower)
            } else {
                // Mixed case such as "McDonald" is kept as written
                word.to_string()
            }
        })
        .collect();
    Some(words.join(" "))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether `candidate` should replace `existing` for the same name
fn prefer_spelling(existing: &str, candidate: &str) -> bool {
    let existing_words = existing.split_whitespace().count();
    let candidate_words = candidate.split_whitespace().count();
    if existing_words != candidate_words {
        return candidate_words > existing_words;
    }
    capitalized_words(candidate) > capitalized_words(existing)
}

fn capitalized_words(s: &str) -> usize {
    s.split_whitespace()
        .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
        .count()
}

/// Trim wrapped JPEG data to the bytes between the SOI and last EOI markers
pub fn find_jpeg_data(data: &[u8]) -> &[u8] {
    let Some(start) = data.windows(2).position(|w| w == [0xff, 0xd8]) else {
        return data;
    };
    match data.windows(2).rposition(|w| w == [0xff, 0xd9]) {
        Some(end) if end >= start => &data[start..end + 2],
        _ => &data[start..],
    }
}
