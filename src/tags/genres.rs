//! ID3v1 genre codes
//!
//! Numeric genres are shared by ID3v2 `TCON` frames (`"(17)"`, `"17"`,
//! `"(17)Rock"`) and the MP4 `gnre` atom (code + 1).

/// Genre names indexed by ID3v1 code (0-79 standard, 80-191 Winamp extensions)
pub const GENRES: &[&str] = &[
    "Blues",
    "Classic Rock",
    "Country",
    "Dance",
    "Disco",
    "Funk",
    "Grunge",
    "Hip-Hop",
    "Jazz",
    "Metal",
    "New Age",
    "Oldies",
    "Other",
    "Pop",
    "R&B",
    "Rap",
    "Reggae",
    "Rock",
    "Techno",
    "Industrial",
    "Alternative",
    "Ska",
    "Death Metal",
    "Pranks",
    "Soundtrack",
    "Euro-Techno",
    "Ambient",
    "Trip-Hop",
    "Vocal",
    "Jazz+Funk",
    "Fusion",
    "Trance",
    "Classical",
    "Instrumental",
    "Acid",
    "House",
    "Game",
    "Sound Clip",
    "Gospel",
    "Noise",
    "AlternRock",
    "Bass",
    "Soul",
    "Punk",
    "Space",
    "Meditative",
    "Instrumental Pop",
    "Instrumental Rock",
    "Ethnic",
    "Gothic",
    "Darkwave",
    "Techno-Industrial",
    "Electronic",
    "Pop-Folk",
    "Eurodance",
    "Dream",
    "Southern Rock",
    "Comedy",
    "Cult",
    "Gangsta",
    "Top 40",
    "Christian Rap",
    "Pop/Funk",
    "Jungle",
    "Native American",
    "Cabaret",
    "New Wave",
    "Psychedelic",
    "Rave",
    "Showtunes",
    "Trailer",
    "Lo-Fi",
    "Tribal",
    "Acid Punk",
    "Acid Jazz",
    "Polka",
    "Retro",
    "Musical",
    "Rock & Roll",
    "Hard Rock",
    "Folk",
    "Folk-Rock",
    "National Folk",
    "Swing",
    "Fast Fusion",
    "Bebob",
    "Latin",
    "Revival",
    "Celtic",
    "Bluegrass",
    "Avantgarde",
    "Gothic Rock",
    "Progressive Rock",
    "Psychedelic Rock",
    "Symphonic Rock",
    "Slow Rock",
    "Big Band",
    "Chorus",
    "Easy Listening",
    "Acoustic",
    "Humour",
    "Speech",
    "Chanson",
    "Opera",
    "Chamber Music",
    "Sonata",
    "Symphony",
    "Booty Bass",
    "Primus",
    "Porn Groove",
    "Satire",
    "Slow Jam",
    "Club",
    "Tango",
    "Samba",
    "Folklore",
    "Ballad",
    "Power Ballad",
    "Rhythmic Soul",
    "Freestyle",
    "Duet",
    "Punk Rock",
    "Drum Solo",
    "A capella",
    "Euro-House",
    "Dance Hall",
    "Goa",
    "Drum & Bass",
    "Club-House",
    "Hardcore",
    "Terror",
    "Indie",
    "Britpop",
    "Negerpunk",
    "Polsk Punk",
    "Beat",
    "Christian Gangsta Rap",
    "Heavy Metal",
    "Black Metal",
    "Crossover",
    "Contemporary Christian",
    "Christian Rock",
    "Merengue",
    "Salsa",
    "Thrash Metal",
    "Anime",
    "JPop",
    "Synthpop",
    "Abstract",
    "Art Rock",
    "Baroque",
    "Bhangra",
    "Big Beat",
    "Breakbeat",
    "Chillout",
    "Downtempo",
    "Dub",
    "EBM",
    "Eclectic",
    "Electro",
    "Electroclash",
    "Emo",
    "Experimental",
    "Garage",
    "Global",
    "IDM",
    "Illbient",
    "Industro-Goth",
    "Jam Band",
    "Krautrock",
    "Leftfield",
    "Lounge",
    "Math Rock",
    "New Romantic",
    "Nu-Breakz",
    "Post-Punk",
    "Post-Rock",
    "Psytrance",
    "Shoegaze",
    "Space Rock",
    "Trop Rock",
    "World Music",
    "Neoclassical",
    "Audiobook",
    "Audio Theatre",
    "Neue Deutsche Welle",
    "Podcast",
    "Indie Rock",
    "G-Funk",
    "Dubstep",
    "Garage Rock",
    "Psybient",
];

/// Look up a genre name by ID3v1 code
pub fn by_code(code: usize) -> Option<&'static str> {
    GENRES.get(code).copied()
}

/// Resolve a `TCON` value to a genre name.
///
/// Handles plain text, bare codes, parenthesised codes with or without a
/// trailing refinement, `RX`/`CR`, and ID3v2.4 null-separated lists (already
/// joined with `;` by the frame decoder).
pub fn resolve(raw: &str) -> String {
    let parts: Vec<String> = raw
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(resolve_one)
        .filter(|p| !p.is_empty())
        .collect();

    let mut unique: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts {
        if !unique.contains(&part) {
            unique.push(part);
        }
    }
    unique.join(";")
}

fn resolve_one(raw: &str) -> String {
    match raw {
        "RX" => return "Remix".to_string(),
        "CR" => return "Cover".to_string(),
        _ => {}
    }

    if let Ok(code) = raw.parse::<usize>() {
        return by_code(code).unwrap_or(raw).to_string();
    }

    // "(17)" or "(17)Rock" or "((literal" escape
    if let Some(rest) = raw.strip_prefix('(') {
        if rest.starts_with('(') {
            return rest.to_string();
        }
        if let Some(close) = rest.find(')') {
            let refinement = rest[close + 1..].trim();
            if !refinement.is_empty() {
                return refinement.to_string();
            }
            let code = &rest[..close];
            return match code {
                "RX" => "Remix".to_string(),
                "CR" => "Cover".to_string(),
                _ => code
                    .parse::<usize>()
                    .ok()
                    .and_then(by_code)
                    .map(String::from)
                    .unwrap_or_default(),
            };
        }
    }

    raw.to_string()
}
