//! Venue name normalization: the join key for every venue lookup.
//!
//! Venue names arrive written inconsistently across languages and scripts
//! ("AUM Center, Koh Phangan", "AUM Phangan", "aum"). Normalization maps all
//! surface forms of a venue onto one canonical lookup key. The output must be
//! stable across process restarts: no randomness, no locale dependency.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Trailing location qualifiers stripped before lookup.
const LOCATION_SUFFIXES: &[&str] = &[
    ", koh phangan", ", ko phangan", ", ko pha-ngan",
    ", ко-панган", ", ко панган", ", панган",
    ", phangan", ", phangan island",
    ", haad rin", ", haad yao", ", haad salad",
    ", thong sala", ", ban tai", ", chaloklum",
    ", chaweng", ", samui", ", maduea wan",
    " koh phangan", " ko phangan",
    " (koh phangan)", " (ko phangan)",
    " (phangan)",
];

/// Known alias surface forms, normalized → canonical key.
///
/// Many-to-one: several spellings point at one venue. Entries are curated
/// offline; lookup-time identity is assumed stable.
const VENUE_ALIASES: &[(&str, &str)] = &[
    ("aum", "aum sound healing center"),
    ("aum center", "aum sound healing center"),
    ("aum soundhealing center", "aum sound healing center"),
    ("aum soundhealing", "aum sound healing center"),
    ("aum phangan", "aum sound healing center"),
    ("aum sound center", "aum sound healing center"),
    ("kefir", "kefir family restaurant"),
    ("kefir restaurant", "kefir family restaurant"),
    ("sunset hill", "sunset hill resort"),
    ("sunset hill restaurant", "sunset hill resort"),
    ("nashe mesto", "mesto"),
    ("mesto phangan", "mesto"),
    ("mesto копанган", "mesto"),
    ("plunktone restaurant", "planktone restaurant lounge"),
    ("planktone restaurant  lounge", "planktone restaurant lounge"),
    ("planktone restaurant lounge chaweng", "planktone restaurant lounge"),
    ("sati yoga koh phangan", "sati yoga"),
    ("shivari amphitheater", "shivari"),
    ("shivari center", "shivari"),
    ("shivari koh phangan", "shivari"),
    ("lost paradise koh phangan", "lost paradise"),
    ("indriya retreat center koh phangan", "indriya retreat"),
    ("unclave koh phangan", "unclave"),
    ("the wave koh phangan", "the wave"),
    ("stay gold cafe  bar", "stay gold"),
    ("stay gold ko phangan", "stay gold"),
    ("soul terra phangan", "soulterra phangan"),
    ("soulterra phangan", "soulterra phangan"),
    ("catch phangan", "catch"),
    ("7eleven haad rin", "7eleven"),
    ("711", "7eleven"),
    ("711 meeting point", "7eleven"),
];

static ALIASES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| VENUE_ALIASES.iter().copied().collect());

/// Normalize a free-text venue name to its canonical lookup key.
///
/// Steps: lowercase and trim; then, to a fixed point, strip one trailing
/// location suffix, drop everything outside Latin/Cyrillic letters, digits
/// and spaces, and collapse whitespace; finally substitute through the alias
/// table. Iterating to a fixed point makes the function idempotent even when
/// punctuation removal exposes a new trailing suffix.
pub fn normalize_venue_name(name: &str) -> String {
    let mut current = name.to_lowercase().trim().to_string();
    loop {
        let before = current.clone();
        current = strip_location_suffix(&current);
        current = clean(&current);
        if current == before {
            break;
        }
    }
    match ALIASES.get(current.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => current,
    }
}

fn strip_location_suffix(name: &str) -> String {
    for suffix in LOCATION_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return stripped.trim().to_string();
        }
    }
    name.to_string()
}

fn clean(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric() || ('а'..='я').contains(c) || *c == 'ё' || *c == ' '
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the text contains any Cyrillic letter.
pub fn contains_cyrillic(text: &str) -> bool {
    text.chars()
        .any(|c| ('А'..='я').contains(&c) || c == 'ё' || c == 'Ё')
}

/// Transliterate Cyrillic to Latin, preserving case; other characters pass
/// through unchanged. Fallback search form for venues written in Russian.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let lower: char = c.to_lowercase().next().unwrap_or(c);
        match latin_for(lower) {
            Some(latin) => {
                if c.is_uppercase() && !latin.is_empty() {
                    let mut chars = latin.chars();
                    if let Some(first) = chars.next() {
                        out.extend(first.to_uppercase());
                        out.push_str(chars.as_str());
                    }
                } else {
                    out.push_str(latin);
                }
            }
            None => out.push(c),
        }
    }
    out
}

fn latin_for(c: char) -> Option<&'static str> {
    Some(match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    })
}
