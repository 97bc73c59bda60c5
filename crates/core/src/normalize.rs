use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::Language;

/// Canonicalize raw text for gazetteer comparison: NFD decomposition,
/// combining marks stripped, locale-independent lowercase, Cyrillic
/// transliterated toward Slovak Latin values, whitespace collapsed.
///
/// Total and idempotent; code points outside the table pass through.
pub fn normalize(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());

    for ch in input.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        for lower in ch.to_lowercase() {
            match transliterate(lower) {
                Some(mapped) => folded.push_str(mapped),
                None => folded.push(lower),
            }
        }
    }

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cyrillic letters appearing in gazetteer aliases, mapped to the Latin
/// values their Slovak spellings fold to. Both aliases and messages pass
/// through the same table, so the romanization choice only has to be
/// consistent, not standard.
///
/// `й` and `ё` decompose under NFD to `и`/`е` plus a mark, so they never
/// reach this table directly.
fn transliterate(c: char) -> Option<&'static str> {
    let mapped = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "h",
        'ґ' => "g",
        'д' => "d",
        'е' => "e",
        'є' => "je",
        'ж' => "z",
        'з' => "z",
        'и' => "y",
        'і' => "i",
        'ї' => "ji",
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
        'х' => "ch",
        'ц' => "c",
        'ч' => "c",
        'ш' => "s",
        'щ' => "sc",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "ju",
        'я' => "ia",
        _ => return None,
    };
    Some(mapped)
}

/// Script-based language detection used as the tie-break hint when the
/// caller does not supply one. Latin scripts are left undecided rather
/// than guessed.
pub fn detect_language(explicit: Option<Language>, text: &str) -> Language {
    if let Some(language) = explicit {
        if language != Language::Unknown {
            return language;
        }
    }

    let mut cyrillic_count = 0usize;
    let mut ukrainian_count = 0usize;

    for ch in text.chars() {
        let code = ch as u32;
        if (0x0400..=0x04FF).contains(&code) {
            cyrillic_count += 1;
        }
        if matches!(ch, 'і' | 'ї' | 'є' | 'ґ' | 'І' | 'Ї' | 'Є' | 'Ґ') {
            ukrainian_count += 1;
        }
    }

    if ukrainian_count > 0 {
        Language::Uk
    } else if cyrillic_count > 0 {
        Language::Ru
    } else {
        Language::Unknown
    }
}
