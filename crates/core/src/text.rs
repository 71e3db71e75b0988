//! Text folding shared by every matcher that reads customer messages.
//!
//! Customers write from WhatsApp with or without accents, inverted
//! punctuation and mixed case. Matching always happens on the folded
//! form: lowercase ASCII words separated by single spaces.

pub fn fold(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    let mut last_was_space = true;

    for character in text.chars().flat_map(char::to_lowercase) {
        let mapped = match character {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        };

        if mapped.is_ascii_alphanumeric() {
            folded.push(mapped);
            last_was_space = false;
        } else if !last_was_space {
            folded.push(' ');
            last_was_space = true;
        }
    }

    if folded.ends_with(' ') {
        folded.pop();
    }
    folded
}

/// Whole-word phrase match against already folded text.
pub fn contains_phrase(folded: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let haystack = format!(" {folded} ");
    let needle = format!(" {phrase} ");
    haystack.contains(&needle)
}

pub fn contains_any(folded: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| contains_phrase(folded, phrase))
}

pub fn words(folded: &str) -> impl Iterator<Item = &str> {
    folded.split(' ').filter(|word| !word.is_empty())
}
