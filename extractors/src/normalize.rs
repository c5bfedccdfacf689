//! Normalization of spoken numbers, vague quantifiers and units.
//!
//! These rules are part of the extraction contract, not incidental model
//! behavior: "a couple" is always 2, "a few" is always 3, "some" is
//! always 5, and a spoken range keeps both ends.

/// A parsed numeric phrase: a single value or a spoken range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedNumber {
    Single(f64),
    Range { min: f64, max: f64 },
}

impl ParsedNumber {
    /// Downstream estimates use the max of a range
    pub fn max(&self) -> f64 {
        match self {
            ParsedNumber::Single(v) => *v,
            ParsedNumber::Range { max, .. } => *max,
        }
    }
}

const WORD_NUMBERS: &[(&str, f64)] = &[
    ("one", 1.0),
    ("two", 2.0),
    ("three", 3.0),
    ("four", 4.0),
    ("five", 5.0),
    ("six", 6.0),
    ("seven", 7.0),
    ("eight", 8.0),
    ("nine", 9.0),
    ("ten", 10.0),
    ("eleven", 11.0),
    ("twelve", 12.0),
];

// Filler that carries no numeric information once the quantifier is known
const NOISE_WORDS: &[&str] = &[
    "about", "around", "roughly", "maybe", "approximately", "of", "hours", "hour", "hrs", "hr",
    "days", "day", "weeks", "week", "people", "person",
];

fn word_to_number(word: &str) -> Option<f64> {
    if let Ok(v) = word.parse::<f64>() {
        return if v.is_finite() { Some(v) } else { None };
    }
    WORD_NUMBERS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, v)| *v)
}

fn strip_noise(phrase: &str) -> Vec<&str> {
    phrase
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty() && !NOISE_WORDS.contains(w))
        .collect()
}

/// Parse a spoken numeric phrase into a value or range.
///
/// Fixed quantifiers: "a couple" → 2, "a few" → 3, "some" → 5.
/// Ranges: "three or four", "3 to 4", "3-4". Unparseable phrases are
/// `None` — unknown is null, never zero.
pub fn parse_numeric_phrase(phrase: &str) -> Option<ParsedNumber> {
    let lower = phrase.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    // Fixed vague quantifiers take priority over anything else in the phrase
    if lower.contains("couple") {
        return Some(ParsedNumber::Single(2.0));
    }
    if lower.contains("few") {
        return Some(ParsedNumber::Single(3.0));
    }
    if lower.contains("several") {
        return Some(ParsedNumber::Single(3.0));
    }
    if lower.contains("some") {
        return Some(ParsedNumber::Single(5.0));
    }
    if lower.contains("half a dozen") {
        return Some(ParsedNumber::Single(6.0));
    }
    if lower.contains("dozen") {
        return Some(ParsedNumber::Single(12.0));
    }

    let words: Vec<&str> = strip_noise(&lower)
        .into_iter()
        .filter(|w| *w != "a" && *w != "an")
        .collect();

    // Hyphenated range, e.g. "3-4" or "3-4 days" once the unit is stripped
    if let [token] = words.as_slice() {
        if let Some((a, b)) = token.split_once('-') {
            if let (Some(min), Some(max)) = (word_to_number(a.trim()), word_to_number(b.trim())) {
                return Some(ParsedNumber::Range { min, max });
            }
        }
    }

    // "three or four", "three to four", "3 - 4"
    if words.len() == 3 && (words[1] == "or" || words[1] == "to" || words[1] == "-") {
        if let (Some(min), Some(max)) = (word_to_number(words[0]), word_to_number(words[2])) {
            return Some(ParsedNumber::Range { min, max });
        }
    }

    if words.len() == 1 {
        return word_to_number(words[0]).map(ParsedNumber::Single);
    }

    // "a" / "an" with everything else stripped means one unit was spoken
    if words.is_empty() {
        let had_article = lower.split_whitespace().any(|w| w == "a" || w == "an");
        if had_article {
            return Some(ParsedNumber::Single(1.0));
        }
    }

    None
}

const UNIT_ALIASES: &[(&[&str], &str)] = &[
    (&["metres", "meters", "metre", "meter", "m", "lm", "lineal metres", "linear metres"], "m"),
    (&["square metres", "square meters", "sqm", "m2", "sq m"], "sqm"),
    (&["cubic metres", "cubic meters", "m3"], "m3"),
    (&["millimetres", "millimeters", "mm"], "mm"),
    (&["litres", "liters", "litre", "liter", "l"], "l"),
    (&["kilograms", "kilogram", "kgs", "kg"], "kg"),
    (&["hours", "hour", "hrs", "hr", "h"], "hr"),
    (&["each", "ea", "item", "items", "unit", "units"], "ea"),
    (&["bags", "bag"], "bag"),
    (&["sheets", "sheet"], "sheet"),
    (&["lengths", "length"], "length"),
    (&["boxes", "box"], "box"),
    (&["rolls", "roll"], "roll"),
];

/// Collapse spoken unit variants onto a canonical short form; unknown
/// units pass through lowercased.
pub fn canonical_unit(unit: &str) -> String {
    let lower = unit.trim().to_lowercase();
    for (aliases, canonical) in UNIT_ALIASES {
        if aliases.contains(&lower.as_str()) {
            return (*canonical).to_string();
        }
    }
    lower
}

/// NaN and infinities never survive; unknown stays unknown
pub fn sanitize_number(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vague_durations() {
        assert_eq!(
            parse_numeric_phrase("a couple hours"),
            Some(ParsedNumber::Single(2.0))
        );
        assert_eq!(
            parse_numeric_phrase("a few days"),
            Some(ParsedNumber::Single(3.0))
        );
        assert_eq!(
            parse_numeric_phrase("couple days"),
            Some(ParsedNumber::Single(2.0))
        );
    }

    #[test]
    fn test_vague_quantities() {
        assert_eq!(parse_numeric_phrase("a couple"), Some(ParsedNumber::Single(2.0)));
        assert_eq!(parse_numeric_phrase("a few"), Some(ParsedNumber::Single(3.0)));
        assert_eq!(parse_numeric_phrase("some"), Some(ParsedNumber::Single(5.0)));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(
            parse_numeric_phrase("three or four days"),
            Some(ParsedNumber::Range { min: 3.0, max: 4.0 })
        );
        assert_eq!(
            parse_numeric_phrase("3 to 4"),
            Some(ParsedNumber::Range { min: 3.0, max: 4.0 })
        );
        assert_eq!(
            parse_numeric_phrase("3-4"),
            Some(ParsedNumber::Range { min: 3.0, max: 4.0 })
        );
        assert_eq!(
            parse_numeric_phrase("3-4 days"),
            Some(ParsedNumber::Range { min: 3.0, max: 4.0 })
        );
        assert_eq!(
            parse_numeric_phrase("about 3 - 4 hours"),
            Some(ParsedNumber::Range { min: 3.0, max: 4.0 })
        );
        assert_eq!(
            parse_numeric_phrase("three or four days").unwrap().max(),
            4.0
        );
    }

    #[test]
    fn test_word_and_digit_numbers() {
        assert_eq!(parse_numeric_phrase("six"), Some(ParsedNumber::Single(6.0)));
        assert_eq!(parse_numeric_phrase("2.5 hours"), Some(ParsedNumber::Single(2.5)));
        assert_eq!(parse_numeric_phrase("ten days"), Some(ParsedNumber::Single(10.0)));
    }

    #[test]
    fn test_single_article_means_one() {
        assert_eq!(parse_numeric_phrase("a day"), Some(ParsedNumber::Single(1.0)));
        assert_eq!(parse_numeric_phrase("an hour"), Some(ParsedNumber::Single(1.0)));
    }

    #[test]
    fn test_unparseable_is_none_not_zero() {
        assert_eq!(parse_numeric_phrase("depends on the weather"), None);
        assert_eq!(parse_numeric_phrase(""), None);
    }

    #[test]
    fn test_unit_aliases() {
        for alias in ["metres", "meters", "m", "lm"] {
            assert_eq!(canonical_unit(alias), "m");
        }
        for alias in ["square metres", "sqm", "m2"] {
            assert_eq!(canonical_unit(alias), "sqm");
        }
        assert_eq!(canonical_unit("Litres"), "l");
        assert_eq!(canonical_unit("EA"), "ea");
        assert_eq!(canonical_unit("hrs"), "hr");
        // unknown units pass through lowercased
        assert_eq!(canonical_unit("Pallets"), "pallets");
    }

    #[test]
    fn test_sanitize_number() {
        assert_eq!(sanitize_number(0.0), Some(0.0));
        assert_eq!(sanitize_number(f64::NAN), None);
        assert_eq!(sanitize_number(f64::INFINITY), None);
    }
}
