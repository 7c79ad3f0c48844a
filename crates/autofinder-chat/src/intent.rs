//! Keyword-driven intent classification for a single utterance.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::fold;

/// Coarse purpose of a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CarSearch,
    Smalltalk,
    Other,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CarSearch => "car_search",
            Intent::Smalltalk => "smalltalk",
            Intent::Other => "other",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Keyword tables (folded: lowercase, no diacritics)
// =============================================================================

/// Greetings, thanks and farewells. Matched as whole words.
static SMALLTALK_MARKERS: &[&str] = &[
    "bonjour", "bonsoir", "salut", "coucou", "hello", "hey", "hi", "merci", "thanks",
    "thank you", "au revoir", "aurevoir", "bye", "goodbye", "ca va", "cv", "salam", "slm",
    "good morning", "good evening",
];

/// Car-domain vocabulary. Matched at a word start; entries ending in `\b`
/// must also end on a word boundary.
static CAR_KEYWORDS: &[&str] = &[
    // vehicles and renting
    "voiture", r"autos?\b", "automobile", "vehicule", "vehicle", r"car\b", r"cars\b",
    "location", "louer", r"rent\b", "rental",
    // fuel and gearbox
    "diesel", "essence", "gasoline", "petrol", "hybride", "hybrid", "electrique", "electric",
    "automatique", "automatic", "manuelle", "manual", "boite", "gearbox",
    // price and currency
    "prix", "price", "budget", r"dh\b", r"dhs\b", r"mad\b", "dirham",
    // distance
    r"km\b", r"kms\b", "kilomet", "kilometr", "mileage",
    // body styles
    r"suv\b", "berline", "sedan", "citadine", "4x4", "hatchback",
    // brand and model
    "marque", "brand", "modele", "model",
];

struct IntentPatterns {
    smalltalk: Regex,
    car: Regex,
    quantity: Regex,
}

static INTENT_PATTERNS: LazyLock<IntentPatterns> = LazyLock::new(|| {
    let smalltalk = SMALLTALK_MARKERS
        .iter()
        .map(|m| regex::escape(m))
        .collect::<Vec<_>>()
        .join("|");
    let car = CAR_KEYWORDS.join("|");

    IntentPatterns {
        smalltalk: Regex::new(&format!(r"\b(?:{smalltalk})\b")).expect("Invalid smalltalk regex"),
        car: Regex::new(&format!(r"\b(?:{car})")).expect("Invalid car keyword regex"),
        quantity: Regex::new(r"\b\d{2,}\s*(?:kms?|kilom|(?:dhs?|mad)\b)")
            .expect("Invalid quantity regex"),
    }
});

// =============================================================================
// IntentClassifier
// =============================================================================

/// Rule-based classifier. Pure and total: every input yields an intent.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify one utterance. Rules apply in order, first match wins:
    ///
    /// 1. blank text is smalltalk;
    /// 2. a smalltalk marker without car vocabulary is smalltalk;
    /// 3. a smalltalk marker with car vocabulary is a car search;
    /// 4. a number of two or more digits followed by a distance or currency
    ///    unit is a car search;
    /// 5. any car vocabulary is a car search;
    /// 6. anything else is other.
    pub fn classify(&self, text: &str) -> Intent {
        let folded = fold(text.trim());
        if folded.is_empty() {
            return Intent::Smalltalk;
        }

        let pats = &*INTENT_PATTERNS;
        let has_car = pats.car.is_match(&folded);

        if pats.smalltalk.is_match(&folded) {
            return if has_car {
                Intent::CarSearch
            } else {
                Intent::Smalltalk
            };
        }

        if pats.quantity.is_match(&folded) || has_car {
            return Intent::CarSearch;
        }

        Intent::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Intent {
        IntentClassifier::new().classify(text)
    }

    // ---- Smalltalk ----

    #[test]
    fn test_empty_is_smalltalk() {
        assert_eq!(classify(""), Intent::Smalltalk);
        assert_eq!(classify("   \n"), Intent::Smalltalk);
    }

    #[test]
    fn test_greetings_are_smalltalk() {
        for text in ["Bonjour", "salut !", "merci beaucoup", "Ça va ?", "hello there", "Au revoir"] {
            assert_eq!(classify(text), Intent::Smalltalk, "{text}");
        }
    }

    #[test]
    fn test_marker_must_be_whole_word() {
        // "chic" contains "hi", "cvt" contains "cv": neither is a greeting.
        assert_eq!(classify("chic"), Intent::Other);
        assert_eq!(classify("this cvt"), Intent::Other);
    }

    // ---- Car search ----

    #[test]
    fn test_car_signal_overrides_greeting() {
        assert_eq!(
            classify("bonjour, je veux une voiture diesel"),
            Intent::CarSearch
        );
        assert_eq!(classify("hi, looking for a car"), Intent::CarSearch);
    }

    #[test]
    fn test_quantity_with_unit_is_car_search() {
        assert_eq!(classify("80000 dh"), Intent::CarSearch);
        assert_eq!(classify("pas plus de 120000km"), Intent::CarSearch);
        assert_eq!(classify("autour de 95 mad"), Intent::CarSearch);
    }

    #[test]
    fn test_single_digit_quantity_is_not_enough() {
        assert_eq!(classify("il reste 5 minutes"), Intent::Other);
    }

    #[test]
    fn test_car_keywords() {
        for text in [
            "un véhicule familial",
            "boîte automatique",
            "SUV pas cher",
            "quelle marque fiable ?",
            "kilométrage faible",
            "electric please",
            "a cheap sedan",
        ] {
            assert_eq!(classify(text), Intent::CarSearch, "{text}");
        }
    }

    #[test]
    fn test_short_keywords_need_word_boundary() {
        // "madame" starts with "mad", "cardinal" with "car".
        assert_eq!(classify("madame"), Intent::Other);
        assert_eq!(classify("cardinal"), Intent::Other);
    }

    // ---- Other ----

    #[test]
    fn test_unrelated_is_other() {
        assert_eq!(classify("quelle heure est-il ?"), Intent::Other);
        assert_eq!(classify("raconte une blague"), Intent::Other);
    }

    #[test]
    fn test_intent_serialization() {
        assert_eq!(serde_json::to_string(&Intent::CarSearch).unwrap(), "\"car_search\"");
        assert_eq!(Intent::Smalltalk.to_string(), "smalltalk");
    }
}
