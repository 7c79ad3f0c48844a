//! Text folding shared by the keyword-driven components.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase, strip diacritics, and unify apostrophes so that keyword tables
/// can be written in plain ASCII.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '`' => '\'',
            '\u{00a0}' | '\u{202f}' => ' ',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents_and_case() {
        assert_eq!(fold("Véhicule Électrique"), "vehicule electrique");
        assert_eq!(fold("boîte automatique"), "boite automatique");
        assert_eq!(fold("À partir de 2018"), "a partir de 2018");
    }

    #[test]
    fn test_fold_unifies_apostrophes_and_spaces() {
        assert_eq!(fold("jusqu\u{2019}à"), "jusqu'a");
        assert_eq!(fold("80\u{202f}000 dh"), "80 000 dh");
    }

    #[test]
    fn test_fold_leaves_ascii_untouched() {
        assert_eq!(fold("toyota 4x4 < 2019"), "toyota 4x4 < 2019");
    }
}
