//! Constraint extraction from free text.
//!
//! Extraction is an ordered table of rules, each a pure function over the
//! folded utterance that may set keys of the [`ConstraintSet`] being built.
//! Later rules can read what earlier rules produced (the price ceiling never
//! overwrites a range, the currency band only fires on a blank price), so the
//! table order is part of the contract. Malformed numbers simply leave their
//! key unset: extraction never fails.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use autofinder_core::types::{ConstraintSet, Fuel, Transmission};

use crate::text::fold;

/// Half-width of the price band built around a bare currency amount.
pub const PRICE_BAND: u64 = 10_000;
/// Smallest bare currency amount turned into a price band.
pub const PRICE_BAND_MIN_AMOUNT: u64 = 10_000;
/// `year_min` implied by "recent" when no floor was stated.
pub const RECENT_YEAR_MIN: u32 = 2020;

// =============================================================================
// Keyword tables (folded: lowercase, no diacritics)
// =============================================================================

/// Fuel keywords in priority order; the first one present wins.
static FUEL_KEYWORDS: &[(&str, Fuel)] = &[
    ("diesel", Fuel::Diesel),
    ("gasoil", Fuel::Diesel),
    ("gazole", Fuel::Diesel),
    ("essence", Fuel::Gasoline),
    ("gasoline", Fuel::Gasoline),
    ("petrol", Fuel::Gasoline),
    ("hybride", Fuel::Electric),
    ("hybrid", Fuel::Electric),
    ("electrique", Fuel::Electric),
    ("electric", Fuel::Electric),
];

/// Brand spellings mapped to the catalog's canonical brand.
static BRAND_TABLE: &[(&str, &str)] = &[
    ("audi", "Audi"),
    ("bmw", "BMW"),
    ("chevrolet", "Chevrolet"),
    ("citroen", "Citroen"),
    ("dacia", "Dacia"),
    ("datsun", "Datsun"),
    ("fiat", "Fiat"),
    ("force", "Force"),
    ("ford", "Ford"),
    ("hindustan", "Hindustan"),
    ("honda", "Honda"),
    ("hyundai", "Hyundai"),
    ("isuzu", "Isuzu"),
    ("jaguar", "Jaguar"),
    ("jeep", "Jeep"),
    ("kia", "Kia"),
    ("land", "Land"),
    ("land rover", "Land"),
    ("mahindra", "Mahindra"),
    ("maruti", "Maruti"),
    ("mercedes", "Mercedes"),
    ("mercedes-benz", "Mercedes-Benz"),
    ("mercedes benz", "Mercedes-Benz"),
    ("mini", "Mini"),
    ("mitsubishi", "Mitsubishi"),
    ("nissan", "Nissan"),
    ("opel", "Opel"),
    ("peugeot", "Peugeot"),
    ("renault", "Renault"),
    ("skoda", "Skoda"),
    ("ssangyong", "Ssangyong"),
    ("tata", "Tata"),
    ("toyota", "Toyota"),
    ("volkswagen", "Volkswagen"),
    ("vw", "Volkswagen"),
    ("volvo", "Volvo"),
];

// =============================================================================
// Compiled patterns
// =============================================================================

/// Integer with optional space or underscore digit grouping ("80 000").
const NUM: &str = r"(\d{1,3}(?:[ _]\d{3})+|\d+)";
/// Like [`NUM`] but at least three digits, so ages and counts never read as prices.
const AMOUNT: &str = r"(\d{1,3}(?:[ _]\d{3})+|\d{3,})";
/// Four-digit model year.
const YEAR: &str = r"(19\d{2}|20\d{2})";
const CURRENCY: &str = r"(?:dhs?|mad|dirhams?)\b";
const DISTANCE: &str = r"(?:kms?\b|kilom)";
const CEILING: &str = r"(?:<=|<|\b(?:moins de|inferieur a|pas plus de|maximum|max|under|less than|below))";

struct ExtractorPatterns {
    model_year: Regex,
    fuels: Vec<(Regex, Fuel)>,
    automatic: Regex,
    manual: Regex,
    price_range: Regex,
    price_ceiling: Regex,
    currency_amount: Regex,
    mileage_ceiling: Regex,
    mileage_bare: Regex,
    year_range: Regex,
    year_floor: Regex,
    year_ceiling: Regex,
    recent: Regex,
    brand: Regex,
    brand_lookup: HashMap<&'static str, &'static str>,
}

static PATTERNS: LazyLock<ExtractorPatterns> = LazyLock::new(|| {
    let mk = |p: &str| Regex::new(p).expect("Invalid extraction regex");

    // Longest spelling first so "land rover" is preferred over "land".
    let mut brands: Vec<&str> = BRAND_TABLE.iter().map(|(k, _)| *k).collect();
    brands.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let brand_alts = brands
        .iter()
        .map(|b| regex::escape(b))
        .collect::<Vec<_>>()
        .join("|");

    ExtractorPatterns {
        model_year: mk(&format!(
            r"\bmod(?:ele|el)s?\s*{YEAR}\b(?:\s*(?:et|a|-|–|and|to|through)\s*{YEAR}\b)?"
        )),
        fuels: FUEL_KEYWORDS
            .iter()
            .map(|(kw, fuel)| (mk(&format!(r"\b{kw}")), *fuel))
            .collect(),
        automatic: mk(r"\b(?:automatique|automatic|boite auto|bva\b)"),
        manual: mk(r"\b(?:manuelle|manuel\b|manual|boite manuelle|bvm\b)"),
        price_range: mk(&format!(
            r"\b(?:entre|between)\s*{NUM}\s*(?:et|and|-)\s*{NUM}\s*{CURRENCY}"
        )),
        price_ceiling: mk(&format!(
            r"{CEILING}\s*(?:(?:de|of)\s+)?{AMOUNT}(\s*(?:{DISTANCE}|{CURRENCY}))?|\bbudget(?:\s+(?:de|max|of))?\s*{AMOUNT}(\s*(?:{DISTANCE}|{CURRENCY}))?"
        )),
        currency_amount: mk(&format!(r"\b{NUM}\s*{CURRENCY}")),
        mileage_ceiling: mk(&format!(r"{CEILING}\s*(?:(?:de|of)\s+)?{NUM}\s*{DISTANCE}")),
        mileage_bare: mk(&format!(r"\b{NUM}\s*{DISTANCE}")),
        year_range: mk(&format!(
            r"\b(?:entre|between)\s*{YEAR}\s*(?:et|and|-)\s*{YEAR}\b"
        )),
        year_floor: mk(&format!(
            r"(?:>=|\b(?:a partir de|apres|depuis|from|after|since))\s*{YEAR}\b"
        )),
        year_ceiling: mk(&format!(
            r"(?:<=|\b(?:avant|before|jusqu'a|jusqu'en|up to|until))\s*{YEAR}\b"
        )),
        recent: mk(r"\b(?:recent|latest|newest)"),
        brand: mk(&format!(r"\b(?:{brand_alts})\b")),
        brand_lookup: BRAND_TABLE.iter().copied().collect(),
    }
});

/// Parse a grouped integer; `None` on anything that does not fit a `u64`.
fn parse_num(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn parse_year(raw: &str) -> Option<u32> {
    raw.parse().ok()
}

fn num_at(caps: &Captures<'_>, group: usize) -> Option<u64> {
    caps.get(group).and_then(|m| parse_num(m.as_str()))
}

fn year_at(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group).and_then(|m| parse_year(m.as_str()))
}

// =============================================================================
// Rules
// =============================================================================

/// One named step of extraction.
pub struct ExtractionRule {
    pub name: &'static str,
    pub apply: fn(&str, &mut ConstraintSet),
}

/// Extraction rules in evaluation order.
pub static EXTRACTION_RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "model_year", apply: model_year },
    ExtractionRule { name: "fuel", apply: fuel },
    ExtractionRule { name: "transmission", apply: transmission },
    ExtractionRule { name: "price_range", apply: price_range },
    ExtractionRule { name: "price_ceiling", apply: price_ceiling },
    ExtractionRule { name: "price_band", apply: price_band },
    ExtractionRule { name: "mileage", apply: mileage },
    ExtractionRule { name: "year_range", apply: year_range },
    ExtractionRule { name: "year_floor", apply: year_floor },
    ExtractionRule { name: "year_ceiling", apply: year_ceiling },
    ExtractionRule { name: "recent", apply: recent },
    ExtractionRule { name: "brand", apply: brand },
    ExtractionRule { name: "normalize_bounds", apply: normalize_bounds },
];

/// "modele 2018" pins one year; "modele 2016 et 2019" sets both bounds.
fn model_year(text: &str, c: &mut ConstraintSet) {
    let Some(caps) = PATTERNS.model_year.captures(text) else {
        return;
    };
    let Some(first) = year_at(&caps, 1) else {
        return;
    };
    let second = year_at(&caps, 2).unwrap_or(first);
    c.year_min = Some(first.min(second));
    c.year_max = Some(first.max(second));
}

fn fuel(text: &str, c: &mut ConstraintSet) {
    if let Some((_, fuel)) = PATTERNS.fuels.iter().find(|(re, _)| re.is_match(text)) {
        c.fuel = Some(*fuel);
    }
}

/// Automatic is checked first.
fn transmission(text: &str, c: &mut ConstraintSet) {
    if PATTERNS.automatic.is_match(text) {
        c.transmission = Some(Transmission::Automatic);
    } else if PATTERNS.manual.is_match(text) {
        c.transmission = Some(Transmission::Manual);
    }
}

/// "entre A et B dh": bounds are sorted, so the order of A and B is irrelevant.
fn price_range(text: &str, c: &mut ConstraintSet) {
    let Some(caps) = PATTERNS.price_range.captures(text) else {
        return;
    };
    if let (Some(a), Some(b)) = (num_at(&caps, 1), num_at(&caps, 2)) {
        c.price_min = Some(a.min(b));
        c.price_max = Some(a.max(b));
    }
}

/// "moins de N", "max N", "budget N". Skipped when N is a distance or a bare
/// model year, and never overwrites a ceiling set by the range rule.
fn price_ceiling(text: &str, c: &mut ConstraintSet) {
    if c.price_max.is_some() {
        return;
    }
    for caps in PATTERNS.price_ceiling.captures_iter(text) {
        let (value, unit) = match (caps.get(1), caps.get(3)) {
            (Some(v), _) => (v.as_str(), caps.get(2)),
            (None, Some(v)) => (v.as_str(), caps.get(4)),
            (None, None) => continue,
        };
        let unit = unit.map(|u| u.as_str().trim()).unwrap_or("");
        if unit.starts_with('k') {
            continue;
        }
        let Some(amount) = parse_num(value) else {
            continue;
        };
        if unit.is_empty() && (1900..=2099).contains(&amount) {
            continue;
        }
        c.price_max = Some(amount);
        return;
    }
}

/// A bare "N dh" is an approximate target: N ± 10 000, when no price bound
/// exists yet and N is large enough to be a car price.
fn price_band(text: &str, c: &mut ConstraintSet) {
    if c.price_min.is_some() || c.price_max.is_some() {
        return;
    }
    let Some(amount) = PATTERNS
        .currency_amount
        .captures(text)
        .and_then(|caps| num_at(&caps, 1))
    else {
        return;
    };
    if amount >= PRICE_BAND_MIN_AMOUNT {
        c.price_min = Some(amount.saturating_sub(PRICE_BAND));
        c.price_max = Some(amount.saturating_add(PRICE_BAND));
    }
}

/// "moins de N km" caps mileage; failing that, any "N km" does too.
fn mileage(text: &str, c: &mut ConstraintSet) {
    let value = match PATTERNS.mileage_ceiling.captures(text) {
        Some(caps) => num_at(&caps, 1),
        None => PATTERNS
            .mileage_bare
            .captures(text)
            .and_then(|caps| num_at(&caps, 1)),
    };
    if let Some(km) = value {
        c.mileage_max = Some(km);
    }
}

fn year_range(text: &str, c: &mut ConstraintSet) {
    let Some(caps) = PATTERNS.year_range.captures(text) else {
        return;
    };
    if let (Some(a), Some(b)) = (year_at(&caps, 1), year_at(&caps, 2)) {
        c.year_min = Some(a.min(b));
        c.year_max = Some(a.max(b));
    }
}

fn year_floor(text: &str, c: &mut ConstraintSet) {
    if let Some(year) = PATTERNS
        .year_floor
        .captures(text)
        .and_then(|caps| year_at(&caps, 1))
    {
        c.year_min = Some(year);
    }
}

fn year_ceiling(text: &str, c: &mut ConstraintSet) {
    if let Some(year) = PATTERNS
        .year_ceiling
        .captures(text)
        .and_then(|caps| year_at(&caps, 1))
    {
        c.year_max = Some(year);
    }
}

fn recent(text: &str, c: &mut ConstraintSet) {
    if c.year_min.is_none() && PATTERNS.recent.is_match(text) {
        c.year_min = Some(RECENT_YEAR_MIN);
    }
}

fn brand(text: &str, c: &mut ConstraintSet) {
    if let Some(m) = PATTERNS.brand.find(text) {
        if let Some(canonical) = PATTERNS.brand_lookup.get(m.as_str()) {
            c.brand = Some((*canonical).to_string());
        }
    }
}

/// Guarantee `min <= max` for every pair of bounds.
fn normalize_bounds(_text: &str, c: &mut ConstraintSet) {
    if let (Some(min), Some(max)) = (c.price_min, c.price_max) {
        if min > max {
            c.price_min = Some(max);
            c.price_max = Some(min);
        }
    }
    if let (Some(min), Some(max)) = (c.year_min, c.year_max) {
        if min > max {
            c.year_min = Some(max);
            c.year_max = Some(min);
        }
    }
}

// =============================================================================
// ConstraintExtractor
// =============================================================================

/// Turns one utterance into a partial [`ConstraintSet`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintExtractor;

impl ConstraintExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Run every rule of [`EXTRACTION_RULES`] over the folded text.
    pub fn extract(&self, text: &str) -> ConstraintSet {
        let folded = fold(text);
        let mut constraints = ConstraintSet::default();
        for rule in EXTRACTION_RULES {
            (rule.apply)(&folded, &mut constraints);
        }
        debug!(?constraints, "Constraints extracted");
        constraints
    }
}
