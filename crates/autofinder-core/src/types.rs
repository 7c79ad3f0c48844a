//! Shared domain types: catalog records, search constraints, and conversation turns.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Vehicle catalog
// =============================================================================

/// Fuel type of a catalog vehicle.
///
/// Hybrids are folded into `Electric` both in the catalog and in extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fuel {
    Diesel,
    #[serde(alias = "essence", alias = "petrol")]
    Gasoline,
    #[serde(
        alias = "electrique",
        alias = "électrique",
        alias = "hybrid",
        alias = "hybride"
    )]
    Electric,
}

impl Fuel {
    /// Canonical identifier, as stored in index metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Fuel::Diesel => "diesel",
            Fuel::Gasoline => "gasoline",
            Fuel::Electric => "electric",
        }
    }

    /// Customer-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Fuel::Diesel => "diesel",
            Fuel::Gasoline => "essence",
            Fuel::Electric => "électrique",
        }
    }
}

impl fmt::Display for Fuel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Gearbox type of a catalog vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transmission {
    #[serde(alias = "manuelle")]
    Manual,
    #[serde(alias = "automatique")]
    Automatic,
}

impl Transmission {
    /// Canonical identifier, as stored in index metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transmission::Manual => "manual",
            Transmission::Automatic => "automatic",
        }
    }

    /// Customer-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Transmission::Manual => "manuelle",
            Transmission::Automatic => "automatique",
        }
    }
}

impl fmt::Display for Transmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One used vehicle from the catalog.
///
/// Records are created once when the catalog is loaded and never mutated.
/// Field aliases accept the French keys of the dataset export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    /// Unique, stable identifier.
    pub id: u64,
    #[serde(alias = "marque")]
    pub brand: String,
    #[serde(alias = "modele")]
    pub model: String,
    #[serde(alias = "annee")]
    pub year: u32,
    #[serde(alias = "kilometrage_km")]
    pub mileage_km: u64,
    #[serde(alias = "carburant")]
    pub fuel: Fuel,
    pub transmission: Transmission,
    /// Asking price in dirhams.
    #[serde(alias = "prix")]
    pub price: u64,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
}

impl VehicleRecord {
    /// Options rendered as comma-joined text.
    pub fn options_text(&self) -> String {
        self.options.join(", ")
    }

    /// Text embedded into the vector index for this vehicle.
    pub fn description(&self) -> String {
        format!(
            "{} {}, {}, {}, {} km, {} DHS",
            self.brand, self.model, self.fuel, self.transmission, self.mileage_km, self.price
        )
    }
}

/// Accept `options` either as a list or as a comma-joined string.
fn deserialize_options<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawOptions {
        List(Vec<String>),
        Text(String),
    }

    Ok(match RawOptions::deserialize(deserializer)? {
        RawOptions::List(list) => list,
        RawOptions::Text(text) => text
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}

// =============================================================================
// Constraints
// =============================================================================

/// Structured search criteria extracted from one utterance.
///
/// Every key is optional: `None` means unconstrained, never zero.
/// When both bounds of a range are present, `min <= max`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<Fuel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<Transmission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_max: Option<u32>,
}

impl ConstraintSet {
    /// True when no key is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Number of keys that are set.
    pub fn len(&self) -> usize {
        [
            self.brand.is_some(),
            self.fuel.is_some(),
            self.transmission.is_some(),
            self.price_min.is_some(),
            self.price_max.is_some(),
            self.mileage_max.is_some(),
            self.year_min.is_some(),
            self.year_max.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the caller-supplied history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vehicle() -> VehicleRecord {
        VehicleRecord {
            id: 7,
            brand: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2017,
            mileage_km: 85_000,
            fuel: Fuel::Diesel,
            transmission: Transmission::Automatic,
            price: 120_000,
            options: vec!["bluetooth".to_string(), "radar de recul".to_string()],
        }
    }

    // ---- VehicleRecord ----

    #[test]
    fn test_description_format() {
        let v = sample_vehicle();
        assert_eq!(
            v.description(),
            "Toyota Corolla, diesel, automatique, 85000 km, 120000 DHS"
        );
    }

    #[test]
    fn test_options_text_joins_with_comma() {
        let v = sample_vehicle();
        assert_eq!(v.options_text(), "bluetooth, radar de recul");
    }

    #[test]
    fn test_deserialize_french_keys() {
        let json = r#"{
            "id": 1,
            "marque": "Renault",
            "modele": "Clio",
            "annee": 2019,
            "kilometrage_km": 42000,
            "carburant": "essence",
            "transmission": "manuelle",
            "prix": 95000,
            "options": ["climatisation"]
        }"#;
        let v: VehicleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(v.brand, "Renault");
        assert_eq!(v.fuel, Fuel::Gasoline);
        assert_eq!(v.transmission, Transmission::Manual);
        assert_eq!(v.price, 95_000);
        assert_eq!(v.options, vec!["climatisation"]);
    }

    #[test]
    fn test_deserialize_options_from_text() {
        let json = r#"{
            "id": 2, "brand": "Kia", "model": "Picanto", "year": 2021,
            "mileage_km": 10000, "fuel": "electrique", "transmission": "automatique",
            "price": 150000, "options": "carplay, caméra 360"
        }"#;
        let v: VehicleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(v.fuel, Fuel::Electric);
        assert_eq!(v.options, vec!["carplay", "caméra 360"]);
    }

    #[test]
    fn test_deserialize_missing_options_defaults_empty() {
        let json = r#"{
            "id": 3, "brand": "Fiat", "model": "Punto", "year": 2012,
            "mileage_km": 150000, "fuel": "diesel", "transmission": "manual", "price": 40000
        }"#;
        let v: VehicleRecord = serde_json::from_str(json).unwrap();
        assert!(v.options.is_empty());
    }

    #[test]
    fn test_deserialize_rejects_unknown_fuel() {
        let json = r#"{
            "id": 4, "brand": "Maruti", "model": "Alto", "year": 2014,
            "mileage_km": 60000, "fuel": "cng", "transmission": "manual", "price": 30000
        }"#;
        assert!(serde_json::from_str::<VehicleRecord>(json).is_err());
    }

    #[test]
    fn test_deserialize_rejects_negative_price() {
        let json = r#"{
            "id": 5, "brand": "Ford", "model": "Fiesta", "year": 2014,
            "mileage_km": 60000, "fuel": "diesel", "transmission": "manual", "price": -1
        }"#;
        assert!(serde_json::from_str::<VehicleRecord>(json).is_err());
    }

    #[test]
    fn test_fuel_hybrid_alias_is_electric() {
        let fuel: Fuel = serde_json::from_str("\"hybride\"").unwrap();
        assert_eq!(fuel, Fuel::Electric);
        assert_eq!(serde_json::to_string(&fuel).unwrap(), "\"electric\"");
    }

    // ---- ConstraintSet ----

    #[test]
    fn test_constraint_set_default_is_empty() {
        let c = ConstraintSet::default();
        assert!(c.is_empty());
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn test_constraint_set_len_counts_present_keys() {
        let c = ConstraintSet {
            fuel: Some(Fuel::Diesel),
            price_max: Some(80_000),
            year_min: Some(2018),
            ..Default::default()
        };
        assert!(!c.is_empty());
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_constraint_set_serializes_only_present_keys() {
        let c = ConstraintSet {
            price_max: Some(80_000),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&c).unwrap(), r#"{"price_max":80000}"#);
    }

    // ---- Turn ----

    #[test]
    fn test_turn_deserialize_roles() {
        let turns: Vec<Turn> = serde_json::from_str(
            r#"[{"role": "user", "content": "salut"}, {"role": "assistant", "content": "bonjour"}]"#,
        )
        .unwrap();
        assert!(turns[0].is_user());
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn test_turn_missing_content_defaults_empty() {
        let turn: Turn = serde_json::from_str(r#"{"role": "user"}"#).unwrap();
        assert_eq!(turn, Turn::user(""));
    }
}
