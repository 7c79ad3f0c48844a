//! Constraint-derived catalog filter.
//!
//! A [`CatalogFilter`] is the conjunction of one [`Condition`] per present
//! constraint key. It is evaluated in two places with identical semantics:
//! against index metadata during the query (pushdown) and against typed
//! [`VehicleRecord`]s afterwards (validation).

use std::fmt;

use serde_json::{Map, Value};

use autofinder_core::types::{ConstraintSet, Fuel, Transmission, VehicleRecord};

/// One equality or inclusive-bound condition on a catalog attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Brand(String),
    Fuel(Fuel),
    Transmission(Transmission),
    PriceMin(u64),
    PriceMax(u64),
    MileageMax(u64),
    YearMin(u32),
    YearMax(u32),
}

impl Condition {
    /// Evaluate against a typed record.
    pub fn matches(&self, vehicle: &VehicleRecord) -> bool {
        match self {
            Condition::Brand(brand) => vehicle.brand.eq_ignore_ascii_case(brand),
            Condition::Fuel(fuel) => vehicle.fuel == *fuel,
            Condition::Transmission(t) => vehicle.transmission == *t,
            Condition::PriceMin(min) => vehicle.price >= *min,
            Condition::PriceMax(max) => vehicle.price <= *max,
            Condition::MileageMax(max) => vehicle.mileage_km <= *max,
            Condition::YearMin(min) => vehicle.year >= *min,
            Condition::YearMax(max) => vehicle.year <= *max,
        }
    }

    /// Evaluate against flat index metadata.
    ///
    /// A missing attribute or a value of the wrong type never satisfies the
    /// condition.
    pub fn matches_metadata(&self, metadata: &Map<String, Value>) -> bool {
        let text = |key: &str| metadata.get(key).and_then(Value::as_str);
        let number = |key: &str| metadata.get(key).and_then(Value::as_u64);

        match self {
            Condition::Brand(brand) => text("brand").is_some_and(|b| b.eq_ignore_ascii_case(brand)),
            Condition::Fuel(fuel) => text("fuel") == Some(fuel.as_str()),
            Condition::Transmission(t) => text("transmission") == Some(t.as_str()),
            Condition::PriceMin(min) => number("price").is_some_and(|p| p >= *min),
            Condition::PriceMax(max) => number("price").is_some_and(|p| p <= *max),
            Condition::MileageMax(max) => number("mileage_km").is_some_and(|m| m <= *max),
            Condition::YearMin(min) => number("year").is_some_and(|y| y >= u64::from(*min)),
            Condition::YearMax(max) => number("year").is_some_and(|y| y <= u64::from(*max)),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Brand(b) => write!(f, "brand == {b}"),
            Condition::Fuel(v) => write!(f, "fuel == {}", v.as_str()),
            Condition::Transmission(v) => write!(f, "transmission == {}", v.as_str()),
            Condition::PriceMin(v) => write!(f, "price >= {v}"),
            Condition::PriceMax(v) => write!(f, "price <= {v}"),
            Condition::MileageMax(v) => write!(f, "mileage_km <= {v}"),
            Condition::YearMin(v) => write!(f, "year >= {v}"),
            Condition::YearMax(v) => write!(f, "year <= {v}"),
        }
    }
}

/// Conjunction of conditions. An empty filter admits every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    conditions: Vec<Condition>,
}

impl CatalogFilter {
    /// Filter that admits everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build the filter for a constraint set, one condition per present key.
    pub fn from_constraints(constraints: &ConstraintSet) -> Self {
        let mut conditions = Vec::with_capacity(constraints.len());
        if let Some(brand) = &constraints.brand {
            conditions.push(Condition::Brand(brand.clone()));
        }
        if let Some(fuel) = constraints.fuel {
            conditions.push(Condition::Fuel(fuel));
        }
        if let Some(t) = constraints.transmission {
            conditions.push(Condition::Transmission(t));
        }
        if let Some(v) = constraints.price_min {
            conditions.push(Condition::PriceMin(v));
        }
        if let Some(v) = constraints.price_max {
            conditions.push(Condition::PriceMax(v));
        }
        if let Some(v) = constraints.mileage_max {
            conditions.push(Condition::MileageMax(v));
        }
        if let Some(v) = constraints.year_min {
            conditions.push(Condition::YearMin(v));
        }
        if let Some(v) = constraints.year_max {
            conditions.push(Condition::YearMax(v));
        }
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, vehicle: &VehicleRecord) -> bool {
        self.conditions.iter().all(|c| c.matches(vehicle))
    }

    pub fn matches_metadata(&self, metadata: &Map<String, Value>) -> bool {
        self.conditions.iter().all(|c| c.matches_metadata(metadata))
    }
}

impl fmt::Display for CatalogFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return f.write_str("none");
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{condition}")?;
        }
        Ok(())
    }
}

/// Flatten a record into index metadata, with `options` comma-joined.
pub fn vehicle_metadata(vehicle: &VehicleRecord) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("id".into(), Value::from(vehicle.id));
    map.insert("brand".into(), Value::from(vehicle.brand.clone()));
    map.insert("model".into(), Value::from(vehicle.model.clone()));
    map.insert("year".into(), Value::from(vehicle.year));
    map.insert("mileage_km".into(), Value::from(vehicle.mileage_km));
    map.insert("fuel".into(), Value::from(vehicle.fuel.as_str()));
    map.insert("transmission".into(), Value::from(vehicle.transmission.as_str()));
    map.insert("price".into(), Value::from(vehicle.price));
    map.insert("options".into(), Value::from(vehicle.options_text()));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vehicle(brand: &str, fuel: Fuel, price: u64, mileage_km: u64, year: u32) -> VehicleRecord {
        VehicleRecord {
            id: 1,
            brand: brand.to_string(),
            model: "X".to_string(),
            year,
            mileage_km,
            fuel,
            transmission: Transmission::Manual,
            price,
            options: vec![],
        }
    }

    // ---- Construction ----

    #[test]
    fn test_empty_constraints_build_empty_filter() {
        let filter = CatalogFilter::from_constraints(&ConstraintSet::default());
        assert!(filter.is_empty());
        assert_eq!(filter.to_string(), "none");
        assert!(filter.matches(&vehicle("Fiat", Fuel::Diesel, 1, 1, 2000)));
    }

    #[test]
    fn test_one_condition_per_key() {
        let constraints = ConstraintSet {
            brand: Some("Toyota".into()),
            fuel: Some(Fuel::Diesel),
            price_min: Some(50_000),
            price_max: Some(90_000),
            year_max: Some(2018),
            ..Default::default()
        };
        let filter = CatalogFilter::from_constraints(&constraints);
        assert_eq!(filter.conditions().len(), 5);
        assert_eq!(
            filter.to_string(),
            "brand == Toyota AND fuel == diesel AND price >= 50000 AND price <= 90000 AND year <= 2018"
        );
    }

    // ---- Typed evaluation ----

    #[test]
    fn test_bounds_are_inclusive() {
        let filter = CatalogFilter::from_constraints(&ConstraintSet {
            price_min: Some(50_000),
            price_max: Some(90_000),
            mileage_max: Some(100_000),
            year_min: Some(2015),
            year_max: Some(2018),
            ..Default::default()
        });
        assert!(filter.matches(&vehicle("Kia", Fuel::Diesel, 50_000, 100_000, 2015)));
        assert!(filter.matches(&vehicle("Kia", Fuel::Diesel, 90_000, 0, 2018)));
        assert!(!filter.matches(&vehicle("Kia", Fuel::Diesel, 90_001, 0, 2016)));
        assert!(!filter.matches(&vehicle("Kia", Fuel::Diesel, 60_000, 100_001, 2016)));
        assert!(!filter.matches(&vehicle("Kia", Fuel::Diesel, 60_000, 0, 2019)));
    }

    #[test]
    fn test_brand_is_case_insensitive() {
        let filter = CatalogFilter::from_constraints(&ConstraintSet {
            brand: Some("Mercedes-Benz".into()),
            ..Default::default()
        });
        assert!(filter.matches(&vehicle("mercedes-benz", Fuel::Diesel, 1, 1, 2020)));
        assert!(!filter.matches(&vehicle("Mercedes", Fuel::Diesel, 1, 1, 2020)));
    }

    #[test]
    fn test_conditions_are_conjunctive() {
        let filter = CatalogFilter::from_constraints(&ConstraintSet {
            fuel: Some(Fuel::Electric),
            price_max: Some(100_000),
            ..Default::default()
        });
        assert!(filter.matches(&vehicle("Kia", Fuel::Electric, 99_000, 1, 2021)));
        assert!(!filter.matches(&vehicle("Kia", Fuel::Diesel, 99_000, 1, 2021)));
        assert!(!filter.matches(&vehicle("Kia", Fuel::Electric, 150_000, 1, 2021)));
    }

    #[test]
    fn test_transmission_on_typed_record() {
        let filter = CatalogFilter::from_constraints(&ConstraintSet {
            transmission: Some(Transmission::Automatic),
            ..Default::default()
        });
        let manual = vehicle("Kia", Fuel::Diesel, 1, 1, 2020);
        let automatic = VehicleRecord {
            transmission: Transmission::Automatic,
            ..manual.clone()
        };
        assert!(filter.matches(&automatic));
        assert!(!filter.matches(&manual));
        assert!(Condition::Transmission(Transmission::Manual).matches(&manual));
    }

    // ---- Metadata evaluation ----

    #[test]
    fn test_metadata_agrees_with_typed_evaluation() {
        let v = vehicle("Toyota", Fuel::Gasoline, 80_000, 50_000, 2019);
        let meta = vehicle_metadata(&v);
        let filters = [
            ConstraintSet {
                fuel: Some(Fuel::Gasoline),
                ..Default::default()
            },
            ConstraintSet {
                brand: Some("toyota".into()),
                year_min: Some(2020),
                ..Default::default()
            },
            ConstraintSet {
                price_max: Some(80_000),
                mileage_max: Some(50_000),
                ..Default::default()
            },
        ];
        for constraints in filters {
            let filter = CatalogFilter::from_constraints(&constraints);
            assert_eq!(filter.matches(&v), filter.matches_metadata(&meta), "{filter}");
        }
    }

    #[test]
    fn test_metadata_type_mismatch_excludes() {
        let meta = json!({"price": "80000", "year": 2019.5, "fuel": 3});
        let meta = meta.as_object().unwrap();
        for condition in [
            Condition::PriceMax(100_000),
            Condition::YearMin(2000),
            Condition::Fuel(Fuel::Diesel),
        ] {
            assert!(!condition.matches_metadata(meta), "{condition}");
        }
    }

    #[test]
    fn test_metadata_missing_field_excludes() {
        let meta = Map::new();
        assert!(!Condition::MileageMax(100_000).matches_metadata(&meta));
        assert!(CatalogFilter::none().matches_metadata(&meta));
    }

    #[test]
    fn test_vehicle_metadata_is_flat() {
        let mut v = vehicle("Dacia", Fuel::Diesel, 70_000, 90_000, 2017);
        v.options = vec!["gps".into(), "clim".into()];
        let meta = vehicle_metadata(&v);
        assert_eq!(meta["fuel"], "diesel");
        assert_eq!(meta["transmission"], "manual");
        assert_eq!(meta["options"], "gps, clim");
        assert!(meta.values().all(|v| !v.is_object() && !v.is_array()));
    }
}
