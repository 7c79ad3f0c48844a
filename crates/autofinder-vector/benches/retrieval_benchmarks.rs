//! Benchmarks for constraint-restricted retrieval over the vector index.
//!
//! Uses a synthetic catalog of 5,000 vehicles embedded with `HashEmbedding`.
//! Set `BENCH_FULL_SCALE=1` to run against 50,000 vehicles:
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p autofinder-vector
//! ```

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use autofinder_core::types::{ConstraintSet, Fuel, Transmission, VehicleRecord};
use autofinder_vector::embedding::{EmbeddingService, HashEmbedding};
use autofinder_vector::filter::{vehicle_metadata, CatalogFilter};
use autofinder_vector::index::VectorIndex;

const CI_VEHICLE_COUNT: usize = 5_000;
const FULL_SCALE_VEHICLE_COUNT: usize = 50_000;

const BRANDS: [(&str, &str); 6] = [
    ("Toyota", "Corolla"),
    ("Renault", "Clio"),
    ("Dacia", "Logan"),
    ("Peugeot", "208"),
    ("Hyundai", "Tucson"),
    ("Volkswagen", "Golf"),
];

fn vehicle_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_VEHICLE_COUNT
    } else {
        CI_VEHICLE_COUNT
    }
}

fn synthetic_vehicle(i: usize) -> VehicleRecord {
    let (brand, model) = BRANDS[i % BRANDS.len()];
    VehicleRecord {
        id: i as u64,
        brand: brand.to_string(),
        model: model.to_string(),
        year: 2008 + (i % 16) as u32,
        mileage_km: ((i * 7_919) % 250_000) as u64,
        fuel: match i % 3 {
            0 => Fuel::Diesel,
            1 => Fuel::Gasoline,
            _ => Fuel::Electric,
        },
        transmission: if i % 2 == 0 {
            Transmission::Manual
        } else {
            Transmission::Automatic
        },
        price: 40_000 + ((i * 1_237) % 300_000) as u64,
        options: vec!["climatisation".to_string()],
    }
}

fn build_populated_index(count: usize) -> (VectorIndex, HashEmbedding) {
    let index = VectorIndex::new();
    let embedder = HashEmbedding::new();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    for i in 0..count {
        let vehicle = synthetic_vehicle(i);
        let text = vehicle.description();
        let embedding = rt.block_on(embedder.embed(&text)).expect("embed failed");
        index
            .upsert(vehicle.id, embedding, text, vehicle_metadata(&vehicle))
            .expect("upsert failed");
    }

    assert_eq!(index.len(), count);
    (index, embedder)
}

fn bench_retrieval(c: &mut Criterion) {
    let count = vehicle_count();
    let (index, embedder) = build_populated_index(count);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    let query_vec = rt
        .block_on(embedder.embed("toyota diesel automatique pas cher"))
        .expect("query embed failed");

    let filtered = CatalogFilter::from_constraints(&ConstraintSet {
        fuel: Some(Fuel::Diesel),
        transmission: Some(Transmission::Automatic),
        price_max: Some(150_000),
        year_min: Some(2015),
        ..Default::default()
    });

    let mut group = c.benchmark_group("catalog_retrieval");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function(format!("unfiltered_top5_{}vehicles", count), |b| {
        b.iter(|| {
            let hits = index
                .query(&query_vec, 5, &CatalogFilter::none())
                .expect("query failed");
            assert_eq!(hits.len(), 5);
            hits
        });
    });

    group.bench_function(format!("filtered_top5_{}vehicles", count), |b| {
        b.iter(|| index.query(&query_vec, 5, &filtered).expect("query failed"));
    });

    group.bench_function("embed_query", |b| {
        b.iter(|| {
            rt.block_on(embedder.embed("hyundai tucson essence moins de 200000 dh"))
                .expect("embed failed")
        });
    });

    group.finish();
}

criterion_group!(benches, bench_retrieval);
criterion_main!(benches);
