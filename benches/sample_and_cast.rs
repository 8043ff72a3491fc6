use std::sync::Arc;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use tabular_cast::book::{Book, Field, FileType, ProcessStatus, RawValue, Sheet};
use tabular_cast::cast::cast_column;
use tabular_cast::config::ProcessingConfig;
use tabular_cast::geo::{GeoArea, GeoCatalog};
use tabular_cast::processor::FieldProcessor;
use tabular_cast::sampler::TypeSampler;

fn generate_column(rows: usize) -> Vec<RawValue> {
    (0..rows)
        .map(|i| match i % 10 {
            0 => RawValue::empty(),
            1 => RawValue::from("n/a"),
            _ => RawValue::from(format!("{},{:03}.{:02}", 1 + i % 999, i % 1000, i % 100)),
        })
        .collect()
}

fn generate_catalog(areas: u64) -> GeoCatalog {
    GeoCatalog::from_areas((0..areas).map(|id| GeoArea {
        id,
        title: format!("District {id}"),
        code: format!("D-{id:04}"),
        admin_level: 2,
        admin_level_id: 2,
        region: 1,
        region_title: "Region".to_string(),
    }))
}

fn generate_book(columns: u64, rows: usize) -> Book {
    let fields = (0..columns)
        .map(|id| {
            let data = match id % 3 {
                0 => generate_column(rows),
                1 => (0..rows)
                    .map(|i| RawValue::from(format!("{:02}/{:02}/2020", 1 + i % 12, 1 + i % 28)))
                    .collect(),
                _ => (0..rows)
                    .map(|i| RawValue::from(format!("District {}", i % 500)))
                    .collect(),
            };
            Field::new(id + 1, format!("col_{id}"), id as usize, data)
        })
        .collect();
    Book {
        id: 1,
        title: "bench.csv".to_string(),
        file_type: FileType::Csv,
        status: ProcessStatus::Pending,
        error: None,
        sheets: vec![Sheet {
            id: 1,
            title: "bench".to_string(),
            data_row_index: 0,
            fields,
        }],
    }
}

fn bench_sample_and_cast(c: &mut Criterion) {
    let catalog = generate_catalog(2_000);
    let column = generate_column(100_000);
    let config = ProcessingConfig {
        seed: Some(7),
        ..ProcessingConfig::default()
    };
    let sampler = TypeSampler::new(&config).expect("sampler");
    let decision = sampler.detect(&column, &catalog, config.seed);

    let mut group = c.benchmark_group("column");
    group.bench_function("detect_100k", |b| {
        b.iter(|| sampler.detect(&column, &catalog, config.seed));
    });
    group.bench_function("cast_100k", |b| {
        b.iter(|| cast_column(&column, &decision, &catalog));
    });
    group.finish();

    let processor = FieldProcessor::new(Arc::new(catalog), config).expect("processor");
    let mut group = c.benchmark_group("book");
    group.sample_size(10);
    group.bench_function("process_book_12x20k", |b| {
        b.iter_batched(
            || generate_book(12, 20_000),
            |mut book| {
                processor.process_book(&mut book).expect("process book");
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_sample_and_cast);
criterion_main!(benches);
