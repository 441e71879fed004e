//! Benchmarks for the rules backend and upload ingestion
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use freemobilachat::classify::RuleClassifier;
use freemobilachat::ingest::{clean_records, CsvReader, TextCleaner};
use tempfile::tempdir;

const MESSAGES: &[&str] = &[
    "@free Panne de connexion fibre depuis 3 jours, c'est urgent !!! https://t.co/x",
    "Merci Free, la 5G fonctionne parfaitement à Lyon",
    "Ma facture est trop élevée ce mois-ci, je veux un remboursement",
    "Le réseau mobile est lent le soir #free",
    "Comment activer l'option Netflix sur la Freebox ?",
    "Impossible de joindre le service client, personne ne répond",
];

fn create_texts(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{} ({})", MESSAGES[i % MESSAGES.len()], i))
        .collect()
}

fn create_csv(count: usize) -> String {
    let mut csv = String::from("id,date,text\n");
    for (i, text) in create_texts(count).iter().enumerate() {
        csv.push_str(&format!("{},2024-05-0{},\"{}\"\n", i, i % 9 + 1, text));
    }
    csv
}

fn bench_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("rules");
    let classifier = RuleClassifier::new();

    for size in [100, 1000, 10000] {
        let texts = create_texts(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("classify_{}", size), |b| {
            b.iter(|| classifier.classify_all(black_box(&texts)))
        });
    }

    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    let cleaner = TextCleaner::new();

    for size in [1000, 10000] {
        let csv = create_csv(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("read_and_clean_{}", size), |b| {
            b.iter(|| {
                let read = CsvReader::new().read_str(black_box(&csv)).unwrap();
                clean_records(&cleaner, read.records)
            })
        });
    }

    group.bench_function("read_path_1000", |b| {
        let dir = tempdir().unwrap();
        let path = dir.path().join("messages.csv");
        std::fs::write(&path, create_csv(1000)).unwrap();

        b.iter(|| CsvReader::new().read_path(black_box(&path)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_rules, bench_ingest);
criterion_main!(benches);
