use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use quickshare::{JsonShareStore, KeyType, ShareStore, SqliteShareStore};
use tempfile::tempdir;

fn sample_files(count: usize) -> Vec<String> {
    (0..count)
        .map(|idx| format!("/storage/sdcard0/DCIM/Camera/IMG_{:05}.jpg", idx))
        .collect()
}

fn seed(store: &dyn ShareStore, shares: usize) -> Vec<String> {
    (0..shares)
        .map(|idx| {
            store
                .add_share(&format!("share {}", idx), &sample_files(8))
                .expect("seed share")
        })
        .collect()
}

fn bench_add_share(c: &mut Criterion) {
    let files = sample_files(8);

    c.bench_function("document_add_share_500_seeded", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().expect("tempdir");
                let store = JsonShareStore::open_in(dir.path()).expect("open store");
                seed(&store, 500);
                (dir, store)
            },
            |(_dir, store)| {
                let token = store.add_share("bench", &files).expect("add share");
                black_box(token);
            },
            BatchSize::PerIteration,
        )
    });

    c.bench_function("relational_add_share_500_seeded", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().expect("tempdir");
                let store = SqliteShareStore::open_in(dir.path()).expect("open store");
                seed(&store, 500);
                (dir, store)
            },
            |(_dir, store)| {
                let token = store.add_share("bench", &files).expect("add share");
                black_box(token);
            },
            BatchSize::PerIteration,
        )
    });
}

fn bench_lookup(c: &mut Criterion) {
    let dir = tempdir().expect("tempdir");
    let document = JsonShareStore::open_in(&dir.path().join("document")).expect("open store");
    let relational =
        SqliteShareStore::open_in(&dir.path().join("relational")).expect("open store");
    let document_tokens = seed(&document, 1_000);
    let relational_tokens = seed(&relational, 1_000);

    c.bench_function("document_get_files_by_token_1k", |b| {
        b.iter(|| {
            let found = document
                .get_files(black_box(&document_tokens[999]), KeyType::Token)
                .expect("lookup");
            black_box(found);
        })
    });

    c.bench_function("relational_get_files_by_token_1k", |b| {
        b.iter(|| {
            let found = relational
                .get_files(black_box(&relational_tokens[999]), KeyType::Token)
                .expect("lookup");
            black_box(found);
        })
    });

    c.bench_function("relational_get_files_by_name_1k", |b| {
        b.iter(|| {
            let found = relational
                .get_files(black_box("share 999"), KeyType::ShareName)
                .expect("lookup");
            black_box(found);
        })
    });
}

criterion_group!(benches, bench_add_share, bench_lookup);
criterion_main!(benches);
