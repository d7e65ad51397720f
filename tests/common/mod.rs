#![allow(dead_code)]

use std::{path::PathBuf, sync::Mutex};

use once_cell::sync::Lazy;
use quickshare::{JsonShareStore, ShareStore, SqliteShareStore};
use rand::seq::SliceRandom;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub const LONG_NAME: &str =
    "#Really l0ng share name?,; I wonder how+ that* looks~ in different 'places' of the UI :)";

/// Creates a unique directory that outlives the calling test.
pub fn temp_base() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

pub fn document_store() -> JsonShareStore {
    JsonShareStore::open_in(&temp_base()).expect("open document store")
}

pub fn relational_store() -> SqliteShareStore {
    SqliteShareStore::open_in(&temp_base()).expect("open relational store")
}

/// One started store per backend, each in its own directory.
pub fn all_stores() -> Vec<Box<dyn ShareStore>> {
    vec![Box::new(document_store()), Box::new(relational_store())]
}

pub fn files(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

pub fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values
}

/// Seeds the three shares used across the suites and returns their tokens.
pub fn add_some_shares(store: &dyn ShareStore) -> Vec<String> {
    let mut tokens = Vec::new();
    tokens.push(
        store
            .add_share(
                "qwertz",
                &files(&[
                    "/storage/sdcard0/123Test/Greenhouse.zip",
                    "/storage/sdcard0/123Test/Infos_Studierende.pdf",
                ]),
            )
            .expect("add qwertz"),
    );
    let records: Vec<String> = (0..6)
        .map(|idx| format!("/storage/sdcard0/Kompositionen/record{}.flac", idx))
        .collect();
    tokens.push(store.add_share("A Mol", &records).expect("add A Mol"));
    tokens.push(
        store
            .add_share(
                LONG_NAME,
                &files(&[
                    "/storage/sdcard0/Meine Fotos/Mein Urlaub in Athen/foto mit leerzeichen.png",
                    "/storage/sdcard0/Meine Fotos/Mein Urlaub in Athen/foto mit~! leerzeichen.png",
                    "/storage/sdcard0/Kamera/dmca13123.jpg",
                ]),
            )
            .expect("add long name"),
    );
    tokens
}

pub fn remove_some_shares(store: &dyn ShareStore) {
    for name in ["qwertz", "A Mol", LONG_NAME] {
        store.remove_share(name).expect("remove share");
    }
}

const ANIMALS: &[&str] = &[
    "Kangaroo", "Tiger", "Cameleon", "Pidgeon", "Weasel", "Rabbit", "Pig", "Snake",
];
const ADJECTIVES: &[&str] = &[
    "fast", "infurious", "infamous", "legit", "sleepy", "mauling", "murderous",
];

/// `count` distinct pseudo file names such as `sleepyTiger`.
pub fn random_files(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut all: Vec<String> = ADJECTIVES
        .iter()
        .flat_map(|adj| ANIMALS.iter().map(move |animal| format!("{}{}", adj, animal)))
        .collect();
    assert!(count <= all.len(), "not enough distinct names");
    all.shuffle(&mut rng);
    all.truncate(count);
    all
}
