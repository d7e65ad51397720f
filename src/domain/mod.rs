//! Pure share registry data types. No I/O, no storage.

pub mod share;

pub use share::{KeyType, Share, EMPTY_TOKEN};
