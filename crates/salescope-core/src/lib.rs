#![deny(clippy::all)]

mod aggregator;
pub mod format;
mod records;
pub mod store;

pub use aggregator::*;
pub use records::*;
pub use store::{trailing_window, DateOrder, RecordStore, SaleQuery, StoreError};

pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
