//! Database repositories

pub mod runs;

pub use runs::RunRecordRepository;
