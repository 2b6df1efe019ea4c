pub mod record_store;
pub mod sea_orm_store;
pub mod sector_repository;

pub use record_store::{InMemoryRecordStore, RecordStore, StoredRecord, UpdateFn};
pub use sea_orm_store::SeaOrmRecordStore;
pub use sector_repository::SectorRepository;
