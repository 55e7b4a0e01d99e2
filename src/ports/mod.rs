pub mod embedding_provider;
pub mod file_ingestion_store;
pub mod file_source;
