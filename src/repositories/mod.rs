pub mod embedding_api_repository;
pub mod file_embedding_postgres_repository;
pub mod file_source_merge_repository;
