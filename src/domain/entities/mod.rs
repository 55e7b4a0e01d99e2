pub mod embedding_record;
pub mod file_changed_event;
pub mod file_record;
