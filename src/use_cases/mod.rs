pub mod ingest_changed_file;
