// src/ingest/providers/mod.rs
pub mod feed;
pub mod front_page;
pub mod preprint;
pub mod repo_search;
