//! docsift - document upload and asynchronous OCR text extraction.
//!
//! Documents are uploaded over HTTP, stored on disk and in a database, and
//! analysed by workers that run OCR and record the extracted text.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod models;
pub mod ocr;
pub mod repository;
pub mod schema;
pub mod server;
pub mod work_queue;
pub mod worker;
