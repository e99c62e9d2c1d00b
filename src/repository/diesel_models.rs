//! Diesel ORM models for database tables.

use diesel::prelude::*;

use crate::schema;

/// Document record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::documents)]
pub struct DocumentRecord {
    pub id: i64,
    pub file_path: String,
    pub upload_date: String,
}

/// New document for insertion. `upload_date` comes from the column default.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::documents)]
pub struct NewDocument<'a> {
    pub file_path: &'a str,
}

/// Extracted text record from the database.
#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = schema::document_text)]
#[diesel(belongs_to(DocumentRecord, foreign_key = document_id))]
pub struct DocumentTextRecord {
    pub id: i64,
    pub document_id: i64,
    pub extracted_text: String,
}

/// New extracted text for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::document_text)]
pub struct NewDocumentText<'a> {
    pub document_id: i64,
    pub extracted_text: &'a str,
}

/// Analysis task record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::analysis_tasks)]
pub struct AnalysisTaskRecord {
    pub id: String,
    pub document_id: i64,
    pub status: String,
    pub result: Option<String>,
    pub worker: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New analysis task for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::analysis_tasks)]
pub struct NewAnalysisTask<'a> {
    pub id: &'a str,
    pub document_id: i64,
    pub status: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
