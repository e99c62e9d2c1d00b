// Diesel table definitions. Kept in sync with the DDL in repository/context.rs.

diesel::table! {
    documents (id) {
        id -> BigInt,
        file_path -> Text,
        upload_date -> Text,
    }
}

diesel::table! {
    document_text (id) {
        id -> BigInt,
        document_id -> BigInt,
        extracted_text -> Text,
    }
}

diesel::table! {
    analysis_tasks (id) {
        id -> Text,
        document_id -> BigInt,
        status -> Text,
        result -> Nullable<Text>,
        worker -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(document_text -> documents (document_id));

diesel::allow_tables_to_appear_in_same_query!(analysis_tasks, document_text, documents,);
