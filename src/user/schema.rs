use crate::kv_store::{KeySchema, TableSchema};

pub const LOGIN_TABLE: &str = "login";
pub const SUBSCRIPTION_TABLE: &str = "subscription";

pub const EMAIL_INDEX: &str = "email-index";

/// Users keyed by `email|password`, with an email index for the
/// uniqueness check on registration.
pub fn login_table_schema() -> TableSchema {
    TableSchema::new(LOGIN_TABLE, KeySchema::hash_only("email_password"))
        .with_index(EMAIL_INDEX, KeySchema::hash_only("email"))
}

pub fn subscription_table_schema() -> TableSchema {
    TableSchema::new(
        SUBSCRIPTION_TABLE,
        KeySchema::hash_range("email_title_artist", "email"),
    )
}
