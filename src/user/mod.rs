mod schema;
mod user_manager;
mod user_models;

pub use schema::{
    login_table_schema, subscription_table_schema, EMAIL_INDEX, LOGIN_TABLE, SUBSCRIPTION_TABLE,
};
pub use user_manager::{Lookup, Registration, SubscriptionChange, UserManager};
pub use user_models::{Subscription, User};
