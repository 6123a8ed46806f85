use super::schema::{
    login_table_schema, subscription_table_schema, EMAIL_INDEX, LOGIN_TABLE, SUBSCRIPTION_TABLE,
};
use super::user_models::{Subscription, User};
use crate::catalog::{CatalogQuery, QueryRouter};
use crate::composite_key;
use crate::kv_store::{
    ensure_table, Filter, KeyValueStore, PrimaryKey, ProvisioningError, ProvisioningPolicy,
};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    DependencyError(String),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "error", rename_all = "snake_case")]
pub enum Registration {
    Registered,
    /// A user with the same email already exists.
    Conflict,
    DependencyError(String),
}

impl Registration {
    pub fn is_registered(&self) -> bool {
        matches!(self, Registration::Registered)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "error", rename_all = "snake_case")]
pub enum SubscriptionChange {
    Applied,
    /// No catalog item has the requested title and artist.
    NoMatchingItem,
    DependencyError(String),
}

impl SubscriptionChange {
    pub fn is_applied(&self) -> bool {
        matches!(self, SubscriptionChange::Applied)
    }
}

/// Registration, authentication and subscription bookkeeping.
///
/// Store failures are returned as errors; the outcome enums only carry the
/// domain results.
pub struct UserManager {
    kv: Arc<dyn KeyValueStore>,
    catalog: QueryRouter,
}

impl UserManager {
    pub fn new(kv: Arc<dyn KeyValueStore>, catalog_table: &str) -> Self {
        Self {
            catalog: QueryRouter::new(kv.clone(), catalog_table),
            kv,
        }
    }

    /// Creates the login and subscription tables if they are missing.
    pub async fn provision_tables(
        &self,
        policy: &ProvisioningPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisioningError> {
        for schema in [login_table_schema(), subscription_table_schema()] {
            ensure_table(self.kv.as_ref(), &schema, policy, cancel).await?;
        }
        Ok(())
    }

    /// Registers a new user unless one with the same email exists.
    ///
    /// The existence check and the insert are separate writes, so two
    /// concurrent registrations of the same email can both succeed.
    pub fn register_user(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Registration> {
        let existing = self
            .kv
            .query(LOGIN_TABLE, Some(EMAIL_INDEX), &email.into(), &[])?;
        if !existing.is_empty() {
            debug!("Registration rejected, {} is taken", email);
            return Ok(Registration::Conflict);
        }

        let user = User {
            email: email.to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
        };
        self.kv.put(LOGIN_TABLE, user.to_item())?;
        info!("Registered user {}", email);
        Ok(Registration::Registered)
    }

    /// Looks the user up by email and password. A wrong password is
    /// indistinguishable from an unknown email.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Lookup<User>> {
        let key = composite_key::email_password(email, password);
        let items = self.kv.query(LOGIN_TABLE, None, &key.into(), &[])?;
        for item in &items {
            let user = User::from_item(item)?;
            if user.email == email && user.password == password {
                return Ok(Lookup::Found(user));
            }
        }
        Ok(Lookup::NotFound)
    }

    /// Subscribes the user to the catalog item with the given title and
    /// artist, replacing any earlier snapshot of it.
    ///
    /// When several items match (same song in different years) an arbitrary
    /// one is taken.
    pub fn register_subscription(
        &self,
        title: &str,
        artist: &str,
        email: &str,
    ) -> Result<SubscriptionChange> {
        if title.trim().is_empty() || artist.trim().is_empty() {
            return Ok(SubscriptionChange::NoMatchingItem);
        }
        let matches = self
            .catalog
            .find(&CatalogQuery::new(Some(title), Some(artist), None))?;
        let item = match matches.into_iter().next() {
            Some(item) => item,
            None => return Ok(SubscriptionChange::NoMatchingItem),
        };

        let subscription = Subscription {
            email: email.to_owned(),
            item,
        };
        self.kv.put(SUBSCRIPTION_TABLE, subscription.to_item())?;
        info!("{} subscribed to {} by {}", email, title, artist);
        Ok(SubscriptionChange::Applied)
    }

    /// Removes the subscription. Removing a missing subscription succeeds.
    pub fn delete_subscription(
        &self,
        title: &str,
        artist: &str,
        email: &str,
    ) -> Result<SubscriptionChange> {
        let key = PrimaryKey {
            hash: composite_key::email_title_artist(email, title, artist).into(),
            range: Some(email.into()),
        };
        self.kv.delete(SUBSCRIPTION_TABLE, &key)?;
        info!("{} unsubscribed from {} by {}", email, title, artist);
        Ok(SubscriptionChange::Applied)
    }

    pub fn list_subscriptions(&self, email: &str) -> Result<Vec<Subscription>> {
        self.kv
            .scan(SUBSCRIPTION_TABLE, &[Filter::eq("email", email)])?
            .iter()
            .map(Subscription::from_item)
            .collect()
    }
}
