//! The catalog service boundary.
//!
//! Every operation reports its result as an outcome value; dependency
//! failures are logged and folded into the outcome instead of being
//! returned as errors.

use crate::blob_store::BlobStore;
use crate::catalog::{
    CatalogImporter, CatalogItem, CatalogQuery, ImporterSettings, QueryRouter, SyncOutcome,
};
use crate::fetcher::MediaFetcher;
use crate::kv_store::{KeyValueStore, ProvisioningError};
use crate::user::{Lookup, Registration, Subscription, SubscriptionChange, User, UserManager};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Process-wide clients for the external collaborators, created once and
/// shared by every operation.
#[derive(Clone)]
pub struct Clients {
    pub kv: Arc<dyn KeyValueStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub fetcher: Arc<dyn MediaFetcher>,
}

pub struct CatalogService {
    importer: CatalogImporter,
    router: QueryRouter,
    users: UserManager,
    settings: ImporterSettings,
    cancel: CancellationToken,
}

fn fold_error<T>(operation: &str, result: anyhow::Result<T>, on_error: fn(String) -> T) -> T {
    result.unwrap_or_else(|err| {
        error!("{} failed: {:#}", operation, err);
        on_error(format!("{:#}", err))
    })
}

fn or_empty<T>(operation: &str, result: anyhow::Result<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|err| {
        error!("{} failed: {:#}", operation, err);
        vec![]
    })
}

impl CatalogService {
    /// `cancel` stops provisioning waits and in-flight synchronizations.
    pub fn new(clients: Clients, settings: ImporterSettings, cancel: CancellationToken) -> Self {
        CatalogService {
            importer: CatalogImporter::new(
                clients.kv.clone(),
                clients.blobs.clone(),
                clients.fetcher.clone(),
                settings.clone(),
            ),
            router: QueryRouter::new(clients.kv.clone(), &settings.table),
            users: UserManager::new(clients.kv, &settings.table),
            settings,
            cancel,
        }
    }

    /// Provisions the user tables. The catalog table is provisioned by the
    /// first synchronization.
    pub async fn start(&self) -> Result<(), ProvisioningError> {
        self.users
            .provision_tables(&self.settings.provisioning, &self.cancel)
            .await
    }

    pub async fn sync_catalog(&self) -> SyncOutcome {
        self.importer.sync(&self.cancel).await
    }

    pub fn find_catalog(
        &self,
        title: Option<&str>,
        artist: Option<&str>,
        year: Option<i32>,
    ) -> Vec<CatalogItem> {
        let query = CatalogQuery::new(title, artist, year);
        or_empty("Catalog lookup", self.router.find(&query))
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Lookup<User> {
        fold_error(
            "Authentication",
            self.users.authenticate(email, password),
            Lookup::DependencyError,
        )
    }

    pub fn register_user(&self, email: &str, username: &str, password: &str) -> Registration {
        fold_error(
            "Registration",
            self.users.register_user(email, username, password),
            Registration::DependencyError,
        )
    }

    pub fn register_subscription(
        &self,
        title: &str,
        artist: &str,
        email: &str,
    ) -> SubscriptionChange {
        fold_error(
            "Subscribe",
            self.users.register_subscription(title, artist, email),
            SubscriptionChange::DependencyError,
        )
    }

    pub fn delete_subscription(
        &self,
        title: &str,
        artist: &str,
        email: &str,
    ) -> SubscriptionChange {
        fold_error(
            "Unsubscribe",
            self.users.delete_subscription(title, artist, email),
            SubscriptionChange::DependencyError,
        )
    }

    pub fn list_subscriptions(&self, email: &str) -> Vec<Subscription> {
        or_empty("Subscription listing", self.users.list_subscriptions(email))
    }
}
