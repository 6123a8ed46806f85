use crate::catalog::CatalogItem;
use crate::composite_key;
use crate::kv_store::{get_text, Item};
use anyhow::Result;
use serde::Serialize;

/// A registered user.
///
/// The password is kept and compared as given, without hashing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl User {
    pub fn email_password(&self) -> String {
        composite_key::email_password(&self.email, &self.password)
    }

    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert("email".to_string(), self.email.as_str().into());
        item.insert("username".to_string(), self.username.as_str().into());
        item.insert("password".to_string(), self.password.as_str().into());
        item.insert("email_password".to_string(), self.email_password().into());
        item
    }

    pub fn from_item(item: &Item) -> Result<Self> {
        Ok(User {
            email: get_text(item, "email")?,
            username: get_text(item, "username")?,
            password: get_text(item, "password")?,
        })
    }
}

/// A user's subscription to a catalog item, holding a copy of the item as it
/// was when the subscription was made.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub email: String,
    #[serde(flatten)]
    pub item: CatalogItem,
}

impl Subscription {
    pub fn email_title_artist(&self) -> String {
        composite_key::email_title_artist(&self.email, &self.item.title, &self.item.artist)
    }

    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        self.item.write_attributes(&mut item);
        item.insert("email".to_string(), self.email.as_str().into());
        item.insert(
            "email_title_artist".to_string(),
            self.email_title_artist().into(),
        );
        item
    }

    pub fn from_item(item: &Item) -> Result<Self> {
        Ok(Subscription {
            email: get_text(item, "email")?,
            item: CatalogItem::from_item(item)?,
        })
    }
}
