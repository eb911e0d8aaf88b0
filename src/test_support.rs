use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::{CreateUserError, User};
use crate::products::repo::ProductStore;
use crate::products::repo_types::{NewProduct, Product, ProductFilter, ProductPatch};

/// In-memory stand-in for both stores, with the same scoping rules as Postgres.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    products: RwLock<Vec<Product>>,
}

fn filter_matches(f: &ProductFilter, p: &Product) -> bool {
    f.category.as_ref().map_or(true, |c| &p.category == c)
        && f.min_price.map_or(true, |min| p.price >= min)
        && f.max_price.map_or(true, |max| p.price <= max)
        && f.min_rating.map_or(true, |min| p.rating.map_or(false, |r| r >= min))
}

fn query_matches(p: &Product, q: &str) -> bool {
    let q = q.to_lowercase();
    p.name.to_lowercase().contains(&q) || p.description.to_lowercase().contains(&q)
}

/// Newest first; insertion order breaks timestamp ties.
fn newest_first<'a>(it: impl DoubleEndedIterator<Item = &'a Product>) -> Vec<Product> {
    let mut out: Vec<Product> = it.rev().cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, CreateUserError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == email) {
            return Err(CreateUserError::EmailTaken);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list(&self, owner: Uuid, filter: &ProductFilter) -> anyhow::Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(newest_first(
            products
                .iter()
                .filter(|p| p.user_id == owner && filter_matches(filter, p)),
        ))
    }

    async fn search(&self, owner: Uuid, q: &str) -> anyhow::Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(newest_first(
            products
                .iter()
                .filter(|p| p.user_id == owner && query_matches(p, q)),
        ))
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .find(|p| p.id == id && p.user_id == owner)
            .cloned())
    }

    async fn create(&self, owner: Uuid, new: NewProduct) -> anyhow::Result<Product> {
        let now = OffsetDateTime::now_utc();
        let product = Product {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            category: new.category,
            price: new.price,
            rating: new.rating,
            image_url: new.image_url,
            user_id: owner,
            created_at: now,
            updated_at: now,
        };
        self.products.write().await.push(product.clone());
        Ok(product)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ProductPatch,
    ) -> anyhow::Result<Option<Product>> {
        let mut products = self.products.write().await;
        let Some(p) = products
            .iter_mut()
            .find(|p| p.id == id && p.user_id == owner)
        else {
            return Ok(None);
        };
        if let Some(v) = patch.name {
            p.name = v;
        }
        if let Some(v) = patch.description {
            p.description = v;
        }
        if let Some(v) = patch.category {
            p.category = v;
        }
        if let Some(v) = patch.price {
            p.price = v;
        }
        if let Some(v) = patch.rating {
            p.rating = Some(v);
        }
        if let Some(v) = patch.image_url {
            p.image_url = Some(v);
        }
        p.updated_at = OffsetDateTime::now_utc();
        Ok(Some(p.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| !(p.id == id && p.user_id == owner));
        Ok(products.len() < before)
    }
}

/// Product store whose every call fails, for exercising the 500 path.
pub struct FailingStore;

#[async_trait]
impl ProductStore for FailingStore {
    async fn list(&self, _owner: Uuid, _filter: &ProductFilter) -> anyhow::Result<Vec<Product>> {
        anyhow::bail!("connection refused")
    }

    async fn search(&self, _owner: Uuid, _q: &str) -> anyhow::Result<Vec<Product>> {
        anyhow::bail!("connection refused")
    }

    async fn get(&self, _owner: Uuid, _id: Uuid) -> anyhow::Result<Option<Product>> {
        anyhow::bail!("connection refused")
    }

    async fn create(&self, _owner: Uuid, _new: NewProduct) -> anyhow::Result<Product> {
        anyhow::bail!("connection refused")
    }

    async fn update(
        &self,
        _owner: Uuid,
        _id: Uuid,
        _patch: ProductPatch,
    ) -> anyhow::Result<Option<Product>> {
        anyhow::bail!("connection refused")
    }

    async fn delete(&self, _owner: Uuid, _id: Uuid) -> anyhow::Result<bool> {
        anyhow::bail!("connection refused")
    }
}

/// User store that loses every signup race: lookups find nobody, inserts hit the unique index.
pub struct RacingUserStore;

#[async_trait]
impl UserStore for RacingUserStore {
    async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
        Ok(None)
    }

    async fn find_by_id(&self, _id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(None)
    }

    async fn create(&self, _email: &str, _password_hash: &str) -> Result<User, CreateUserError> {
        Err(CreateUserError::EmailTaken)
    }
}
