use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::repo_types::{NewProduct, Product, ProductFilter, ProductPatch};

const PRODUCT_COLUMNS: &str = "id, name, description, category, price, rating, image_url, \
                               user_id, created_at, updated_at";

/// Resource store. Every operation is scoped to `owner`; a product owned by
/// someone else behaves exactly like one that does not exist.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self, owner: Uuid, filter: &ProductFilter) -> anyhow::Result<Vec<Product>>;
    async fn search(&self, owner: Uuid, q: &str) -> anyhow::Result<Vec<Product>>;
    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Product>>;
    async fn create(&self, owner: Uuid, new: NewProduct) -> anyhow::Result<Product>;
    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ProductPatch,
    ) -> anyhow::Result<Option<Product>>;
    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgProductStore {
    db: PgPool,
}

impl PgProductStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// `%q%` with LIKE metacharacters escaped so they match literally.
fn like_pattern(q: &str) -> String {
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for ch in q.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self, owner: Uuid, filter: &ProductFilter) -> anyhow::Result<Vec<Product>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM products WHERE user_id = ",
            PRODUCT_COLUMNS
        ));
        qb.push_bind(owner);
        if let Some(category) = &filter.category {
            qb.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND price <= ").push_bind(max);
        }
        if let Some(min) = filter.min_rating {
            qb.push(" AND rating >= ").push_bind(min);
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb.build_query_as::<Product>().fetch_all(&self.db).await?;
        Ok(rows)
    }

    async fn search(&self, owner: Uuid, q: &str) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {}
            FROM products
            WHERE user_id = $1
              AND (name ILIKE $2 ESCAPE '\' OR description ILIKE $2 ESCAPE '\')
            ORDER BY created_at DESC
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(owner)
        .bind(like_pattern(q))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn get(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND user_id = $2",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, owner: Uuid, new: NewProduct) -> anyhow::Result<Product> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (id, name, description, category, price, rating, image_url, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.description)
        .bind(new.category)
        .bind(new.price)
        .bind(new.rating)
        .bind(new.image_url)
        .bind(owner)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ProductPatch,
    ) -> anyhow::Result<Option<Product>> {
        // Ownership check and write happen in one statement.
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products SET
                name        = COALESCE($3, name),
                description = COALESCE($4, description),
                category    = COALESCE($5, category),
                price       = COALESCE($6, price),
                rating      = COALESCE($7, rating),
                image_url   = COALESCE($8, image_url),
                updated_at  = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.category)
        .bind(patch.price)
        .bind(patch.rating)
        .bind(patch.image_url)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
