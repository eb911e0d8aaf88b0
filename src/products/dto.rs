use serde::{Deserialize, Serialize};

use super::repo_types::{NewProduct, ProductFilter, ProductPatch};
use crate::{
    error::ApiError,
    validation::{is_blank, FieldError, Validator},
};

/// Body of create and update. Every field is optional at the wire level so
/// missing fields are reported per field; `create` then requires them.
/// Unknown fields, `userId` included, are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub image_url: Option<String>,
}

fn check_text(v: &mut Validator, field: &str, value: &Option<String>, required: bool, label: &str) {
    match value {
        Some(s) if is_blank(s) => v.push(field, &format!("{} is required", label)),
        None if required => v.push(field, &format!("{} is required", label)),
        _ => {}
    }
}

impl ProductInput {
    fn check(&self, v: &mut Validator, required: bool) {
        check_text(v, "name", &self.name, required, "Name");
        check_text(v, "description", &self.description, required, "Description");
        check_text(v, "category", &self.category, required, "Category");
        match self.price {
            Some(p) if p <= 0.0 => v.push("price", "Price must be positive"),
            None if required => v.push("price", "Price is required"),
            _ => {}
        }
        if let Some(r) = self.rating {
            v.check((0.0..=5.0).contains(&r), "rating", "Rating must be between 0 and 5");
        }
    }

    pub fn into_new(self) -> Result<NewProduct, ApiError> {
        let mut v = Validator::new();
        self.check(&mut v, true);
        v.finish()?;
        Ok(NewProduct {
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            price: self.price.unwrap_or_default(),
            rating: self.rating,
            image_url: self.image_url,
        })
    }

    pub fn into_patch(self) -> Result<ProductPatch, ApiError> {
        let mut v = Validator::new();
        self.check(&mut v, false);
        v.finish()?;
        Ok(ProductPatch {
            name: self.name,
            description: self.description,
            category: self.category,
            price: self.price,
            rating: self.rating,
            image_url: self.image_url,
        })
    }
}

/// Raw filter query. Values stay strings so bad numbers become field errors.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_rating: Option<String>,
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

fn parse_number(v: &mut Validator, field: &str, raw: Option<String>) -> Option<f64> {
    let raw = non_empty(raw)?;
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => {
            v.push(field, "Must be a number");
            None
        }
    }
}

impl FilterQuery {
    pub fn into_filter(self) -> Result<ProductFilter, ApiError> {
        let mut v = Validator::new();
        let filter = ProductFilter {
            category: non_empty(self.category),
            min_price: parse_number(&mut v, "minPrice", self.min_price),
            max_price: parse_number(&mut v, "maxPrice", self.max_price),
            min_rating: parse_number(&mut v, "minRating", self.min_rating),
        };
        v.finish()?;
        Ok(filter)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

impl SearchQuery {
    pub fn into_query(self) -> Result<String, ApiError> {
        non_empty(self.q).ok_or_else(|| {
            ApiError::invalid(vec![FieldError::new("q", "Search query is required")])
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadResponse {
    pub image_url: String,
}
