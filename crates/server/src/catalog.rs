//! Product catalog.
//!
//! The set of products is fixed at startup. Identity is immutable; only the
//! per-product counter ever changes, and that lives in the counter store.

use serde::{Deserialize, Serialize};

/// A dashboard product. `accent` is presentation data carried through to
/// viewers, not interpreted by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub accent: String,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        accent: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            accent: accent.into(),
        }
    }
}

/// The known product set, in display order.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.products.iter().any(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.products.iter().map(|p| p.id.clone()).collect()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            Product::new("meepo", "Meepo", "#2563EB"),
            Product::new("kenangan", "Kenangan", "#DB2777"),
            Product::new("quantumbyte", "QuantumByte", "#0EA5E9"),
            Product::new("nexius", "Nexius", "#8B5CF6"),
        ])
    }
}
