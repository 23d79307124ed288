//! Supplier company catalog entity (spec §3).

use serde::{Deserialize, Serialize};

use crate::value_objects::CompanyId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub tax_id: String,
    pub description: String,
    pub products: Vec<String>,
    pub keywords: Vec<String>,
    pub owner_user_id: Option<String>,
}

impl Company {
    /// Text representation used for embedding in the matching engine (spec
    /// §4.7 step 1). Field order matches the original Python
    /// `bid_service.py` composition so re-embeddings are stable.
    #[must_use]
    pub fn vectorizable_text(&self) -> String {
        let mut parts = vec![self.legal_name.clone()];
        if let Some(trade_name) = &self.trade_name {
            parts.push(trade_name.clone());
        }
        parts.push(self.description.clone());
        if !self.products.is_empty() {
            parts.push(self.products.join(", "));
        }
        if !self.keywords.is_empty() {
            parts.push(self.keywords.join(", "));
        }
        parts.join(" ")
    }
}
