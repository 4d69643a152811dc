//! Supplier assignment (read-only input to matching)

use serde::{Deserialize, Serialize};

/// What an assignment grants a supplier visibility of
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AssignmentTarget {
    Sku(String),
    Category(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierAssignment {
    pub supplier_id: String,
    pub target: AssignmentTarget,
    pub is_active: bool,
    /// Lower value = preferred supplier
    pub priority: i32,
}

impl SupplierAssignment {
    pub fn sku(supplier_id: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            supplier_id: supplier_id.into(),
            target: AssignmentTarget::Sku(sku.into()),
            is_active: true,
            priority: 0,
        }
    }

    pub fn category(supplier_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            supplier_id: supplier_id.into(),
            target: AssignmentTarget::Category(category.into()),
            is_active: true,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
