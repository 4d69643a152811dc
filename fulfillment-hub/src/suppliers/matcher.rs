use serde::Serialize;
use shared::models::{AssignmentTarget, LineItem, SupplierAssignment};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Suppliers interested in an order, plus diagnostics for items nobody claimed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub suppliers: BTreeSet<String>,
    /// Line items that contributed to no supplier's interest
    pub unmatched_items: usize,
    /// Line items without any usable SKU field
    pub unresolved_sku_items: usize,
    /// Lowest assignment priority that matched, per supplier
    pub best_priority: BTreeMap<String, i32>,
}

impl MatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }

    /// Suppliers ordered by preference (lowest priority value first)
    pub fn by_priority(&self) -> Vec<&str> {
        let mut ranked: Vec<_> = self
            .best_priority
            .iter()
            .map(|(id, p)| (*p, id.as_str()))
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, id)| id).collect()
    }
}

#[derive(Default)]
struct AssignmentIndex<'a> {
    by_sku: HashMap<&'a str, Vec<&'a SupplierAssignment>>,
    by_category: HashMap<String, Vec<&'a SupplierAssignment>>,
}

impl<'a> AssignmentIndex<'a> {
    fn build(assignments: &'a [SupplierAssignment]) -> Self {
        let mut index = Self::default();
        for assignment in assignments.iter().filter(|a| a.is_active) {
            match &assignment.target {
                AssignmentTarget::Sku(sku) => index
                    .by_sku
                    .entry(sku.trim())
                    .or_default()
                    .push(assignment),
                AssignmentTarget::Category(category) => index
                    .by_category
                    .entry(category.trim().to_lowercase())
                    .or_default()
                    .push(assignment),
            }
        }
        index
    }

    /// Assignments hit by an item whose SKU resolved to `sku`
    fn matches<'s>(
        &'s self,
        sku: &str,
        item: &LineItem,
    ) -> impl Iterator<Item = &'a SupplierAssignment> + 's {
        let by_sku = self.by_sku.get(sku.trim()).into_iter().flatten();
        let by_category = item
            .category
            .as_deref()
            .and_then(|c| self.by_category.get(&c.trim().to_lowercase()))
            .into_iter()
            .flatten();
        by_sku.chain(by_category).copied()
    }
}

/// Resolve which suppliers may see an order.
///
/// A supplier is interested when any one line item hits one of its active
/// assignments; partial overlap is enough.
pub fn resolve_interested_suppliers(
    line_items: &[LineItem],
    assignments: &[SupplierAssignment],
) -> MatchOutcome {
    let index = AssignmentIndex::build(assignments);
    let mut outcome = MatchOutcome::default();

    for item in line_items {
        // Items without a SKU never reach a supplier, not even by category
        let Some(sku) = item.resolved_sku() else {
            outcome.unresolved_sku_items += 1;
            outcome.unmatched_items += 1;
            continue;
        };

        let mut matched = false;
        for assignment in index.matches(sku, item) {
            matched = true;
            outcome.suppliers.insert(assignment.supplier_id.clone());
            outcome
                .best_priority
                .entry(assignment.supplier_id.clone())
                .and_modify(|p| *p = (*p).min(assignment.priority))
                .or_insert(assignment.priority);
        }
        if !matched {
            outcome.unmatched_items += 1;
        }
    }

    if outcome.unmatched_items > 0 {
        tracing::debug!(
            unmatched = outcome.unmatched_items,
            unresolved_sku = outcome.unresolved_sku_items,
            "Line items without an interested supplier"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: &str) -> LineItem {
        LineItem {
            sku: Some(sku.to_string()),
            ..LineItem::default()
        }
    }

    #[test]
    fn partial_overlap_is_enough() {
        let assignments = vec![
            SupplierAssignment::sku("S1", "A1"),
            SupplierAssignment::sku("S1", "A2"),
        ];
        let outcome = resolve_interested_suppliers(&[item("A2"), item("Z9")], &assignments);
        assert_eq!(outcome.suppliers, BTreeSet::from(["S1".to_string()]));
        assert_eq!(outcome.unmatched_items, 1);
        assert_eq!(outcome.unresolved_sku_items, 0);
    }

    #[test]
    fn sku_falls_back_through_identifier_fields() {
        let assignments = vec![
            SupplierAssignment::sku("S1", "P-7"),
            SupplierAssignment::sku("S2", "PP-9"),
        ];
        let by_id = LineItem {
            product_id: Some("P-7".to_string()),
            ..LineItem::default()
        };
        let by_purchased = LineItem {
            purchased_product_id: Some("PP-9".to_string()),
            ..LineItem::default()
        };
        let outcome = resolve_interested_suppliers(&[by_id, by_purchased], &assignments);
        assert_eq!(outcome.suppliers.len(), 2);
        assert_eq!(outcome.unmatched_items, 0);
    }

    #[test]
    fn item_without_sku_is_counted_not_fatal() {
        let assignments = vec![SupplierAssignment::sku("S1", "A1")];
        let outcome =
            resolve_interested_suppliers(&[LineItem::default(), item("A1")], &assignments);
        assert_eq!(outcome.suppliers.len(), 1);
        assert_eq!(outcome.unresolved_sku_items, 1);
        assert_eq!(outcome.unmatched_items, 1);
    }

    #[test]
    fn item_without_sku_is_not_matched_by_category() {
        let assignments = vec![SupplierAssignment::category("S2", "Frozen")];
        let frozen = LineItem {
            category: Some("Frozen".to_string()),
            ..LineItem::default()
        };
        let outcome = resolve_interested_suppliers(&[frozen], &assignments);
        assert!(outcome.is_empty());
        assert_eq!(outcome.unresolved_sku_items, 1);
        assert_eq!(outcome.unmatched_items, 1);
    }

    #[test]
    fn inactive_assignments_are_ignored() {
        let assignments = vec![SupplierAssignment::sku("S1", "A1").inactive()];
        let outcome = resolve_interested_suppliers(&[item("A1")], &assignments);
        assert!(outcome.is_empty());
    }

    #[test]
    fn category_assignment_and_priority() {
        let assignments = vec![
            SupplierAssignment::category("S2", "Frozen").with_priority(5),
            SupplierAssignment::sku("S1", "A1").with_priority(3),
            SupplierAssignment::sku("S2", "A1").with_priority(1),
        ];
        let frozen = LineItem {
            sku: Some("B4".to_string()),
            category: Some("frozen".to_string()),
            ..LineItem::default()
        };
        let outcome = resolve_interested_suppliers(&[item("A1"), frozen], &assignments);
        assert_eq!(outcome.best_priority.get("S2"), Some(&1));
        assert_eq!(outcome.by_priority(), vec!["S2", "S1"]);
        assert_eq!(outcome.unmatched_items, 0);
    }
}
