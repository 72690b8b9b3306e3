use serde::{Deserialize, Serialize};

/// A category with its own item count and its direct children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub count: i64,
    pub children: Vec<CategoryNode>,
}

/// One display row of the flattened category list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub count: i64,
    pub parent_id: Option<i64>,
}

impl CategoryRow {
    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Flatten top-level categories into display rows.
///
/// Each top-level row counts its own items plus its direct children's own
/// items and is followed by its children, which keep their own count.
/// Input order is preserved at both levels.
pub fn flatten(tree: &[CategoryNode]) -> Vec<CategoryRow> {
    let mut rows = Vec::with_capacity(tree.iter().map(|n| 1 + n.children.len()).sum());

    for parent in tree {
        let children_total: i64 = parent.children.iter().map(|c| c.count).sum();
        rows.push(CategoryRow {
            id: parent.id,
            name: parent.name.clone(),
            url: parent.url.clone(),
            count: parent.count + children_total,
            parent_id: None,
        });

        rows.extend(parent.children.iter().map(|child| CategoryRow {
            id: child.id,
            name: child.name.clone(),
            url: child.url.clone(),
            count: child.count,
            parent_id: Some(parent.id),
        }));
    }

    rows
}
