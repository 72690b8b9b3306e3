//! Cursor pagination shared by every list query.
//!
//! A page is fetched as `limit + 1` rows ordered by `(sort column, id)`,
//! starting at the cursor row. When the extra row comes back it is removed
//! and its id becomes the next cursor, so the next page starts exactly where
//! this one stopped. A cursor naming a missing row matches nothing and
//! yields an empty page.

use deaconn_types::api::{
    ArticleSort, DEFAULT_PAGE_LIMIT, LogSort, MAX_PAGE_LIMIT, PageQuery, Paginated, PartnerSort,
    RecordSort, RequestSort, ServiceSort, SortDirection, UserSort,
};

/// Allow-listed sort column of a paged table. Columns must be NOT NULL.
pub trait SortKey: Copy {
    fn column(self) -> &'static str;
}

impl SortKey for ArticleSort {
    fn column(self) -> &'static str {
        match self {
            ArticleSort::Id => "id",
            ArticleSort::CreatedAt => "created_at",
            ArticleSort::UpdatedAt => "updated_at",
            ArticleSort::Views => "views",
            ArticleSort::Title => "title",
        }
    }
}

impl SortKey for ServiceSort {
    fn column(self) -> &'static str {
        match self {
            ServiceSort::Id => "id",
            ServiceSort::CreatedAt => "created_at",
            ServiceSort::Views => "views",
            ServiceSort::Name => "name",
        }
    }
}

impl SortKey for RequestSort {
    fn column(self) -> &'static str {
        match self {
            RequestSort::Id => "id",
            RequestSort::CreatedAt => "created_at",
            RequestSort::UpdatedAt => "updated_at",
        }
    }
}

impl SortKey for UserSort {
    fn column(self) -> &'static str {
        match self {
            UserSort::CreatedAt => "created_at",
        }
    }
}

impl SortKey for PartnerSort {
    fn column(self) -> &'static str {
        match self {
            PartnerSort::Id => "id",
            PartnerSort::Priority => "priority",
            PartnerSort::CreatedAt => "created_at",
            PartnerSort::Name => "name",
        }
    }
}

impl SortKey for LogSort {
    fn column(self) -> &'static str {
        match self {
            LogSort::Id => "id",
        }
    }
}

/// Experiences and skills sort by `title`; projects map it to `name`.
impl SortKey for RecordSort {
    fn column(self) -> &'static str {
        match self {
            RecordSort::Id => "id",
            RecordSort::Title => "title",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageRequest<S, C = i64> {
    pub limit: u32,
    pub cursor: Option<C>,
    pub sort: S,
    pub direction: SortDirection,
}

impl<S: SortKey + Default, C> PageRequest<S, C> {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            cursor: None,
            sort: S::default(),
            direction: SortDirection::default(),
        }
    }

    /// Validate a query string. A zero limit is rejected, large ones clamped.
    pub fn from_query(query: PageQuery<S, C>) -> Result<Self, String> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if limit == 0 {
            return Err("limit must be a positive integer".into());
        }
        Ok(Self {
            limit: limit.min(MAX_PAGE_LIMIT),
            cursor: query.cursor,
            sort: query.sort.unwrap_or_default(),
            direction: query.direction.unwrap_or_default(),
        })
    }

    pub fn with_cursor(mut self, cursor: Option<C>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn sorted(mut self, sort: S, direction: SortDirection) -> Self {
        self.sort = sort;
        self.direction = direction;
        self
    }
}

impl<S: SortKey, C> PageRequest<S, C> {
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.limit) + 1
    }

    /// Keyset fragments for `table` aliased as `alias`. The predicate binds
    /// `:cursor`; the caller appends `LIMIT :limit`.
    pub fn keyset(&self, table: &str, alias: &str) -> Keyset {
        self.keyset_on(table, alias, self.sort.column())
    }

    /// Same as [`keyset`](Self::keyset) with an explicit column, for tables
    /// whose naming differs from the sort enum.
    pub fn keyset_on(&self, table: &str, alias: &str, column: &str) -> Keyset {
        let (cmp, dir) = match self.direction {
            SortDirection::Asc => (">=", "ASC"),
            SortDirection::Desc => ("<=", "DESC"),
        };
        Keyset {
            predicate: format!(
                "(:cursor IS NULL OR ({alias}.{column}, {alias}.id) {cmp} \
                 (SELECT c.{column}, c.id FROM {table} c WHERE c.id = :cursor))"
            ),
            order_by: format!("ORDER BY {alias}.{column} {dir}, {alias}.id {dir}"),
        }
    }
}

pub struct Keyset {
    pub predicate: String,
    pub order_by: String,
}

/// Trim the look-ahead row and turn it into the next cursor.
pub fn finish_page<T, C>(mut rows: Vec<T>, limit: u32, cursor_of: impl Fn(&T) -> C) -> Paginated<T, C> {
    let next_cursor = if rows.len() > limit as usize {
        rows.truncate(limit as usize + 1);
        rows.pop().map(|row| cursor_of(&row))
    } else {
        None
    };
    Paginated { items: rows, next_cursor }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_row_becomes_cursor() {
        let page = finish_page((1..=11).collect::<Vec<i64>>(), 10, |id| *id);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.next_cursor, Some(11));
    }

    #[test]
    fn short_page_has_no_cursor() {
        let page = finish_page(vec![1i64, 2, 3], 10, |id| *id);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.next_cursor, None);

        let exact = finish_page((1..=10).collect::<Vec<i64>>(), 10, |id| *id);
        assert_eq!(exact.items.len(), 10);
        assert_eq!(exact.next_cursor, None);
    }

    #[test]
    fn zero_limit_is_rejected_and_large_limit_clamped() {
        let zero: PageQuery<ArticleSort> = PageQuery { limit: Some(0), cursor: None, sort: None, direction: None };
        assert!(PageRequest::<ArticleSort>::from_query(zero).is_err());

        let huge: PageQuery<ArticleSort> = PageQuery { limit: Some(5000), cursor: None, sort: None, direction: None };
        let req: PageRequest<ArticleSort> = PageRequest::from_query(huge).unwrap();
        assert_eq!(req.limit, MAX_PAGE_LIMIT);
        assert_eq!(req.fetch_limit(), i64::from(MAX_PAGE_LIMIT) + 1);
    }

    #[test]
    fn keyset_uses_allow_listed_column_and_direction() {
        let req = PageRequest::<ArticleSort>::new(10).sorted(ArticleSort::Views, SortDirection::Asc);
        let keyset = req.keyset("articles", "a");
        assert_eq!(keyset.order_by, "ORDER BY a.views ASC, a.id ASC");
        assert!(keyset.predicate.contains("(a.views, a.id) >="));
        assert!(keyset.predicate.contains("FROM articles c WHERE c.id = :cursor"));
    }
}
