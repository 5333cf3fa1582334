use super::types::{SortDirection, SortKey};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse a sort parameter such as `year` or `-year` against a safelist.
    ///
    /// The safelist holds both forms (`year`, `-year`); anything outside it
    /// returns `None`.
    pub fn parse(sort: &str, safelist: &[&str]) -> Option<SortKey> {
        let sort = sort.trim();
        if !safelist.contains(&sort) {
            return None;
        }

        match sort.strip_prefix('-') {
            Some(column) => Some(SortKey {
                column: column.to_string(),
                direction: SortDirection::Desc,
            }),
            None => Some(SortKey {
                column: sort.to_string(),
                direction: SortDirection::Asc,
            }),
        }
    }

    /// ORDER BY clause with `id ASC` as the tiebreaker.
    ///
    /// Only call with keys produced by `parse`, the column name is
    /// interpolated into the SQL text.
    pub fn generate(key: &SortKey) -> String {
        if key.column == "id" {
            return format!("ORDER BY \"id\" {}", key.direction.to_sql());
        }
        format!(
            "ORDER BY \"{}\" {}, \"id\" ASC",
            key.column,
            key.direction.to_sql()
        )
    }
}
