// console/src/table.rs
use common::ClientRecord;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Search and paging state over the cached client list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientTable {
    query: String,
    page: usize,
    page_size: usize,
}

impl Default for ClientTable {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ClientTable {
    pub fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            page: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// New search text; goes back to the first page
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 0;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    /// New page size; goes back to the first page
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 0;
    }

    /// Clients whose name or email contains the query, ignoring case
    pub fn filter<'a>(&self, clients: &'a [ClientRecord]) -> Vec<&'a ClientRecord> {
        let needle = self.query.trim().to_lowercase();
        clients
            .iter()
            .filter(|c| {
                needle.is_empty()
                    || c.display_name.to_lowercase().contains(&needle)
                    || c.email.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Rows of the current page after filtering
    pub fn visible<'a>(&self, clients: &'a [ClientRecord]) -> Vec<&'a ClientRecord> {
        self.filter(clients)
            .into_iter()
            .skip(self.page.saturating_mul(self.page_size))
            .take(self.page_size)
            .collect()
    }

    /// Number of pages the filtered list spans, at least one
    pub fn page_count(&self, clients: &[ClientRecord]) -> usize {
        let matches = self.filter(clients).len();
        matches.div_ceil(self.page_size).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clients(n: usize) -> Vec<ClientRecord> {
        (0..n)
            .map(|i| ClientRecord {
                id: i.to_string(),
                display_name: format!("Client {}", i),
                email: format!("c{}@example.test", i),
                balance: 0.0,
                last_provisioned_at: None,
                password: None,
            })
            .collect()
    }

    #[test]
    fn test_search_matches_name_or_email_ignoring_case() {
        let mut list = clients(3);
        list[1].display_name = "ACME".to_string();
        list[2].email = "billing@acme.test".to_string();

        let mut table = ClientTable::default();
        table.set_query("acme");
        let ids: Vec<&str> = table.filter(&list).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_pagination() {
        let list = clients(23);
        let mut table = ClientTable::new(10);
        assert_eq!(table.page_count(&list), 3);

        table.set_page(2);
        let ids: Vec<&str> = table.visible(&list).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["20", "21", "22"]);

        table.set_page(5);
        assert!(table.visible(&list).is_empty());
    }

    #[test]
    fn test_query_and_page_size_reset_page() {
        let mut table = ClientTable::new(5);
        table.set_page(3);
        table.set_query("client");
        assert_eq!(table.page(), 0);

        table.set_page(2);
        table.set_page_size(25);
        assert_eq!(table.page(), 0);
        assert_eq!(table.page_size(), 25);
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let table = ClientTable::default();
        assert_eq!(table.page_count(&[]), 1);
        assert!(table.visible(&[]).is_empty());
    }
}
