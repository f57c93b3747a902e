use tracing::debug;

use crate::{SpfError, dns::QueryType};

/// DNS query cap from RFC 7208 section 4.6.4.
pub const DEFAULT_QUERY_LIMIT: u32 = 10;

/// Counts the DNS queries one evaluation may still issue.
///
/// The budget covers the whole recursion tree of a `check_host` call and is
/// never reset when `include` or `redirect` are followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBudget {
    limit: u32,
    remaining: u32,
}

impl QueryBudget {
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub const fn used(&self) -> u32 {
        self.limit - self.remaining
    }

    /// Takes one query from the budget.
    ///
    /// # Errors
    ///
    /// Returns `PermError` once the budget is spent. Policies needing more
    /// lookups are invalid, not temporarily unresolvable.
    pub fn consume(&mut self, qtype: QueryType, name: &str) -> Result<(), SpfError> {
        if self.remaining == 0 {
            return Err(SpfError::perm(format!(
                "dns query limit reached ({} queries) at {qtype} {name}",
                self.limit
            )));
        }
        self.remaining -= 1;
        debug!("{qtype} {name} ({} of {} queries left)", self.remaining, self.limit);
        Ok(())
    }
}

impl Default for QueryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_exactly_limit_queries() {
        let mut budget = QueryBudget::default();
        for _ in 0..DEFAULT_QUERY_LIMIT {
            budget.consume(QueryType::A, "example.com").unwrap();
        }
        assert_eq!(budget.remaining(), 0);
        assert_eq!(budget.used(), DEFAULT_QUERY_LIMIT);

        let error = budget.consume(QueryType::A, "example.com").unwrap_err();
        assert!(error.is_permanent());
        assert!(error.reason().starts_with("dns query limit reached"));
    }

    #[test]
    fn test_zero_budget() {
        let mut budget = QueryBudget::new(0);
        assert!(budget.consume(QueryType::Txt, "example.com").is_err());
    }
}
