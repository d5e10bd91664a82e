// Page-number pagination: `?page=<n>&limit=<size>`, `{count, next, previous, results}` envelope

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};

const PAGE_PARAM: &str = "page";
const LIMIT_PARAM: &str = "limit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
    path: String,
    pairs: Vec<(String, String)>,
}

impl PageRequest {
    /// Parse paging parameters out of decoded query pairs.
    /// A malformed page number is a 404, a malformed size falls back to the default.
    pub fn from_pairs(
        path: &str,
        pairs: &[(String, String)],
        config: &PaginationConfig,
    ) -> AppResult<Self> {
        let page = match find(pairs, PAGE_PARAM) {
            None => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(invalid_page()),
            },
        };

        let page_size = find(pairs, LIMIT_PARAM)
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|size| *size > 0)
            .map(|size| size.min(config.max_page_size as i64))
            .unwrap_or(config.page_size as i64);

        // The offset has to fit in an i64
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(invalid_page());
        }

        Ok(Self {
            page,
            page_size,
            path: path.to_string(),
            pairs: pairs.to_vec(),
        })
    }

    pub fn first(path: &str, config: &PaginationConfig) -> Self {
        Self {
            page: 1,
            page_size: config.page_size as i64,
            path: path.to_string(),
            pairs: Vec::new(),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// Pages past the end are invalid; page 1 of an empty list is not
    pub fn check(&self, count: i64) -> AppResult<()> {
        if self.page > 1 && self.offset() >= count {
            return Err(invalid_page());
        }
        Ok(())
    }

    fn link(&self, page: i64) -> String {
        let mut pairs: Vec<(String, String)> = self
            .pairs
            .iter()
            .filter(|(key, _)| key != PAGE_PARAM)
            .cloned()
            .collect();
        if page > 1 {
            pairs.push((PAGE_PARAM.to_string(), page.to_string()));
        }

        match serde_urlencoded::to_string(&pairs) {
            Ok(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: &PageRequest, count: i64, results: Vec<T>) -> Self {
        let next = (request.page.saturating_mul(request.page_size) < count)
            .then(|| request.link(request.page + 1));
        let previous = (request.page > 1).then(|| request.link(request.page - 1));
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

fn find<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".to_string())
}
