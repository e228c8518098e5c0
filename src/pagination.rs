//! Page-number pagination shared by the JSON API and the HTML views.
//!
//! A request is parsed in two steps: [`PageRequest::from_params`] checks the
//! syntax of `page` / `page_size` without touching the database, and
//! [`PageRequest::resolve`] checks the page against the row count.

use crate::errors::AppError;
use serde::Serialize;
use std::num::IntErrorKind;
use url::Url;
use utoipa::ToSchema;

use crate::models::{
    CompanyResponse, DistrictResponse, MunicipalityResponse, Region, StateResponse,
};

/// Default page size of the JSON API.
pub const API_PAGE_SIZE: i64 = 25;
/// Largest `page_size` the JSON API honours.
pub const API_MAX_PAGE_SIZE: i64 = 100;

pub const INVALID_PAGE: &str = "Invalid page.";

/// Requested page before the row count is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(i64),
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: PageNumber,
    pub size: i64,
}

impl PageRequest {
    /// Fixed page size, as used by the HTML views. A blank `page` is the
    /// first page.
    pub fn fixed(page: Option<&str>, size: i64) -> Result<Self, AppError> {
        let page = page.map(str::trim).filter(|p| !p.is_empty());
        Ok(Self {
            number: parse_page_number(page)?,
            size,
        })
    }

    /// Client-sized page, as used by the JSON API. An unusable `page_size`
    /// falls back to `default_size`; a larger one (including one too large
    /// for an `i64`) is capped at `max_size`. A blank `page` is invalid.
    pub fn from_params(
        page: Option<&str>,
        page_size: Option<&str>,
        default_size: i64,
        max_size: i64,
    ) -> Result<Self, AppError> {
        let size = match page_size.map(|s| s.trim().parse::<i64>()) {
            Some(Ok(s)) if s > 0 => s.min(max_size),
            Some(Err(e)) if *e.kind() == IntErrorKind::PosOverflow => max_size,
            _ => default_size,
        };

        Ok(Self {
            number: parse_page_number(page)?,
            size,
        })
    }

    /// Validates the page against `count` rows.
    pub fn resolve(&self, count: i64) -> Result<Page, AppError> {
        let num_pages = if count == 0 {
            1
        } else {
            (count + self.size - 1) / self.size
        };

        let number = match self.number {
            PageNumber::Last => num_pages,
            PageNumber::Number(n) => n,
        };

        if number < 1 || number > num_pages {
            return Err(AppError::NotFound(INVALID_PAGE.to_string()));
        }

        Ok(Page {
            number,
            size: self.size,
            count,
            num_pages,
        })
    }
}

fn parse_page_number(page: Option<&str>) -> Result<PageNumber, AppError> {
    match page.map(str::trim) {
        None => Ok(PageNumber::Number(1)),
        Some("last") => Ok(PageNumber::Last),
        Some(raw) => raw
            .parse::<i64>()
            .map(PageNumber::Number)
            .map_err(|_| AppError::NotFound(INVALID_PAGE.to_string())),
    }
}

/// A resolved page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
    pub count: i64,
    pub num_pages: i64,
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.size
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> Option<i64> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_number(&self) -> Option<i64> {
        self.has_previous().then_some(self.number - 1)
    }

    /// 1-based index of the first row on this page (0 when empty).
    pub fn start_index(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.offset() + 1
        }
    }

    /// 1-based index of the last row on this page.
    pub fn end_index(&self) -> i64 {
        (self.offset() + self.size).min(self.count)
    }

    /// Absolute `next` / `previous` links for `request_url`. The link to the
    /// first page drops the `page` parameter.
    pub fn links(&self, request_url: &Url) -> (Option<String>, Option<String>) {
        let next = self
            .next_number()
            .map(|n| with_page(request_url, Some(n)).to_string());
        let previous = self.previous_number().map(|n| {
            let page = if n == 1 { None } else { Some(n) };
            with_page(request_url, page).to_string()
        });
        (next, previous)
    }
}

/// Returns `url` with its `page` parameter replaced (or removed when `page` is
/// `None`), keeping every other parameter in order.
pub fn with_page(url: &Url, page: Option<i64>) -> Url {
    let keeps_query = page.is_some() || url.query_pairs().any(|(k, _)| k != "page");

    let mut out = url.clone();
    out.set_query(None);
    if !keeps_query {
        return out;
    }

    {
        let mut query = out.query_pairs_mut();
        let mut page_written = false;
        for (k, v) in url.query_pairs() {
            if k == "page" {
                if let (Some(n), false) = (page, page_written) {
                    query.append_pair("page", &n.to_string());
                    page_written = true;
                }
            } else {
                query.append_pair(&k, &v);
            }
        }
        if let (Some(n), false) = (page, page_written) {
            query.append_pair("page", &n.to_string());
        }
    }
    out
}

/// Envelope of every paginated JSON response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(
    PaginatedRegions = Paginated<Region>,
    PaginatedStates = Paginated<StateResponse>,
    PaginatedMunicipalities = Paginated<MunicipalityResponse>,
    PaginatedDistricts = Paginated<DistrictResponse>,
    PaginatedCompanies = Paginated<CompanyResponse>
)]
pub struct Paginated<T> {
    /// Total number of rows matching the filters.
    pub count: i64,
    /// Absolute URL of the next page.
    pub next: Option<String>,
    /// Absolute URL of the previous page.
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(page: &Page, request_url: &Url, results: Vec<T>) -> Self {
        let (next, previous) = page.links(request_url);
        Self {
            count: page.count,
            next,
            previous,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(page: Option<&str>, size: Option<&str>) -> Result<PageRequest, AppError> {
        PageRequest::from_params(page, size, API_PAGE_SIZE, API_MAX_PAGE_SIZE)
    }

    #[test]
    fn defaults_to_first_page() {
        let req = api(None, None).unwrap();
        assert_eq!(req.number, PageNumber::Number(1));
        assert_eq!(req.size, 25);
    }

    #[test]
    fn page_size_is_capped_and_bad_values_fall_back() {
        assert_eq!(api(None, Some("500")).unwrap().size, 100);
        assert_eq!(api(None, Some("0")).unwrap().size, 25);
        assert_eq!(api(None, Some("-3")).unwrap().size, 25);
        assert_eq!(api(None, Some("ten")).unwrap().size, 25);
        assert_eq!(api(None, Some("10")).unwrap().size, 10);
    }

    #[test]
    fn oversized_page_size_is_capped_not_reset() {
        assert_eq!(api(None, Some("9223372036854775807")).unwrap().size, 100);
        assert_eq!(api(None, Some("99999999999999999999")).unwrap().size, 100);
        assert_eq!(api(None, Some("-99999999999999999999")).unwrap().size, 25);
    }

    #[test]
    fn blank_page_is_invalid_in_the_api_only() {
        let err = api(Some(""), None).unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == INVALID_PAGE));
        assert!(api(Some("  "), None).is_err());

        let html = PageRequest::fixed(Some(""), 25).unwrap();
        assert_eq!(html.number, PageNumber::Number(1));
        assert_eq!(
            PageRequest::fixed(None, 25).unwrap().number,
            PageNumber::Number(1)
        );
    }

    #[test]
    fn non_integer_page_is_not_found() {
        let err = api(Some("abc"), None).unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == INVALID_PAGE));
    }

    #[test]
    fn resolve_checks_bounds() {
        let req = api(Some("3"), Some("10")).unwrap();
        let page = req.resolve(25).unwrap();
        assert_eq!(page.num_pages, 3);
        assert_eq!(page.offset(), 20);
        assert_eq!(page.end_index(), 25);
        assert!(!page.has_next());

        assert!(api(Some("4"), Some("10")).unwrap().resolve(25).is_err());
        assert!(api(Some("0"), Some("10")).unwrap().resolve(25).is_err());
    }

    #[test]
    fn empty_result_still_has_page_one() {
        let page = api(None, None).unwrap().resolve(0).unwrap();
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.start_index(), 0);
        assert_eq!(page.end_index(), 0);
        assert!(api(Some("2"), None).unwrap().resolve(0).is_err());
    }

    #[test]
    fn last_resolves_to_final_page() {
        let page = api(Some("last"), Some("10")).unwrap().resolve(31).unwrap();
        assert_eq!(page.number, 4);
    }

    #[test]
    fn links_keep_filters_and_drop_page_one() {
        let url = Url::parse("http://localhost:8000/api/states/?nome=ma&page=2&page_size=1")
            .unwrap();
        let page = PageRequest::from_params(Some("2"), Some("1"), 25, 100)
            .unwrap()
            .resolve(3)
            .unwrap();
        let (next, previous) = page.links(&url);
        assert_eq!(
            next.as_deref(),
            Some("http://localhost:8000/api/states/?nome=ma&page=3&page_size=1")
        );
        assert_eq!(
            previous.as_deref(),
            Some("http://localhost:8000/api/states/?nome=ma&page_size=1")
        );
    }

    #[test]
    fn next_link_is_appended_when_page_was_absent() {
        let url = Url::parse("http://localhost/api/companies/").unwrap();
        let page = api(None, None).unwrap().resolve(60).unwrap();
        let (next, previous) = page.links(&url);
        assert_eq!(
            next.as_deref(),
            Some("http://localhost/api/companies/?page=2")
        );
        assert!(previous.is_none());
    }
}
