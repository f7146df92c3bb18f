//! Lenient page-number pagination.
//!
//! A requested page never fails to resolve: missing or garbage input lands
//! on the first page, numbers past the end land on the last page. An empty
//! collection still has one (empty) page.

use std::ops::RangeInclusive;

use serde::Serialize;

use crate::constants::POSTS_PER_PAGE;

/// The raw `?page=` value after parsing. `None` means "not a usable integer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRequest(Option<i64>);

impl PageRequest {
    pub fn parse(raw: Option<&str>) -> Self {
        Self(raw.and_then(|s| s.trim().parse::<i64>().ok()))
    }

    pub fn number(n: i64) -> Self {
        Self(Some(n))
    }

    pub fn first() -> Self {
        Self(None)
    }
}

/// Page geometry for a collection of `count` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn num_pages(&self) -> usize {
        self.count.div_ceil(self.per_page).max(1)
    }

    /// Clamp a request onto `1..=num_pages`.
    pub fn resolve(&self, request: PageRequest) -> usize {
        match request.0 {
            None => 1,
            Some(n) if n < 1 => 1,
            Some(n) => (n as u64).min(self.num_pages() as u64) as usize,
        }
    }

    /// Row window (offset, limit) for a resolved page number.
    pub fn window(&self, number: usize) -> (usize, usize) {
        ((number.max(1) - 1) * self.per_page, self.per_page)
    }

    /// Resolve `request` and load its rows through `fetch(offset, limit)`.
    pub fn fetch<T, E>(
        &self,
        request: PageRequest,
        fetch: impl FnOnce(usize, usize) -> Result<Vec<T>, E>,
    ) -> Result<Page<T>, E> {
        let number = self.resolve(request);
        let (offset, limit) = self.window(number);
        let items = fetch(offset, limit)?;
        Ok(Page {
            items,
            number,
            num_pages: self.num_pages(),
            count: self.count,
            per_page: self.per_page,
        })
    }

    /// Paginate an already materialized list.
    pub fn slice<T>(items: Vec<T>, per_page: usize, request: PageRequest) -> Page<T> {
        let paginator = Self::new(items.len(), per_page);
        let result: Result<Page<T>, std::convert::Infallible> =
            paginator.fetch(request, |offset, limit| {
                Ok(items.into_iter().skip(offset).take(limit).collect())
            });
        match result {
            Ok(page) => page,
            Err(never) => match never {},
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(0, POSTS_PER_PAGE)
    }
}

/// One bounded page of rows plus what a template needs for navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }

    pub fn next_page_number(&self) -> Option<usize> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<usize> {
        self.has_previous().then_some(self.number - 1)
    }

    pub fn page_range(&self) -> RangeInclusive<usize> {
        1..=self.num_pages
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
