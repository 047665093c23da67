//! Page-number pagination shared by every list endpoint.
//!
//! `?page=` is 1-based; `?page_size=` defaults to [`DEFAULT_PAGE_SIZE`] and is
//! capped at [`MAX_PAGE_SIZE`].

use fleet_core::store::Page;
use serde::Serialize;

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
  pub page:      u32,
  pub page_size: u32,
}

impl Paging {
  pub fn new(page: Option<u32>, page_size: Option<u32>) -> Result<Self, ApiError> {
    let page = page.unwrap_or(1);
    if page == 0 {
      return Err(ApiError::BadRequest("page starts at 1".into()));
    }
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size == 0 {
      return Err(ApiError::BadRequest("page_size must be at least 1".into()));
    }
    Ok(Self { page, page_size: page_size.min(MAX_PAGE_SIZE) })
  }

  pub fn limit(self) -> usize { self.page_size as usize }

  pub fn offset(self) -> usize {
    (self.page as usize - 1) * self.page_size as usize
  }

  pub fn wrap<T>(self, page: Page<T>) -> Paginated<T> {
    Paginated {
      count:     page.total,
      page:      self.page,
      page_size: self.page_size,
      results:   page.items,
    }
  }
}

/// The JSON envelope of a list response.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
  pub count:     u64,
  pub page:      u32,
  pub page_size: u32,
  pub results:   Vec<T>,
}
