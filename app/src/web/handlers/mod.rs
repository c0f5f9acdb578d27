// stockpile_app/src/web/handlers/mod.rs

pub mod order_handlers;
pub mod product_handlers;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

/// `?page=&limit=`. Values that do not parse fall back to the defaults
/// instead of failing the request.
#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
  pub page: Option<String>,
  pub limit: Option<String>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  pub page: usize,
  pub limit: usize,
  pub total: usize,
  pub pages: usize,
}

impl PageQuery {
  fn page(&self) -> usize {
    match self.page.as_deref().and_then(|raw| raw.trim().parse::<i64>().ok()) {
      Some(page) if page >= 1 => page as usize,
      _ => 1,
    }
  }

  fn limit(&self) -> usize {
    match self.limit.as_deref().and_then(|raw| raw.trim().parse::<i64>().ok()) {
      Some(limit) if (1..=MAX_PAGE_LIMIT as i64).contains(&limit) => limit as usize,
      _ => DEFAULT_PAGE_LIMIT,
    }
  }

  /// The requested window of `items` plus the numbers describing it.
  pub fn apply<T>(&self, items: Vec<T>) -> (Vec<T>, Pagination) {
    let page = self.page();
    let limit = self.limit();
    let total = items.len();
    let pagination = Pagination {
      page,
      limit,
      total,
      pages: total.div_ceil(limit),
    };
    let window = items
      .into_iter()
      .skip((page - 1).saturating_mul(limit))
      .take(limit)
      .collect();
    (window, pagination)
  }
}

/// Path ids arrive as text so a malformed one gets the same message as a
/// non-positive one.
pub(crate) fn parse_id(raw: &str, entity: &str) -> Result<i64> {
  match raw.trim().parse::<i64>() {
    Ok(id) if id > 0 => Ok(id),
    _ => Err(AppError::BadRequest(format!("Invalid {} ID", entity))),
  }
}
