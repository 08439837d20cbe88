// src/engine/view.rs
//! The derived dashboard view: status filter, search, then pagination.
//!
//! `compute_view` is a pure function of its inputs. It is evaluated on every
//! request rather than cached, so the view can never lag behind the records.

use crate::engine::model::ApplicationRecord;
use std::collections::HashMap;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    All,
    Pending,
    Approved,
}

impl FilterType {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::All => "all",
            FilterType::Pending => "pending",
            FilterType::Approved => "approved",
        }
    }

    /// Unknown values fall back to `All`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pending" => FilterType::Pending,
            "approved" => FilterType::Approved,
            _ => FilterType::All,
        }
    }

    pub fn admits(self, record: &ApplicationRecord) -> bool {
        match self {
            FilterType::All => true,
            FilterType::Pending => record.is_pending(),
            FilterType::Approved => record.is_approved(),
        }
    }
}

/// The transient selection a viewer makes. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewQuery {
    pub filter: FilterType,
    pub search: String,
    pub page: usize,
    pub page_size: usize,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            filter: FilterType::All,
            search: String::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub total: usize,
    pub filtered: usize,
    pub pending: usize,
    pub approved: usize,
    /// Live records whose presence flag is set.
    pub online: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibleRecord {
    pub record: ApplicationRecord,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView {
    pub items: Vec<VisibleRecord>,
    pub counts: Counts,
    /// The page actually shown, after clamping.
    pub page: usize,
    pub total_pages: usize,
    pub query: ViewQuery,
}

impl DerivedView {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

pub fn compute_view(
    records: &[ApplicationRecord],
    presence: &HashMap<String, bool>,
    query: &ViewQuery,
) -> DerivedView {
    let is_online = |id: &str| presence.get(id).copied().unwrap_or(false);

    // Matched verbatim: surrounding spaces are part of the term.
    let term = query.search.to_lowercase();
    let filtered: Vec<&ApplicationRecord> = records
        .iter()
        .filter(|r| query.filter.admits(r))
        .filter(|r| term.is_empty() || r.matches_search(&term))
        .collect();

    let page_size = query.page_size.max(1);
    let total_pages = filtered.len().div_ceil(page_size).max(1);
    let page = query.page.clamp(1, total_pages);

    let items = filtered
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .map(|r| VisibleRecord {
            record: (*r).clone(),
            online: is_online(&r.id),
        })
        .collect();

    let counts = Counts {
        total: records.len(),
        filtered: filtered.len(),
        pending: records.iter().filter(|r| r.is_pending()).count(),
        approved: records.iter().filter(|r| r.is_approved()).count(),
        online: records.iter().filter(|r| is_online(&r.id)).count(),
    };

    DerivedView {
        items,
        counts,
        page,
        total_pages,
        query: ViewQuery {
            page,
            page_size,
            ..query.clone()
        },
    }
}
