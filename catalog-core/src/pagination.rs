//! Offset pagination shared by store listings.

use futures::FutureExt;
use futures::future::Either;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::{CatalogError, Result};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized 1-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Missing or zero values fall back to the defaults; the page size is
    /// capped at [`MAX_PAGE_SIZE`].
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE);
        let page_size = page_size
            .filter(|s| *s >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Self { page, page_size }
    }

    pub fn limit(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page_size) * u64::from(self.page.saturating_sub(1))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMetadata {
    pub page: u32,
    pub page_size: u32,
    pub item_count: u64,
    pub page_count: u64,
}

pub fn calculate_pagination(page: u32, page_size: u32, item_count: u64) -> PaginationMetadata {
    PaginationMetadata {
        page,
        page_size,
        item_count,
        page_count: crate::search::page_count(item_count, page_size),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMetadata,
}

impl<T> Paginated<T> {
    pub fn new(request: PageRequest, item_count: u64, data: Vec<T>) -> Self {
        Self {
            data,
            pagination: calculate_pagination(request.page, request.page_size, item_count),
        }
    }
}

enum Part<T> {
    Count(u64),
    Page(Vec<T>),
}

/// Runs `count` and `page` concurrently and waits for both.
///
/// If either fails, the error that arrived first is returned and the other
/// result is discarded.
pub async fn fetch_paginated<T, C, P>(count: C, page: P) -> Result<(u64, Vec<T>)>
where
    C: Future<Output = Result<u64>>,
    P: Future<Output = Result<Vec<T>>>,
{
    let mut pending = FuturesUnordered::new();
    pending.push(Either::Left(count.map(|r| r.map(Part::Count))));
    pending.push(Either::Right(page.map(|r| r.map(Part::Page))));

    let mut first_error = None;
    let mut total = None;
    let mut items = None;
    while let Some(result) = pending.next().await {
        match result {
            Ok(Part::Count(n)) => total = Some(n),
            Ok(Part::Page(rows)) => items = Some(rows),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }
    match (total, items) {
        (Some(total), Some(items)) => Ok((total, items)),
        _ => Err(CatalogError::Internal("pagination fetch incomplete".into())),
    }
}
