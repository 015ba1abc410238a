//! Windowed, resumable reads
//!
//! A [`Paginator`] walks a table in `order_by` order, one `LIMIT/OFFSET` window at a
//! time. The optional watermark is a fixed lower bound for the whole walk; only the
//! offset moves between pages.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::normalize::RawRow;

use super::sql::Identifier;

/// One windowed read.
#[derive(Debug, Clone, Copy)]
pub struct WindowQuery<'q> {
    pub table: &'q Identifier,
    pub order_by: &'q Identifier,
    /// Only rows whose `order_by` value sorts after this one.
    pub after: Option<&'q str>,
    pub offset: u64,
    pub limit: u64,
}

pub trait WindowSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Rows of the window in ascending `order_by` order. An empty result ends pagination.
    fn fetch_window(
        &self,
        query: &WindowQuery<'_>,
    ) -> impl Future<Output = Result<Vec<RawRow>, Self::Error>>;
}

/// Child rows of one parent row.
#[derive(Debug, Clone, Copy)]
pub struct RelatedQuery<'q> {
    pub table: &'q Identifier,
    pub foreign_key: &'q Identifier,
    pub order_by: &'q Identifier,
    pub key: &'q str,
}

pub trait RelatedSource: WindowSource {
    fn fetch_related(
        &self,
        query: &RelatedQuery<'_>,
    ) -> impl Future<Output = Result<Vec<RawRow>, Self::Error>>;
}

#[derive(Debug, Clone)]
pub struct Window {
    pub table: Identifier,
    pub order_by: Identifier,
    pub page_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginatorState {
    Idle,
    Fetching,
    HasPage,
    Draining,
    Done,
}

pub struct Paginator<'s, S> {
    source: &'s S,
    window: Window,
    after: Option<String>,
    offset: u64,
    page: VecDeque<RawRow>,
    state: PaginatorState,
    pages: usize,
}

impl<'s, S: WindowSource> Paginator<'s, S> {
    pub fn new(source: &'s S, window: Window, after: Option<String>) -> Self {
        Self {
            source,
            window,
            after,
            offset: 0,
            page: VecDeque::new(),
            state: PaginatorState::Idle,
            pages: 0,
        }
    }

    pub fn state(&self) -> PaginatorState {
        self.state
    }

    /// Number of non-empty pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The next row, or `None` once a window comes back empty. After `Done` the source
    /// is never queried again.
    pub async fn next_row(&mut self) -> Result<Option<RawRow>, S::Error> {
        loop {
            match self.state {
                PaginatorState::Idle => self.state = PaginatorState::Fetching,
                PaginatorState::Fetching => {
                    let query = WindowQuery {
                        table: &self.window.table,
                        order_by: &self.window.order_by,
                        after: self.after.as_deref(),
                        offset: self.offset,
                        limit: self.window.page_size,
                    };
                    let rows = self.source.fetch_window(&query).await?;
                    if rows.is_empty() {
                        debug!(
                            table = self.window.table.as_str(),
                            pages = self.pages,
                            "pagination finished"
                        );
                        self.state = PaginatorState::Done;
                        continue;
                    }
                    trace!(offset = self.offset, rows = rows.len(), "fetched page");
                    self.pages += 1;
                    self.page = rows.into();
                    self.state = PaginatorState::HasPage;
                }
                PaginatorState::HasPage => self.state = PaginatorState::Draining,
                PaginatorState::Draining => {
                    let row = self.page.pop_front();
                    if self.page.is_empty() {
                        self.offset += self.window.page_size;
                        self.state = PaginatorState::Fetching;
                    }
                    if row.is_some() {
                        return Ok(row);
                    }
                }
                PaginatorState::Done => return Ok(None),
            }
        }
    }

    /// Stop early, dropping the buffered page.
    pub fn close(&mut self) {
        self.page.clear();
        self.state = PaginatorState::Done;
    }
}
