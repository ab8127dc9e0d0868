//! Tabular renderer with a free-text row filter.
//!
//! The renderer owns a fixed column schema, a shared handle to the input
//! rows and the current filter. The visible row set is a mapping from view
//! position to input index and is derived again whenever the filter or the
//! input rows change. Input rows are never modified.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::column::ColumnDef;
use crate::domain::TVError;
use crate::record::{self, Row};

/// A non-empty filter string together with its lower-cased form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    text: String,
    needle: String,
}

impl FilterQuery {
    /// Returns `None` for the empty string, which means "no filter".
    pub fn new(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        Some(FilterQuery {
            text: text.to_string(),
            needle: text.to_lowercase(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Case-insensitive substring test.
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.to_lowercase().contains(&self.needle)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FilterState {
    #[default]
    Unfiltered,
    Filtered(FilterQuery),
}

impl FilterState {
    pub fn from_text(text: &str) -> Self {
        match FilterQuery::new(text) {
            Some(query) => FilterState::Filtered(query),
            None => FilterState::Unfiltered,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            FilterState::Unfiltered => "",
            FilterState::Filtered(query) => query.text(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, FilterState::Filtered(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub index: usize, // Index into the input rows
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTable {
    pub headers: Vec<String>,
    pub rows: Vec<RenderedRow>,
}

pub struct TableRenderer {
    rows: Arc<Vec<Row>>,
    columns: Arc<[ColumnDef]>,
    filter: FilterState,
    visible: Arc<Vec<usize>>, // Mapping of view position to input row index
}

impl TableRenderer {
    pub fn new(rows: Arc<Vec<Row>>, columns: Vec<ColumnDef>) -> Result<Self, TVError> {
        if columns.is_empty() {
            return Err(TVError::EmptySchema);
        }
        let visible = Arc::new((0..rows.len()).collect());
        debug!(
            "New table renderer with {} rows and {} columns",
            rows.len(),
            columns.len()
        );
        Ok(TableRenderer {
            rows,
            columns: columns.into(),
            filter: FilterState::Unfiltered,
            visible,
        })
    }

    pub fn set_filter(&mut self, text: &str) {
        let filter = FilterState::from_text(text);
        if filter == self.filter {
            return;
        }
        self.filter = filter;
        self.recompute();
    }

    /// Replace the input rows, e.g. after a refetch. The active filter is kept
    /// and applied to the new rows right away.
    pub fn set_rows(&mut self, rows: Arc<Vec<Row>>) {
        self.rows = rows;
        self.recompute();
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn rows(&self) -> &Arc<Vec<Row>> {
        &self.rows
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header_text()).collect()
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    #[cfg(test)]
    pub fn visible_indices(&self) -> Arc<Vec<usize>> {
        Arc::clone(&self.visible)
    }

    pub fn visible_row(&self, position: usize) -> Option<&Row> {
        self.visible.get(position).map(|&idx| &self.rows[idx])
    }

    #[cfg(test)]
    pub fn visible_rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.visible.iter().map(|&idx| &self.rows[idx])
    }

    /// Text of a single cell of the visible set.
    pub fn cell(&self, position: usize, column: usize) -> Option<String> {
        let row = self.visible_row(position)?;
        let column = self.columns.get(column)?;
        Some(record::cell_text(record::lookup(row, column.key())))
    }

    #[cfg(test)]
    pub fn render(&self) -> RenderedTable {
        self.render_window(0, self.visible.len())
    }

    /// Render `len` visible rows starting at view position `offset`.
    pub fn render_window(&self, offset: usize, len: usize) -> RenderedTable {
        let begin = std::cmp::min(offset, self.visible.len());
        let end = std::cmp::min(begin.saturating_add(len), self.visible.len());
        let rows = self.visible[begin..end]
            .iter()
            .map(|&idx| RenderedRow {
                index: idx,
                cells: self.render_cells(&self.rows[idx]),
            })
            .collect();
        RenderedTable {
            headers: self.headers(),
            rows,
        }
    }

    fn render_cells(&self, row: &Row) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| record::cell_text(record::lookup(row, c.key())))
            .collect()
    }

    fn recompute(&mut self) {
        let query = match &self.filter {
            FilterState::Unfiltered => {
                self.visible = Arc::new((0..self.rows.len()).collect());
                return;
            }
            FilterState::Filtered(query) => query,
        };

        let start_time = Instant::now();
        let mut searched: Vec<&ColumnDef> =
            self.columns.iter().filter(|c| c.is_filterable()).collect();
        if searched.is_empty() {
            // Without any filterable column every column of the schema is tested
            searched = self.columns.iter().collect();
        }

        // Indexed parallel filter keeps the input order on collect
        let visible: Vec<usize> = self
            .rows
            .par_iter()
            .enumerate()
            .filter(|(_, row)| Self::row_matches(row, &searched, query))
            .map(|(idx, _)| idx)
            .collect();

        trace!(
            "Filter \"{}\" kept {}/{} rows in {}us",
            query.text(),
            visible.len(),
            self.rows.len(),
            start_time.elapsed().as_micros()
        );
        self.visible = Arc::new(visible);
    }

    fn row_matches(row: &Row, searched: &[&ColumnDef], query: &FilterQuery) -> bool {
        searched.iter().any(|column| {
            let Some(value) = record::lookup(row, column.key()) else {
                return false;
            };
            let text = match column.custom_stringifier() {
                Some(stringifier) => Some(stringifier.apply(value)),
                None => record::filter_text(value),
            };
            text.is_some_and(|t| query.matches(&t))
        })
    }
}
