use serde::{Deserialize, Serialize};

/// Continuation state for a bounded, resumable sales-history crawl.
///
/// Invariant: `current_page <= last_page + 1` once pagination has been read.
/// `is_scrape_finished` only reverts through [`TaskSchedule::resume_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSchedule {
    pub current_page: u32,
    pub last_page: u32,
    pub is_pagination_scraped: bool,
    pub is_scrape_finished: bool,
    /// Item budget for one invocation; `0` means unbounded.
    pub update_sold_items: u32,
}

impl Default for TaskSchedule {
    fn default() -> Self {
        Self {
            current_page: 1,
            last_page: 0,
            is_pagination_scraped: false,
            is_scrape_finished: false,
            update_sold_items: 0,
        }
    }
}

impl TaskSchedule {
    #[must_use]
    pub fn with_budget(update_sold_items: u32) -> Self {
        Self {
            update_sold_items,
            ..Self::default()
        }
    }

    /// Records the pagination bounds read from the first page. Only the first
    /// call has any effect.
    pub fn record_pagination(&mut self, last_page: u32) {
        if self.is_pagination_scraped {
            return;
        }
        self.is_pagination_scraped = true;
        self.last_page = last_page.max(1);
        self.current_page = 2;
        if self.last_page == 1 {
            self.is_scrape_finished = true;
        }
    }

    /// Number of pages one invocation may enqueue.
    ///
    /// `min(max_page_limit, ceil(budget / items_per_page) + 1)`, or
    /// `max_page_limit` for an unbounded budget.
    #[must_use]
    pub fn window_len(&self, max_page_limit: u32, items_per_page: u32) -> u32 {
        if self.update_sold_items == 0 || items_per_page == 0 {
            return max_page_limit;
        }
        let pages = self.update_sold_items.div_ceil(items_per_page) + 1;
        pages.min(max_page_limit)
    }

    /// Claims up to `len` page numbers starting at `current_page`, advancing
    /// `current_page` past each one. Reaching `last_page` marks the crawl
    /// finished.
    pub fn next_window(&mut self, len: u32) -> Vec<u32> {
        let mut pages = Vec::new();
        if self.is_scrape_finished {
            return pages;
        }
        while u32::try_from(pages.len()).unwrap_or(u32::MAX) < len
            && self.current_page <= self.last_page
        {
            pages.push(self.current_page);
            if self.current_page == self.last_page {
                self.is_scrape_finished = true;
            }
            self.current_page += 1;
        }
        pages
    }

    /// Rewinds to `page` after a stalled or failed page so the next
    /// invocation starts there.
    pub fn resume_at(&mut self, page: u32) {
        let page = page.max(1);
        self.current_page = if self.is_pagination_scraped {
            page.min(self.last_page + 1)
        } else {
            page
        };
        self.is_scrape_finished = false;
    }

    pub fn finish(&mut self) {
        self.is_scrape_finished = true;
    }
}

/// Lifecycle of a persisted sales-history continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationStatus {
    Pending,
    Finished,
    /// Gave up after too many resumptions without finishing.
    Abandoned,
}

impl ContinuationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Finished => "finished",
            Self::Abandoned => "abandoned",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "finished" => Some(Self::Finished),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}
