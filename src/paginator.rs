//! Page windows over ordered dish lists.

/// Visible slice of a list plus the position it was cut from
#[derive(Debug, Clone, PartialEq)]
pub struct PageWindow<'a, T> {
    pub items: &'a [T],
    /// 1-based page actually shown after clamping
    pub page: u32,
    pub page_count: u32,
    /// Navigation row; `None` when everything fits on one page
    pub controls: Option<PageControls>,
}

/// The three-control navigation row. `previous`/`next` are `None` at the
/// edges; they are rendered as no-op controls so the row never shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageControls {
    pub previous: Option<u32>,
    pub current: u32,
    pub total: u32,
    pub next: Option<u32>,
}

/// Fixed-size paginator
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: usize,
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// `ceil(total / page_size)`
    pub fn page_count(&self, total: usize) -> u32 {
        total.div_ceil(self.page_size) as u32
    }

    /// Cut the window for `requested`, clamped into `1..=page_count`
    pub fn paginate<'a, T>(&self, items: &'a [T], requested: u32) -> PageWindow<'a, T> {
        let page_count = self.page_count(items.len());
        let page = requested.clamp(1, page_count.max(1));

        let start = (page as usize - 1) * self.page_size;
        let end = (start + self.page_size).min(items.len());
        let items = if start < end { &items[start..end] } else { &items[0..0] };

        let controls = (page_count > 1).then(|| PageControls {
            previous: (page > 1).then(|| page - 1),
            current: page,
            total: page_count,
            next: (page < page_count).then(|| page + 1),
        });

        PageWindow {
            items,
            page,
            page_count,
            controls,
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PAGE_SIZE)
    }
}
