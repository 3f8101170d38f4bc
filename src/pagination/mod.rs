use serde::Serialize;

pub const DEFAULT_MAX_VISIBLE: u32 = 5;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PaginationWindow {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub visible_pages: Vec<u32>,
    pub show_leading_ellipsis: bool,
    pub show_trailing_ellipsis: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageControl {
    Previous { enabled: bool },
    Page { number: u32, current: bool },
    Ellipsis,
    Next { enabled: bool },
}

impl PaginationWindow {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.visible_pages.is_empty()
    }

    pub fn shows_first_page(&self) -> bool {
        self.visible_pages.first().is_some_and(|start| *start > 1)
    }

    pub fn shows_last_page(&self) -> bool {
        self.visible_pages
            .last()
            .is_some_and(|end| *end < self.total_pages)
    }

    pub fn controls(&self) -> Vec<PageControl> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut out = vec![PageControl::Previous {
            enabled: self.has_previous,
        }];
        if self.shows_first_page() {
            out.push(PageControl::Page {
                number: 1,
                current: self.current_page == 1,
            });
            if self.show_leading_ellipsis {
                out.push(PageControl::Ellipsis);
            }
        }
        for number in self.visible_pages.iter().copied() {
            out.push(PageControl::Page {
                number,
                current: number == self.current_page,
            });
        }
        if self.shows_last_page() {
            if self.show_trailing_ellipsis {
                out.push(PageControl::Ellipsis);
            }
            out.push(PageControl::Page {
                number: self.total_pages,
                current: self.current_page == self.total_pages,
            });
        }
        out.push(PageControl::Next {
            enabled: self.has_next,
        });
        out
    }
}

pub fn total_pages(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

pub fn item_range(page: u32, page_size: u32, total_items: u64) -> (u64, u64) {
    if total_items == 0 || page_size == 0 {
        return (0, 0);
    }
    let page = u64::from(page.max(1));
    let size = u64::from(page_size);
    let start = (page - 1) * size + 1;
    let end = (start + size - 1).min(total_items);
    (start.min(total_items), end)
}

pub fn compute_window(current_page: u32, total_pages: u32, max_visible: u32) -> PaginationWindow {
    if total_pages <= 1 {
        return PaginationWindow {
            current_page: current_page.max(1),
            total_pages,
            ..PaginationWindow::default()
        };
    }
    let max_visible = max_visible.max(1);
    let current = current_page.clamp(1, total_pages);

    let (start, end) = if total_pages <= max_visible {
        (1, total_pages)
    } else {
        let before = max_visible / 2;
        let after = max_visible.div_ceil(2) - 1;
        if current <= before {
            (1, max_visible)
        } else if current + after >= total_pages {
            (total_pages - max_visible + 1, total_pages)
        } else {
            (current - before, current + after)
        }
    };

    PaginationWindow {
        current_page: current,
        total_pages,
        has_previous: current > 1,
        has_next: current < total_pages,
        visible_pages: (start..=end).collect(),
        show_leading_ellipsis: start > 2,
        show_trailing_ellipsis: end + 1 < total_pages,
    }
}
