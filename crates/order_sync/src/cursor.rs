/// Page bookkeeping for the order list.
///
/// `total_pages` is always `max(1, ceil(total_records / page_size))`, and
/// `recompute` clamps `page_number` back into `[1, total_pages]` when the
/// record count shrinks underneath the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page_number: u32,
    page_size: u32,
    total_records: u64,
    total_pages: u32,
}

impl PageCursor {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size: page_size.max(1),
            total_records: 0,
            total_pages: 1,
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn is_first_page(&self) -> bool {
        self.page_number <= 1
    }

    pub fn is_last_page(&self) -> bool {
        self.page_number >= self.total_pages
    }

    /// Returns whether the page changed.
    pub fn next(&mut self) -> bool {
        if self.is_last_page() {
            return false;
        }
        self.page_number += 1;
        true
    }

    /// Returns whether the page changed.
    pub fn prev(&mut self) -> bool {
        if self.is_first_page() {
            return false;
        }
        self.page_number -= 1;
        true
    }

    pub fn reset(&mut self) -> bool {
        let changed = self.page_number != 1;
        self.page_number = 1;
        changed
    }

    /// Positions the cursor on an explicitly requested page. The upper bound
    /// is enforced by the next `recompute`, once the total is known.
    pub fn jump_to(&mut self, page_number: u32) {
        self.page_number = page_number.max(1);
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
        self.total_pages = total_pages_for(self.total_records, self.page_size);
    }

    /// Returns `true` when the current page had to be clamped down.
    pub fn recompute(&mut self, total_records: u64, page_size: u32) -> bool {
        self.total_records = total_records;
        self.page_size = page_size.max(1);
        self.total_pages = total_pages_for(total_records, self.page_size);

        if self.page_number > self.total_pages {
            self.page_number = self.total_pages;
            return true;
        }
        false
    }
}

fn total_pages_for(total_records: u64, page_size: u32) -> u32 {
    let pages = total_records.div_ceil(u64::from(page_size.max(1)));
    u32::try_from(pages.max(1)).unwrap_or(u32::MAX)
}
