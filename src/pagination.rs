use crate::defaults::DEFAULT_PAGE_SIZE;

/// Offset/limit cursor over a fully loaded list. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: usize,
    per_page: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pager {
    pub fn new(per_page: usize) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// At least one page, even for an empty list.
    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.per_page).max(1)
    }

    /// Rows of the current page. Empty when the cursor is past the end.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.page - 1).saturating_mul(self.per_page).min(items.len());
        let end = start.saturating_add(self.per_page).min(items.len());
        &items[start..end]
    }

    /// Jump to `page`, clamped to `[1, total_pages(len)]`.
    pub fn go_to(&mut self, page: usize, len: usize) {
        self.page = page.clamp(1, self.total_pages(len));
    }

    pub fn next(&mut self, len: usize) {
        self.go_to(self.page + 1, len);
    }

    pub fn prev(&mut self, len: usize) {
        self.go_to(self.page.saturating_sub(1), len);
    }

    /// Pull the cursor back inside the list after it shrank.
    pub fn clamp(&mut self, len: usize) {
        self.go_to(self.page, len);
    }
}

/// The receptionist dashboard's independent cursors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardCursors {
    pub pending_payments: Pager,
    pub validated_payments: Pager,
    pub unpaid_reservations: Pager,
    pub invoices: Pager,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_by_offset_and_limit() {
        let items: Vec<u32> = (1..=12).collect();
        let mut pager = Pager::new(5);
        assert_eq!(pager.slice(&items), &[1, 2, 3, 4, 5]);
        pager.next(items.len());
        assert_eq!(pager.slice(&items), &[6, 7, 8, 9, 10]);
        pager.next(items.len());
        assert_eq!(pager.slice(&items), &[11, 12]);
        // Already on the last page
        pager.next(items.len());
        assert_eq!(pager.page(), 3);
    }

    #[test]
    fn prev_stops_at_first_page() {
        let mut pager = Pager::new(5);
        pager.prev(20);
        assert_eq!(pager.page(), 1);
    }

    #[test]
    fn empty_list_has_one_empty_page() {
        let pager = Pager::new(5);
        let empty: [u8; 0] = [];
        assert_eq!(pager.total_pages(0), 1);
        assert!(pager.slice(&empty).is_empty());
    }

    #[test]
    fn clamp_after_shrink() {
        let mut pager = Pager::new(2);
        pager.go_to(4, 8);
        assert_eq!(pager.page(), 4);
        pager.clamp(3);
        assert_eq!(pager.page(), 2);
    }

    #[test]
    fn cursors_move_independently() {
        let mut cursors = DashboardCursors::default();
        cursors.invoices.next(50);
        assert_eq!(cursors.invoices.page(), 2);
        assert_eq!(cursors.pending_payments.page(), 1);
    }
}
