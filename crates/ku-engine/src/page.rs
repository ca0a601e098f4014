/// Ring of completed text pages plus the page being written.
///
/// Completing a page swaps the current buffer into the oldest ring slot and
/// takes that slot's old `String` as the new current page, so steady-state
/// paging reuses allocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBuffer {
    ring: Vec<String>,
    head: usize,
    filled: usize,
    current: String,
}

impl PageBuffer {
    /// A buffer keeping `capacity` completed pages (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: vec![String::new(); capacity.max(1)],
            head: 0,
            filled: 0,
            current: String::new(),
        }
    }

    /// Completed pages kept.
    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    /// Append drawn text to the current page.
    pub fn push_text(&mut self, text: &str) {
        self.current.push_str(text);
    }

    /// The page being written.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Move the current page into the ring. Empty pages are not kept.
    pub fn complete_page(&mut self) {
        if self.current.is_empty() {
            return;
        }
        std::mem::swap(&mut self.ring[self.head], &mut self.current);
        self.current.clear();
        self.head = (self.head + 1) % self.ring.len();
        self.filled = (self.filled + 1).min(self.ring.len());
    }

    /// Number of completed pages held.
    pub fn completed_len(&self) -> usize {
        self.filled
    }

    /// A completed page counting back from the newest (0).
    pub fn page_back(&self, n: usize) -> Option<&str> {
        if n >= self.filled {
            return None;
        }
        let len = self.ring.len();
        let index = (self.head + len - 1 - n) % len;
        Some(&self.ring[index])
    }

    /// Completed pages, oldest first.
    pub fn completed(&self) -> Vec<String> {
        (0..self.filled)
            .rev()
            .filter_map(|n| self.page_back(n))
            .map(str::to_string)
            .collect()
    }

    /// Drop all text, keeping the capacity.
    pub fn clear(&mut self) {
        for page in &mut self.ring {
            page.clear();
        }
        self.head = 0;
        self.filled = 0;
        self.current.clear();
    }

    /// Rebuild from completed pages (oldest first) and the current page.
    /// Pages beyond the capacity are dropped from the old end.
    pub fn from_pages(capacity: usize, completed: Vec<String>, current: String) -> Self {
        let mut buffer = Self::with_capacity(capacity);
        for page in completed {
            buffer.current = page;
            buffer.complete_page();
        }
        buffer.current = current;
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_and_page_back() {
        let mut pages = PageBuffer::with_capacity(3);
        pages.push_text("one");
        pages.complete_page();
        pages.push_text("two");
        pages.complete_page();
        assert_eq!(pages.completed_len(), 2);
        assert_eq!(pages.page_back(0), Some("two"));
        assert_eq!(pages.page_back(1), Some("one"));
        assert_eq!(pages.page_back(2), None);
        assert_eq!(pages.current(), "");
    }

    #[test]
    fn oldest_page_is_recycled() {
        let mut pages = PageBuffer::with_capacity(2);
        for text in ["a", "b", "c"] {
            pages.push_text(text);
            pages.complete_page();
        }
        assert_eq!(pages.completed_len(), 2);
        assert_eq!(pages.completed(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn empty_page_is_not_completed() {
        let mut pages = PageBuffer::with_capacity(2);
        pages.complete_page();
        assert_eq!(pages.completed_len(), 0);
    }

    #[test]
    fn rebuild_from_pages() {
        let pages = PageBuffer::from_pages(
            2,
            vec!["x".into(), "y".into(), "z".into()],
            "partial".into(),
        );
        assert_eq!(pages.completed(), vec!["y".to_string(), "z".to_string()]);
        assert_eq!(pages.current(), "partial");
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut pages = PageBuffer::with_capacity(4);
        pages.push_text("a");
        pages.complete_page();
        pages.push_text("b");
        pages.clear();
        assert_eq!(pages.completed_len(), 0);
        assert_eq!(pages.current(), "");
        assert_eq!(pages.capacity(), 4);
    }
}
