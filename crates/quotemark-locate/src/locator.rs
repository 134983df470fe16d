//! Cross-fragment quote locator.
//!
//! Scans pages in ascending order, accumulating fragment text in a sliding
//! buffer. The buffer is tested for the quote after every append, so the
//! first hit is the earliest occurrence on the earliest page. Matches never
//! span a page boundary.
//!
//! ## Buffer bound
//!
//! Once a page's buffer exceeds `TRIM_FACTOR × len(quote)` bytes without a
//! hit, whole fragments are dropped from the front until dropping one more
//! would leave fewer than `len(quote)` bytes. Any occurrence that finishes in
//! a later fragment starts less than `len(quote)` bytes before the end of the
//! buffer, so it is still found.

use std::collections::VecDeque;

use tracing::{debug, instrument, trace};

use quotemark_core::logging::{component, subsystem};
use quotemark_core::defaults::TRIM_FACTOR;
use quotemark_core::{Fragment, Location, PageNumber};

use crate::store::FragmentStore;

/// Find the earliest exact, case-sensitive occurrence of `quote`.
///
/// Visits pages `1..=page_count` that have been indexed; unindexed pages are
/// treated as empty. Returns `None` for the empty quote and when no page
/// contains the quote verbatim.
#[instrument(skip_all, fields(subsystem = subsystem::LOCATE, component = component::LOCATOR, op = "locate", quote_len = quote.len()))]
pub fn locate(quote: &str, store: &FragmentStore, page_count: PageNumber) -> Option<Location> {
    if quote.is_empty() {
        debug!("Empty quote rejected");
        return None;
    }

    for page in store
        .indexed_pages()
        .take_while(|p| p.number <= page_count)
    {
        let mut buffer = SlidingBuffer::new(quote.len());
        for fragment in &page.fragments {
            buffer.push(fragment);
            if let Some(location) = buffer.find(quote, page.number) {
                debug!(
                    page = location.page,
                    first_fragment = location.first_fragment,
                    last_fragment = location.last_fragment,
                    "Quote located"
                );
                return Some(location);
            }
            buffer.trim();
        }
        trace!(
            page = page.number,
            fragment_count = page.fragments.len(),
            "Page exhausted without match"
        );
    }

    debug!("Quote not found");
    None
}

/// Concatenated text of a contiguous run of fragments from one page.
///
/// Invariant: `text` equals the concatenation of `members` texts in order.
pub(crate) struct SlidingBuffer<'a> {
    quote_len: usize,
    text: String,
    members: VecDeque<&'a Fragment>,
}

impl<'a> SlidingBuffer<'a> {
    pub(crate) fn new(quote_len: usize) -> Self {
        Self {
            quote_len,
            text: String::new(),
            members: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, fragment: &'a Fragment) {
        self.text.push_str(&fragment.text);
        self.members.push_back(fragment);
    }

    pub(crate) fn len(&self) -> usize {
        self.text.len()
    }

    pub(crate) fn member_indices(&self) -> Vec<usize> {
        self.members.iter().map(|f| f.index).collect()
    }

    /// Drop leading fragments once the buffer exceeds the trim threshold.
    pub(crate) fn trim(&mut self) {
        if self.text.len() <= TRIM_FACTOR * self.quote_len {
            return;
        }
        let mut dropped = 0;
        while let Some(front) = self.members.front() {
            let front_len = front.text.len();
            if self.text.len() - front_len < self.quote_len {
                break;
            }
            self.text.drain(..front_len);
            self.members.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            trace!(
                dropped,
                buffer_len = self.text.len(),
                retained = self.members.len(),
                "Trimmed sliding buffer"
            );
        }
    }

    /// Locate `quote` in the buffer and map it to the minimal covering
    /// fragment range.
    pub(crate) fn find(&self, quote: &str, page: PageNumber) -> Option<Location> {
        let start = self.text.find(quote)?;
        let end = start + quote.len();

        let mut first = None;
        let mut offset = 0;
        for fragment in &self.members {
            let frag_start = offset;
            let frag_end = offset + fragment.text.len();
            offset = frag_end;

            // Empty fragments never satisfy either bound strictly.
            if first.is_none() && frag_end > start {
                first = Some((fragment.index, start - frag_start));
            }
            if frag_end >= end && frag_end > frag_start {
                let (first_fragment, start_offset) = first?;
                return Some(Location {
                    page,
                    first_fragment,
                    last_fragment: fragment.index,
                    start_offset,
                    end_offset: end - frag_start,
                });
            }
        }
        None
    }
}
