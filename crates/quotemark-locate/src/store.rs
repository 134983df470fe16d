//! Per-page fragment store.
//!
//! Pages arrive as they finish rendering, in no particular order. Each call
//! to [`FragmentStore::index_page`] atomically replaces that page's fragment
//! list; fragments themselves are never edited in place.

use std::collections::BTreeMap;

use tracing::debug;

use quotemark_core::defaults::PAGE_SEPARATOR;
use quotemark_core::logging::{component, subsystem};
use quotemark_core::{
    Error, ExtractedFragment, Location, Page, PageNumber, Readiness, Result, VisualHandle,
};

/// Indexed fragments of the currently loaded document.
#[derive(Debug, Clone, Default)]
pub struct FragmentStore {
    page_count: PageNumber,
    pages: BTreeMap<PageNumber, Page>,
}

impl FragmentStore {
    /// Create an empty store for a document with `page_count` pages.
    pub fn new(page_count: PageNumber) -> Self {
        Self {
            page_count,
            pages: BTreeMap::new(),
        }
    }

    pub fn page_count(&self) -> PageNumber {
        self.page_count
    }

    fn check_range(&self, page: PageNumber) -> Result<()> {
        if page == 0 || page > self.page_count {
            return Err(Error::PageOutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(())
    }

    /// Replace the fragment list of `page` and mark it ready.
    pub fn index_page(
        &mut self,
        page: PageNumber,
        fragments: Vec<ExtractedFragment>,
    ) -> Result<&Page> {
        self.check_range(page)?;
        let indexed = Page::from_extracted(page, fragments);
        debug!(
            subsystem = subsystem::LOCATE,
            component = component::STORE,
            page,
            fragment_count = indexed.fragments.len(),
            replaced = self.pages.contains_key(&page),
            "Indexed page"
        );
        self.pages.insert(page, indexed);
        Ok(&self.pages[&page])
    }

    /// Mark an indexed page as not ready while it is being re-rendered.
    ///
    /// Its fragments stay searchable. Returns `false` if the page was never
    /// indexed.
    pub fn invalidate_page(&mut self, page: PageNumber) -> Result<bool> {
        self.check_range(page)?;
        match self.pages.get_mut(&page) {
            Some(p) => {
                p.readiness = Readiness::NotReady;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current fragments of `page`, or `None` if not yet indexed.
    pub fn page(&self, page: PageNumber) -> Option<&Page> {
        self.pages.get(&page)
    }

    pub fn readiness(&self, page: PageNumber) -> Readiness {
        self.pages
            .get(&page)
            .map(|p| p.readiness)
            .unwrap_or_default()
    }

    /// Indexed pages in ascending page order.
    pub fn indexed_pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn indexed_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_text(&self, page: PageNumber) -> Option<String> {
        self.pages.get(&page).map(Page::text)
    }

    /// Flattened text of all indexed pages, in page order.
    pub fn document_text(&self) -> String {
        self.pages
            .values()
            .map(Page::text)
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR)
    }

    /// Visual handles of the fragments covered by `location`.
    pub fn handles(&self, location: &Location) -> Option<Vec<VisualHandle>> {
        let page = self.pages.get(&location.page)?;
        page.fragments
            .get(location.fragment_range())
            .map(|frags| frags.iter().map(|f| f.handle.clone()).collect())
    }

    /// Text that `location` covers in the current fragment list.
    ///
    /// `None` when the range or offsets no longer fit the page, e.g. after
    /// it was re-indexed with fewer or shorter fragments.
    pub fn covered_text(&self, location: &Location) -> Option<String> {
        let page = self.pages.get(&location.page)?;
        let frags = page.fragments.get(location.fragment_range())?;
        let joined: String = frags.iter().map(|f| f.text.as_str()).collect();
        let last_start = joined.len() - frags.last()?.text.len();
        joined
            .get(location.start_offset..last_start + location.end_offset)
            .map(str::to_string)
    }
}
