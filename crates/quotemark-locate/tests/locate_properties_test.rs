//! Property-style checks for the quote locator over many fragmentations.

use quotemark_core::{ExtractedFragment, PageNumber, VisualHandle};
use quotemark_locate::{locate, FragmentStore};

const PAGES: &[&str] = &[
    "Section 1. The tenant shall pay rent on the first day of each month.",
    "Section 2. Late fees apply after the fifth day. The tenant shall notify the landlord.",
    "Section 3. Either party may terminate with thirty days written notice.",
];

/// Split `text` into fragments at deterministic, uneven positions.
fn fragment(text: &str, seed: usize) -> Vec<ExtractedFragment> {
    let mut out = Vec::new();
    let mut rest = text;
    let mut step = seed;
    while !rest.is_empty() {
        step = (step * 7 + 3) % 11;
        let mut cut = (step + 1).min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut += 1;
        }
        let (head, tail) = rest.split_at(cut);
        out.push(ExtractedFragment::new(
            head,
            VisualHandle::new(format!("s{seed}-{}", out.len())),
        ));
        if step % 4 == 0 {
            // Extraction occasionally yields empty spans.
            out.push(ExtractedFragment::new(
                "",
                VisualHandle::new(format!("s{seed}-{}", out.len())),
            ));
        }
        rest = tail;
    }
    out
}

fn build_store(seed: usize) -> FragmentStore {
    let mut store = FragmentStore::new(PAGES.len() as PageNumber);
    // Index in reverse to show indexing order does not matter.
    for (i, text) in PAGES.iter().enumerate().rev() {
        store
            .index_page(i as PageNumber + 1, fragment(text, seed + i))
            .unwrap();
    }
    store
}

/// Recover the matched substring from a location.
fn matched_text(store: &FragmentStore, loc: &quotemark_core::Location) -> String {
    let page = store.page(loc.page).unwrap();
    let covered: String = page.fragments[loc.fragment_range()]
        .iter()
        .map(|f| f.text.as_str())
        .collect();
    let last_len = page.fragments[loc.last_fragment].text.len();
    let tail_cut = covered.len() - (last_len - loc.end_offset);
    covered[loc.start_offset..tail_cut].to_string()
}

#[test]
fn every_substring_is_found_on_its_earliest_page() {
    for seed in 0..5 {
        let store = build_store(seed);
        for (page_idx, text) in PAGES.iter().enumerate() {
            for start in (0..text.len()).step_by(5) {
                for len in [1, 4, 9, 17, 30] {
                    let end = (start + len).min(text.len());
                    let quote = &text[start..end];
                    let loc = locate(quote, &store, PAGES.len() as PageNumber)
                        .unwrap_or_else(|| panic!("seed {seed}: {quote:?} not found"));

                    let earliest_page = PAGES.iter().position(|p| p.contains(quote)).unwrap();
                    assert!(earliest_page <= page_idx);
                    assert_eq!(loc.page as usize, earliest_page + 1);
                    assert_eq!(matched_text(&store, &loc), quote);
                    assert_eq!(
                        PAGES[earliest_page].find(quote),
                        Some(char_offset_of(&store, &loc))
                    );
                }
            }
        }
    }
}

/// Byte offset of the match from the start of its page.
fn char_offset_of(store: &FragmentStore, loc: &quotemark_core::Location) -> usize {
    let page = store.page(loc.page).unwrap();
    let before: usize = page.fragments[..loc.first_fragment]
        .iter()
        .map(|f| f.text.len())
        .sum();
    before + loc.start_offset
}

#[test]
fn range_is_minimal() {
    let store = build_store(2);
    let quote = "tenant shall notify";
    let loc = locate(quote, &store, 3).unwrap();
    let page = store.page(loc.page).unwrap();

    assert!(!page.fragments[loc.first_fragment].text.is_empty());
    assert!(!page.fragments[loc.last_fragment].text.is_empty());
    assert!(loc.start_offset < page.fragments[loc.first_fragment].text.len());
    assert!(loc.end_offset > 0);
}

#[test]
fn seams_between_pages_never_match() {
    for seed in 0..5 {
        let store = build_store(seed);
        for pair in PAGES.windows(2) {
            let tail = &pair[0][pair[0].len() - 8..];
            let head = &pair[1][..8];
            let seam = format!("{tail}{head}");
            assert!(locate(&seam, &store, 3).is_none(), "seam {seam:?} matched");
        }
    }
}

#[test]
fn repeated_calls_are_identical() {
    let store = build_store(1);
    let first = locate("The tenant shall", &store, 3);
    for _ in 0..3 {
        assert_eq!(locate("The tenant shall", &store, 3), first);
    }
}

#[test]
fn absent_and_case_variant_quotes_return_none() {
    let store = build_store(0);
    assert!(locate("the Tenant Shall", &store, 3).is_none());
    assert!(locate("sixty days", &store, 3).is_none());
    assert!(locate("", &store, 3).is_none());
}
