//! # quotemark-locate
//!
//! Page-fragment indexing and exact quote location for quotemark.
//!
//! This crate provides:
//! - [`FragmentStore`]: per-page ordered fragment lists, indexed in any order
//! - [`locate`]: first-match search for a quote across fragment boundaries
//!   using a sliding buffer bounded by the quote length
//!
//! ## Example
//!
//! ```
//! use quotemark_core::{ExtractedFragment, VisualHandle};
//! use quotemark_locate::{locate, FragmentStore};
//!
//! let mut store = FragmentStore::new(1);
//! let fragments = ["Hello ", "world", ", foo"]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, t)| ExtractedFragment::new(*t, VisualHandle::new(format!("span-{i}"))))
//!     .collect();
//! store.index_page(1, fragments).unwrap();
//!
//! let location = locate("world, foo", &store, store.page_count()).unwrap();
//! assert_eq!(location.fragment_range(), 1..=2);
//! ```

pub mod locator;
pub mod store;

pub use locator::locate;
pub use store::FragmentStore;
