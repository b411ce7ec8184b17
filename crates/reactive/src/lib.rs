//! Ripple Reactive - materialized views over incremental pipelines.
//!
//! # Core Concepts
//!
//! - [`ArrayView`]: hydrates a pipeline once, then keeps a sorted tree of
//!   entries up to date as changes are pushed into it
//! - [`Format`]: list or singular shape per relationship level
//! - [`apply_change`]: the change application algorithm, usable on its own
//! - [`SubscriptionManager`]: listeners notified at flush boundaries
//!
//! # Example
//!
//! ```
//! use ripple_core::{row, DataType, SortOrder, TableSchema};
//! use ripple_incremental::{MemorySource, SourceChange};
//! use ripple_reactive::{ArrayView, Format};
//!
//! let source = MemorySource::new(
//!     TableSchema::new("issue")
//!         .column("id", DataType::Int64)
//!         .primary_key(&["id"])
//!         .unwrap(),
//! );
//! let view = ArrayView::new(
//!     source.connect(SortOrder::ascending(&["id"]), None).unwrap(),
//!     Format::list(),
//! );
//! view.hydrate().unwrap();
//!
//! source.push(SourceChange::Add(row! { "id" => 1 })).unwrap();
//! view.flush();
//! assert_eq!(view.data().len(), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod apply;
pub mod subscription;
pub mod view;

pub use apply::apply_change;
pub use subscription::{Listener, SubscriptionId, SubscriptionManager};
pub use view::{ArrayView, Entry, Format, View};
