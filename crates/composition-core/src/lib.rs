//! vcompose Core
//!
//! The composition-graph compiler. A [`builder::CompositionBuilder`] walks a
//! [`SourceExpression`](vcompose_model::SourceExpression) depth first:
//!
//! ```text
//! leaf ──► SourceResolver ──► TrackSet
//!                               │
//!                               ├── allocator::allocate   (one destination track per source track)
//!                               ├── inserter::insert      (offset 0 for merge, running cursor for concat)
//!                               ▼
//! merge ──────────────────► instructions::generate_overlay_instructions
//!                               │
//!                               ▼
//!                        CompositionResult
//! ```
//!
//! Building is synchronous and side-effect free apart from the metadata
//! reads a [`engine::MediaEngine`] performs. Export lives elsewhere.

pub mod allocator;
pub mod builder;
pub mod engine;
pub mod inserter;
pub mod instructions;
pub mod memory;
pub mod resolver;

pub use builder::{BuildOptions, CompositionBuilder};
pub use engine::MediaEngine;
pub use memory::InMemoryEngine;
