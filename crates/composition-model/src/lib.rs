//! vcompose Composition Model
//!
//! Defines the data contracts shared by the compiler and the export engine:
//! - **Expressions:** The recursive source tree a client asks to compose
//! - **Tracks:** Typed media streams and the leaf media they were cut from
//! - **Timeline:** The destination composition being assembled
//! - **Instructions:** Overlay layering and background fill for rendering
//! - **Result:** The immutable handoff from the builder to the exporter
//!
//! All times are integer nanoseconds (`MediaTime`) so duration invariants
//! hold exactly.

pub mod expression;
pub mod instruction;
pub mod result;
pub mod timeline;
pub mod track;

pub use expression::*;
pub use instruction::*;
pub use result::*;
pub use timeline::*;
pub use track::*;
