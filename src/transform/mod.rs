//! The three F(6,3) domain transforms.
//!
//! All three agree on one coefficient order: index `u * 8 + v`, with `u`
//! the horizontal and `v` the vertical frequency of the 8×8 tile.

pub mod filter;
pub mod input;
pub mod output;

pub use filter::{TransformedFilter, transform_filter, transform_tap};
pub use input::transform_input;
pub use output::transform_output;
