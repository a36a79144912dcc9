//! Data preprocessing module
//!
//! Feature standardization with parameters learned once during fitting and
//! reused, read-only, for every inference call.

mod scaler;

pub use scaler::{ScalerParams, StandardScaler};
