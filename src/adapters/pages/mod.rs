//! Page driver adapters.

pub mod simulated;

pub use simulated::{PageLayout, SimulatedPage, SimulatedPageFactory};
