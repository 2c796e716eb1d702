//! Pure decision logic, free of I/O, shared by the fast path and the sweep.
mod resolution;

pub use resolution::{deadline_winner, first_qualifying, is_response_overdue};
