pub mod core;
pub mod exams;
pub mod marks;
pub mod reports;
pub mod results;
pub mod roster;
pub mod setup;
