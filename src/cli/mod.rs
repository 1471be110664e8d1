pub mod breakdown;
pub mod history;
pub mod summary;
pub mod ui;
