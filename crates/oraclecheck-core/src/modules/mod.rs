pub mod catalog;
pub mod checker;
pub mod comparator;
pub mod report;
pub mod runner;
pub mod store;
