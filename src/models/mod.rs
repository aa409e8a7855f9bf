pub mod activity;
pub mod category;
pub mod checklist;
pub mod location;
pub mod report;
pub mod snapshot;
pub mod tracker;
