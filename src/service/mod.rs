pub mod aggregator;
pub mod directory;
pub mod query;
pub mod trending;
pub mod view_store;
pub mod visibility;
