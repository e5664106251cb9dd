pub mod active_selection;
pub mod client;
pub mod collections;
pub mod entity_store;
pub mod reorder;
pub mod scope;
pub mod ticker;
