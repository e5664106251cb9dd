pub mod models;
pub mod time_of_day;
pub mod timeline;
