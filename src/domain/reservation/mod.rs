pub mod time_window;
pub mod token;
pub mod token_collection;
