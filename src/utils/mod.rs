pub mod json;
pub mod time;
pub mod token;
