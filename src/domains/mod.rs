pub mod reminder;
pub mod send;
