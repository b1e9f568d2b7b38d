pub mod array;
pub mod broadcast;
pub mod buffer;
pub mod error;
pub mod index;
pub mod layout;
