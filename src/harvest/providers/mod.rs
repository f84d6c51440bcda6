pub mod discord;
pub mod memory;
