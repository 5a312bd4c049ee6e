pub mod config_entry;
pub mod currency;
pub mod item;
pub mod page;
pub mod player;
pub mod product;
pub mod shop;
pub mod storage;
pub mod types;
