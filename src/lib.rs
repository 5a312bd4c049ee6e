pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod registry;
pub mod services;
pub mod stacking;
pub mod util;

pub use registry::Registry;
