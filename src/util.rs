pub mod paging;
pub mod random;
