pub mod hostname;
pub mod retry;
