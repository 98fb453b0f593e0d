pub mod exchange;
pub mod request;
pub mod result;
