pub mod backoff;
pub mod error;
pub mod observer;
pub mod parser;
pub mod types;
