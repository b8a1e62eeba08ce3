pub mod command;
pub mod connection;
pub mod constants;
pub mod link;
pub mod notifications;
pub mod scanner;
pub mod session;
pub mod types;
