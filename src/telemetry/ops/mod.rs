pub mod browse;
pub mod catalog;
pub mod admin;
pub mod watch;
