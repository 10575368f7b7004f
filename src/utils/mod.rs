pub mod clock;
pub mod config;
pub mod db;
pub mod http_client;
pub mod validators;
