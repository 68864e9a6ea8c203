pub mod config;
pub mod delegate;
pub mod events;
pub mod observability;
