pub mod add;
pub mod config;
pub mod repair;
pub mod status;
pub mod update;
pub mod worker;
