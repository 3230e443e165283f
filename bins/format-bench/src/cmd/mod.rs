pub mod config;
pub mod dataset;
pub mod error;
pub mod run;
pub mod timer;
pub mod verify;
