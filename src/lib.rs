pub mod checksum;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod gate;
pub mod locator;
pub mod marker;
pub mod matcher;
pub mod orchestrator;
pub mod output;
pub mod planner;
pub mod process;
pub mod runner;
pub mod transfer;
