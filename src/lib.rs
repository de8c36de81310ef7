// Autoreact: automated likes and recasts for Farcaster monitoring lists
//
// This is the library root. Each module corresponds to a major subsystem
// of the interaction engine.

pub mod config;
pub mod db;
pub mod farcaster;
pub mod filter;
pub mod keys;
pub mod output;
pub mod pipeline;
pub mod status;
