pub mod config;
pub mod quiz;
pub mod roster;
pub mod seed;
pub mod storage;
