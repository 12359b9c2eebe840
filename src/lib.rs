//! Smart Ape: AI DeFi agent trading on Uniswap V3 (Base Sepolia).

pub mod agent;
pub mod api;
pub mod chain;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod monitor;
pub mod safety;
pub mod store;
pub mod tools;
pub mod trading;
pub mod wallet;
