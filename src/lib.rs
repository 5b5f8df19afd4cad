//! Common functionality for the portfolio capacity expansion and dispatch model.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod finance;
pub mod formulation;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod optimisation;
pub mod output;
pub mod policy;
pub mod project;
pub mod settings;
pub mod simulation;
pub mod timescale;
pub mod units;
pub mod zone;

#[cfg(test)]
mod fixture;

/// Get the directory where program settings are stored.
///
/// Falls back on a relative path if the platform has no user config directory.
pub fn get_portfolio_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("portfolio");

    path
}
