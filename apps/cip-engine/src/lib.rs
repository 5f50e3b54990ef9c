pub mod config;
pub mod detect;
pub mod error;
pub mod provider;
pub mod run;
pub mod score;
pub mod series;
