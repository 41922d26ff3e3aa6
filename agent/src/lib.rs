pub mod config;
pub mod connection;
pub mod cycle;
pub mod logging;
pub mod normalize;
pub mod nut;
pub mod power;
pub mod publish;
pub mod record;
pub mod runner;
#[cfg(test)]
mod testing;
