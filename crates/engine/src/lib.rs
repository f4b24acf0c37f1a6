pub mod binance;
pub mod executor;
pub mod lifecycle;
pub mod status;
pub mod trader;

#[cfg(test)]
mod testing;

pub use binance::{BinanceClient, UserDataStream};
pub use executor::OrderExecutor;
pub use lifecycle::{Engine, EngineCommand, EngineHandle, EngineState};
pub use status::StatusReport;
pub use trader::CrossoverTrader;
