pub mod config;
pub mod indicators;
pub mod signal;
pub mod sizing;
pub mod state;

pub use config::{StrategyConfig, StrategyFileConfig, StrategyParams};
pub use signal::{MovingAverageReading, SignalGenerator, SignalPolicy};
pub use sizing::{markup_sell, sell_price, SellQuantityPolicy, DUST_EPSILON};
pub use state::{Readiness, TraderState};
