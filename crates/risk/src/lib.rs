pub mod budget;
pub mod stop_loss;

pub use budget::BudgetChecker;
pub use stop_loss::{StopLossBreach, StopLossMonitor};
