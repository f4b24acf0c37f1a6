pub mod rest;
pub mod stream;

pub use rest::{BinanceClient, BookTicker};
pub use stream::UserDataStream;
