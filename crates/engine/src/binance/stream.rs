use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use url::Url;

use common::{Error, Fill, OpenOrder, OrderEvent, OrderSide, Result, TradingPair};

use super::rest::{parse_decimal, BinanceClient};

const WS_BASE: &str = "wss://stream.binance.com:9443/ws";

/// Binance invalidates a listen key after 60 minutes without a keepalive.
const KEEPALIVE_EVERY: Duration = Duration::from_secs(30 * 60);

/// Binance user-data WebSocket stream for one trading pair.
///
/// Turns `executionReport` messages into `OrderEvent`s and publishes them on
/// the engine's event queue. Reconnects automatically with exponential backoff.
pub struct UserDataStream {
    client: Arc<BinanceClient>,
    pair: TradingPair,
    event_tx: mpsc::Sender<OrderEvent>,
}

impl UserDataStream {
    pub fn new(
        client: Arc<BinanceClient>,
        pair: TradingPair,
        event_tx: mpsc::Sender<OrderEvent>,
    ) -> Self {
        Self {
            client,
            pair,
            event_tx,
        }
    }

    /// Run the stream loop forever, reconnecting on failure.
    /// Call this inside a `tokio::spawn`.
    pub async fn run(self) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            info!(pair = %self.pair, "Connecting to Binance user-data stream");
            let result = self.connect_once().await;
            self.client.stream_flag().store(false, Ordering::SeqCst);

            match result {
                Ok(()) => {
                    info!(pair = %self.pair, "User-data stream closed cleanly");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(pair = %self.pair, error = %e, backoff = ?backoff, "User-data stream error, reconnecting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }

            if self.event_tx.is_closed() {
                warn!("Order event queue closed, stopping user-data stream");
                return;
            }
        }
    }

    async fn connect_once(&self) -> Result<()> {
        let listen_key = self.client.create_listen_key().await?;
        let url = Url::parse(&format!("{WS_BASE}/{listen_key}"))
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        self.client.stream_flag().store(true, Ordering::SeqCst);
        info!(pair = %self.pair, "User-data stream connected");

        let (_, mut read) = ws_stream.split();
        let mut keepalive = tokio::time::interval(KEEPALIVE_EVERY);
        keepalive.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                msg = read.next() => {
                    let Some(msg) = msg else { return Ok(()) };
                    let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

                    if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                        match parse_execution_report(&self.pair, &text) {
                            Ok(Some(event)) => {
                                if self.event_tx.send(event).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Ok(None) => {} // other account events, skip
                            Err(e) => warn!(error = %e, "Failed to parse execution report"),
                        }
                    }
                }
                _ = keepalive.tick() => {
                    if let Err(e) = self.client.keepalive_listen_key(&listen_key).await {
                        warn!(error = %e, "Listen key keepalive failed");
                    }
                }
            }
        }
    }
}

// ─── executionReport JSON parsing ────────────────────────────────────────────

#[derive(Deserialize)]
struct ExecutionReport {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c")]
    client_order_id: String,
    #[serde(rename = "S")]
    side: OrderSide,
    #[serde(rename = "q")]
    quantity: String,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "x")]
    execution_type: String,
    #[serde(rename = "X")]
    order_status: String,
    #[serde(rename = "z")]
    cumulative_qty: String,
    #[serde(rename = "Z")]
    cumulative_quote: String,
    #[serde(rename = "O")]
    created_ms: i64,
    #[serde(rename = "T")]
    transaction_ms: i64,
}

fn millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

/// Map an `executionReport` for `pair` to an order event.
/// New orders become `Created`, fully filled orders become `Filled`.
pub fn parse_execution_report(pair: &TradingPair, text: &str) -> Result<Option<OrderEvent>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if value.get("e").and_then(|v| v.as_str()) != Some("executionReport") {
        return Ok(None);
    }

    let report: ExecutionReport = serde_json::from_value(value)?;
    if report.symbol != pair.symbol() {
        return Ok(None);
    }

    if report.execution_type == "NEW" {
        return Ok(Some(OrderEvent::Created(OpenOrder {
            id: report.client_order_id,
            pair: pair.clone(),
            side: report.side,
            price: parse_decimal("p", &report.price)?,
            quantity: parse_decimal("q", &report.quantity)?,
            created_at: millis(report.created_ms),
        })));
    }

    if report.order_status == "FILLED" {
        let quantity = parse_decimal("z", &report.cumulative_qty)?;
        let quote = parse_decimal("Z", &report.cumulative_quote)?;
        let price = quote.checked_div(quantity).unwrap_or(Decimal::ZERO);
        if price <= Decimal::ZERO {
            return Err(Error::MalformedData(format!(
                "filled order {} without executed quantity",
                report.client_order_id
            )));
        }
        return Ok(Some(OrderEvent::Filled(Fill {
            order_id: report.client_order_id,
            pair: pair.clone(),
            side: report.side,
            price,
            quantity,
            timestamp: millis(report.transaction_ms),
        })));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn report(x: &str, status: &str, z: &str, quote: &str) -> String {
        format!(
            r#"{{"e":"executionReport","E":1499405658658,"s":"ETHUSDT","c":"mac-1","S":"BUY",
                "o":"LIMIT","f":"GTC","q":"2.00000000","p":"100.00000000","C":"","x":"{x}",
                "X":"{status}","r":"NONE","i":4293153,"l":"0","z":"{z}","L":"0","n":"0",
                "N":null,"T":1499405658657,"t":-1,"O":1499405658000,"Z":"{quote}"}}"#
        )
    }

    fn pair() -> TradingPair {
        TradingPair::new("ETH", "USDT")
    }

    #[test]
    fn new_order_becomes_created_event() {
        let event = parse_execution_report(&pair(), &report("NEW", "NEW", "0", "0"))
            .unwrap()
            .unwrap();
        match event {
            OrderEvent::Created(order) => {
                assert_eq!(order.id, "mac-1");
                assert_eq!(order.side, OrderSide::Buy);
                assert_eq!(order.price, dec!(100));
                assert_eq!(order.quantity, dec!(2));
            }
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[test]
    fn filled_order_reports_average_price() {
        let event = parse_execution_report(&pair(), &report("TRADE", "FILLED", "2", "199"))
            .unwrap()
            .unwrap();
        match event {
            OrderEvent::Filled(fill) => {
                assert_eq!(fill.price, dec!(99.5));
                assert_eq!(fill.quantity, dec!(2));
            }
            other => panic!("expected Filled, got {other:?}"),
        }
    }

    #[test]
    fn partial_fills_and_other_symbols_are_skipped() {
        let partial = report("TRADE", "PARTIALLY_FILLED", "1", "100");
        assert!(parse_execution_report(&pair(), &partial).unwrap().is_none());

        let other = TradingPair::new("BTC", "USDT");
        let filled = report("TRADE", "FILLED", "2", "200");
        assert!(parse_execution_report(&other, &filled).unwrap().is_none());

        let balance = r#"{"e":"outboundAccountPosition","E":1,"u":1,"B":[]}"#;
        assert!(parse_execution_report(&pair(), balance).unwrap().is_none());
    }
}
