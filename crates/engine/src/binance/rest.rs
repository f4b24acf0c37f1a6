use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use common::{
    AssetBalance, Balances, CandleInterval, Error, ExchangeClient, OpenOrder, OrderRequest,
    OrderSide, PriceHistory, Result, TradingPair,
};

const BASE_URL: &str = "https://api.binance.com";

/// Binance caps a single klines request at this many candles.
const MAX_KLINES: usize = 1000;

/// Decimal places sent for prices and quantities.
const WIRE_DP: u32 = 8;

/// REST API client for Binance spot. Used for order placement, account
/// queries and public market data.
pub struct BinanceClient {
    api_key: String,
    secret: String,
    http: Client,
    /// Set by the user-data stream while its WebSocket is connected.
    stream_connected: Arc<AtomicBool>,
}

/// Top of book for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookTicker {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl BinanceClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            http,
            stream_connected: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Client without credentials, limited to public market data.
    pub fn public() -> Result<Self> {
        Self::new("", "")
    }

    pub fn stream_flag(&self) -> Arc<AtomicBool> {
        self.stream_connected.clone()
    }

    fn sign(&self, query: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Config(format!("invalid Binance secret: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn signed(&self, method: Method, path: &str, params: &str) -> Result<String> {
        let ts = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = self.sign(&query)?;
        let url = format!("{BASE_URL}{path}?{query}&signature={signature}");
        self.send(self.http.request(method, &url).header("X-MBX-APIKEY", &self.api_key))
            .await
    }

    async fn public_get(&self, path: &str, query: &str) -> Result<String> {
        let url = format!("{BASE_URL}{path}?{query}");
        self.send(self.http.get(&url)).await
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<String> {
        let resp = req.send().await.map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    pub async fn book_ticker(&self, pair: &TradingPair) -> Result<BookTicker> {
        let body = self
            .public_get("/api/v3/ticker/bookTicker", &format!("symbol={}", pair.symbol()))
            .await?;
        let ticker: BookTickerResponse = serde_json::from_str(&body)?;
        Ok(BookTicker {
            bid: parse_decimal("bidPrice", &ticker.bid_price)?,
            ask: parse_decimal("askPrice", &ticker.ask_price)?,
        })
    }

    /// Open a user-data stream and return its listen key.
    pub async fn create_listen_key(&self) -> Result<String> {
        let url = format!("{BASE_URL}/api/v3/userDataStream");
        let body = self
            .send(self.http.post(&url).header("X-MBX-APIKEY", &self.api_key))
            .await?;
        let resp: ListenKeyResponse = serde_json::from_str(&body)?;
        Ok(resp.listen_key)
    }

    pub async fn keepalive_listen_key(&self, listen_key: &str) -> Result<()> {
        let url = format!("{BASE_URL}/api/v3/userDataStream?listenKey={listen_key}");
        self.send(self.http.put(&url).header("X-MBX-APIKEY", &self.api_key))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    async fn ready(&self) -> bool {
        self.stream_connected.load(Ordering::SeqCst)
            && self.public_get("/api/v3/ping", "").await.is_ok()
    }

    async fn current_price(&self, pair: &TradingPair, is_buy: bool) -> Result<Decimal> {
        let book = self.book_ticker(pair).await?;
        Ok(if is_buy { book.ask } else { book.bid })
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<String> {
        let params = format!(
            "symbol={}&side={}&type={}&timeInForce=GTC&quantity={}&price={}&newClientOrderId={}",
            order.pair.symbol(),
            order.side,
            order.order_type,
            wire(order.quantity),
            wire(order.price),
            order.client_order_id,
        );

        debug!(pair = %order.pair, side = %order.side, "Submitting order to Binance");
        let body = self
            .signed(Method::POST, "/api/v3/order", &params)
            .await
            .map_err(|e| match e {
                Error::Exchange(msg) => Error::OrderRejected(msg),
                other => other,
            })?;

        let resp: OrderResponse = serde_json::from_str(&body)?;
        Ok(resp.client_order_id)
    }

    async fn cancel_order(&self, pair: &TradingPair, order_id: &str) -> Result<()> {
        let params = format!("symbol={}&origClientOrderId={order_id}", pair.symbol());
        self.signed(Method::DELETE, "/api/v3/order", &params).await?;
        Ok(())
    }

    async fn open_orders(&self, pair: &TradingPair) -> Result<Vec<OpenOrder>> {
        let body = self
            .signed(Method::GET, "/api/v3/openOrders", &format!("symbol={}", pair.symbol()))
            .await?;
        let orders: Vec<OpenOrderResponse> = serde_json::from_str(&body)?;

        orders
            .into_iter()
            .map(|o| {
                let orig = parse_decimal("origQty", &o.orig_qty)?;
                let executed = parse_decimal("executedQty", &o.executed_qty)?;
                Ok(OpenOrder {
                    id: o.client_order_id,
                    pair: pair.clone(),
                    side: o.side,
                    price: parse_decimal("price", &o.price)?,
                    quantity: orig - executed,
                    created_at: Utc
                        .timestamp_millis_opt(o.time)
                        .single()
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect()
    }

    async fn balances(&self, pair: &TradingPair) -> Result<Balances> {
        let body = self.signed(Method::GET, "/api/v3/account", "").await?;
        let account: AccountResponse = serde_json::from_str(&body)?;

        let find = |asset: &str| -> Result<AssetBalance> {
            match account.balances.iter().find(|b| b.asset == asset) {
                Some(b) => {
                    let free = parse_decimal("free", &b.free)?;
                    let locked = parse_decimal("locked", &b.locked)?;
                    Ok(AssetBalance::new(asset, free + locked, free))
                }
                None => Ok(AssetBalance::new(asset, Decimal::ZERO, Decimal::ZERO)),
            }
        };

        Ok(Balances {
            base: find(pair.base())?,
            quote: find(pair.quote())?,
        })
    }
}

#[async_trait]
impl PriceHistory for BinanceClient {
    async fn fetch_closes(
        &self,
        pair: &TradingPair,
        interval: CandleInterval,
        limit: usize,
    ) -> Result<Vec<Decimal>> {
        let query = format!(
            "symbol={}&interval={}&limit={}",
            pair.symbol(),
            interval,
            limit.min(MAX_KLINES)
        );
        let body = self.public_get("/api/v3/klines", &query).await?;
        parse_closes(&body)
    }
}

/// Extract the close (index 4, a decimal string) of every kline record.
pub fn parse_closes(body: &str) -> Result<Vec<Decimal>> {
    let records: Vec<Vec<serde_json::Value>> = serde_json::from_str(body)?;
    records
        .iter()
        .map(|record| {
            let close = record
                .get(4)
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::MalformedData(format!("kline without close: {record:?}")))?;
            parse_decimal("close", close)
        })
        .collect()
}

pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|e| Error::MalformedData(format!("{field} '{raw}': {e}")))
}

fn wire(value: Decimal) -> Decimal {
    value.round_dp(WIRE_DP).normalize()
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    client_order_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenOrderResponse {
    client_order_id: String,
    price: String,
    orig_qty: String,
    executed_qty: String,
    side: OrderSide,
    time: i64,
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceResponse>,
}

#[derive(Deserialize)]
struct BalanceResponse {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookTickerResponse {
    bid_price: String,
    ask_price: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListenKeyResponse {
    listen_key: String,
}
