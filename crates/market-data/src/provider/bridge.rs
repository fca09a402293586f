//! Line-bridge provider
//!
//! Talks to a gateway bridge over TCP using newline-delimited JSON. Requests
//! are `ProviderRequest`s serialized one per line; the bridge answers with
//! the gateway's native callbacks, which are translated into
//! `ProviderEvent`s here. Callbacks the engine does not use are discarded.

use common::RequestId;
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::{EventSender, MarketDataProvider, ProviderEvent, ProviderRequest};
use crate::error::MarketDataError;
use crate::types::{Bar, Contract, ContractMetadata, HistoricalQuery, TickField};
use crate::Result;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
    pub connect_timeout: Duration,
}

impl BridgeConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeBar {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Callbacks as the bridge forwards them
#[derive(Debug, Deserialize)]
#[serde(tag = "callback", rename_all = "camelCase")]
enum NativeCallback {
    #[serde(rename_all = "camelCase")]
    ContractDetails {
        req_id: i64,
        symbol: String,
        #[serde(default)]
        long_name: String,
        #[serde(default)]
        primary_exch: String,
        con_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    ContractDetailsEnd { req_id: i64 },
    #[serde(rename_all = "camelCase")]
    TickPrice { ticker_id: i64, field: i32, price: f64 },
    #[serde(rename_all = "camelCase")]
    HistoricalData { req_id: i64, bar: NativeBar },
    #[serde(rename_all = "camelCase")]
    HistoricalDataEnd {
        req_id: i64,
        #[serde(default)]
        start_date_str: String,
        #[serde(default)]
        end_date_str: String,
    },
    #[serde(rename_all = "camelCase")]
    SecurityDefinitionOptionalParameter {
        req_id: i64,
        #[serde(default)]
        exchange: String,
        #[serde(default)]
        expirations: Vec<String>,
        #[serde(default)]
        strikes: Vec<f64>,
    },
    #[serde(rename_all = "camelCase")]
    SecurityDefinitionOptionalParameterEnd { req_id: i64 },
    #[serde(rename_all = "camelCase")]
    Error {
        id: i64,
        error_code: i32,
        error_msg: String,
    },
    ConnectionClosed,
    #[serde(other)]
    Unsupported,
}

/// Native ids are signed; negative ids are not tied to a request
fn request_id(raw: i64) -> Option<RequestId> {
    u64::try_from(raw).ok().filter(|id| *id > 0).map(RequestId)
}

/// Translate one line from the bridge. Returns `None` for callbacks the
/// engine does not consume.
pub(crate) fn translate(line: &str) -> Result<Option<ProviderEvent>> {
    let callback: NativeCallback =
        serde_json::from_str(line).map_err(|e| MarketDataError::Provider(format!("malformed callback: {}", e)))?;

    let event = match callback {
        NativeCallback::ContractDetails {
            req_id,
            symbol,
            long_name,
            primary_exch,
            con_id,
        } => request_id(req_id).map(|req_id| ProviderEvent::ContractDetails {
            req_id,
            details: ContractMetadata {
                symbol,
                long_name,
                primary_exchange: primary_exch,
                con_id,
            },
        }),
        NativeCallback::ContractDetailsEnd { req_id } => {
            request_id(req_id).map(|req_id| ProviderEvent::ContractDetailsEnd { req_id })
        }
        // The gateway reports unavailable prices as -1
        NativeCallback::TickPrice { ticker_id, field, price } if price > 0.0 => {
            request_id(ticker_id).map(|req_id| ProviderEvent::TickPrice {
                req_id,
                field: TickField::from_code(field),
                price,
            })
        }
        NativeCallback::TickPrice { .. } => None,
        NativeCallback::HistoricalData { req_id, bar } => request_id(req_id).map(|req_id| ProviderEvent::Bar {
            req_id,
            bar: Bar {
                time: bar.time,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            },
        }),
        NativeCallback::HistoricalDataEnd {
            req_id,
            start_date_str,
            end_date_str,
        } => request_id(req_id).map(|req_id| ProviderEvent::HistoricalDataEnd {
            req_id,
            start: start_date_str,
            end: end_date_str,
        }),
        NativeCallback::SecurityDefinitionOptionalParameter {
            req_id,
            exchange,
            expirations,
            strikes,
        } => request_id(req_id).map(|req_id| ProviderEvent::OptionParameters {
            req_id,
            exchange,
            expirations,
            strikes,
        }),
        NativeCallback::SecurityDefinitionOptionalParameterEnd { req_id } => {
            request_id(req_id).map(|req_id| ProviderEvent::OptionParametersEnd { req_id })
        }
        NativeCallback::Error {
            id,
            error_code,
            error_msg,
        } => Some(ProviderEvent::Error {
            req_id: request_id(id),
            code: error_code,
            message: error_msg,
        }),
        NativeCallback::ConnectionClosed => Some(ProviderEvent::ConnectionClosed),
        NativeCallback::Unsupported => None,
    };
    Ok(event)
}

/// Provider backed by a TCP line bridge
#[derive(Debug)]
pub struct LineBridgeProvider {
    outbound: mpsc::UnboundedSender<String>,
    address: String,
}

impl LineBridgeProvider {
    /// Connect to the bridge and start the reader and writer tasks
    pub async fn connect(config: &BridgeConfig, events: EventSender) -> Result<Self> {
        let address = config.address();
        info!(%address, client_id = config.client_id, "Connecting to provider bridge");

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| {
                MarketDataError::Connection(format!(
                    "timed out after {:?} connecting to {}",
                    config.connect_timeout, address
                ))
            })?
            .map_err(|e| MarketDataError::Connection(format!("{}: {}", address, e)))?;

        let (reader, writer) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let hello = serde_json::json!({ "request": "connect", "client_id": config.client_id }).to_string();
        outbound
            .send(hello)
            .map_err(|_| MarketDataError::Connection("writer closed before start".to_string()))?;

        tokio::spawn(write_loop(writer, outbound_rx));
        tokio::spawn(read_loop(reader, events));

        info!(%address, "Connected to provider bridge");
        Ok(Self { outbound, address })
    }

    fn send(&self, request: ProviderRequest) -> Result<()> {
        let line = serde_json::to_string(&request)
            .map_err(|e| MarketDataError::Provider(format!("encoding request {}: {}", request.id(), e)))?;
        trace!(req_id = %request.id(), %line, "Sending request");
        self.outbound
            .send(line)
            .map_err(|_| MarketDataError::Connection(format!("connection to {} is closed", self.address)))
    }
}

impl MarketDataProvider for LineBridgeProvider {
    fn request_contract_details(&self, id: RequestId, contract: &Contract) -> Result<()> {
        self.send(ProviderRequest::ContractDetails {
            id,
            contract: contract.clone(),
        })
    }

    fn request_market_data(&self, id: RequestId, contract: &Contract, snapshot: bool) -> Result<()> {
        self.send(ProviderRequest::MarketData {
            id,
            contract: contract.clone(),
            snapshot,
        })
    }

    fn cancel_market_data(&self, id: RequestId) -> Result<()> {
        self.send(ProviderRequest::CancelMarketData { id })
    }

    fn request_historical_data(&self, id: RequestId, contract: &Contract, query: &HistoricalQuery) -> Result<()> {
        self.send(ProviderRequest::HistoricalData {
            id,
            contract: contract.clone(),
            query: query.clone(),
        })
    }

    fn request_option_parameters(&self, id: RequestId, symbol: &str, underlying_con_id: i64) -> Result<()> {
        self.send(ProviderRequest::OptionParameters {
            id,
            symbol: symbol.to_string(),
            underlying_con_id,
        })
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<String>) {
    while let Some(mut line) = outbound.recv().await {
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!(error = %e, "Failed to write to provider bridge");
            return;
        }
    }
    debug!("Provider bridge writer stopped");
}

async fn read_loop(reader: OwnedReadHalf, events: EventSender) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match translate(&line) {
                    Ok(Some(event)) => {
                        if events.send(event).is_err() {
                            debug!("Event channel closed, stopping bridge reader");
                            return;
                        }
                    }
                    Ok(None) => trace!(%line, "Discarding unused callback"),
                    Err(e) => warn!(error = %e, "Skipping bridge line"),
                }
            }
            Ok(None) => {
                info!("Provider bridge closed the connection");
                break;
            }
            Err(e) => {
                error!(error = %e, "Failed to read from provider bridge");
                break;
            }
        }
    }
    let _ = events.send(ProviderEvent::ConnectionClosed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::event_channel;
    use assert_matches::assert_matches;
    use tokio::net::TcpListener;

    #[test]
    fn test_translate_tick_price() {
        let event = translate(r#"{"callback":"tickPrice","tickerId":5,"field":68,"price":401.25}"#).unwrap();
        assert_eq!(
            event,
            Some(ProviderEvent::TickPrice {
                req_id: RequestId(5),
                field: TickField::Last,
                price: 401.25,
            })
        );

        let unavailable = translate(r#"{"callback":"tickPrice","tickerId":5,"field":4,"price":-1.0}"#).unwrap();
        assert_eq!(unavailable, None);
    }

    #[test]
    fn test_translate_error_without_request() {
        let event =
            translate(r#"{"callback":"error","id":-1,"errorCode":2104,"errorMsg":"Market data farm connection is OK"}"#)
                .unwrap();
        assert_matches!(event, Some(ProviderEvent::Error { req_id: None, code: 2104, .. }));
    }

    #[test]
    fn test_translate_discards_unused_callbacks() {
        let event = translate(r#"{"callback":"tickSize","tickerId":5,"field":0,"size":100}"#).unwrap();
        assert_eq!(event, None);
        assert_matches!(translate("not json"), Err(MarketDataError::Provider(_)));
    }

    #[test]
    fn test_translate_option_parameters() {
        let event = translate(
            r#"{"callback":"securityDefinitionOptionalParameter","reqId":3,"exchange":"SMART","underlyingConId":272093,"tradingClass":"MSFT","multiplier":"100","expirations":["20240419"],"strikes":[400.0,405.0]}"#,
        )
        .unwrap();
        assert_matches!(
            event,
            Some(ProviderEvent::OptionParameters { req_id: RequestId(3), ref strikes, .. }) if strikes.len() == 2
        );
    }

    #[tokio::test]
    async fn test_bridge_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            let hello = lines.next_line().await.unwrap().unwrap();
            let request = lines.next_line().await.unwrap().unwrap();
            writer
                .write_all(b"{\"callback\":\"contractDetailsEnd\",\"reqId\":1}\n")
                .await
                .unwrap();
            (hello, request)
        });

        let (tx, mut rx) = event_channel();
        let config = BridgeConfig {
            host: "127.0.0.1".to_string(),
            port,
            client_id: 7,
            connect_timeout: Duration::from_secs(2),
        };
        let provider = LineBridgeProvider::connect(&config, tx).await.unwrap();
        provider
            .request_contract_details(RequestId(1), &Contract::stock("MSFT"))
            .unwrap();

        let (hello, request) = server.await.unwrap();
        assert!(hello.contains("\"client_id\":7"));
        assert!(request.contains("\"request\":\"contract_details\""));
        assert!(request.contains("\"symbol\":\"MSFT\""));

        assert_eq!(
            rx.recv().await,
            Some(ProviderEvent::ContractDetailsEnd { req_id: RequestId(1) })
        );
        // The server task dropped its socket
        assert_eq!(rx.recv().await, Some(ProviderEvent::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, _rx) = event_channel();
        let config = BridgeConfig {
            host: "127.0.0.1".to_string(),
            port,
            client_id: 0,
            connect_timeout: Duration::from_secs(2),
        };
        assert_matches!(
            LineBridgeProvider::connect(&config, tx).await,
            Err(MarketDataError::Connection(_))
        );
    }
}
