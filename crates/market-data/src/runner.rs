//! Session run loop
//!
//! Drains provider events into the session until every ticker is done, the
//! per-ticker deadline passes, the provider disconnects or shutdown is
//! requested.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::provider::{EventReceiver, ProviderEvent};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every ticker completed and statistics were emitted
    Completed,
    /// At least one ticker missed the deadline without its required data
    TimedOut,
    /// Shutdown was requested
    Stopped,
    /// The provider closed its event stream
    Disconnected,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

fn settled_outcome(session: &Session) -> RunOutcome {
    if session.aggregator().timed_out().is_empty() {
        RunOutcome::Completed
    } else {
        RunOutcome::TimedOut
    }
}

/// Pump events into `session` until it finishes
///
/// The deadline starts when this is called and applies to every ticker.
pub async fn run_session(session: &Session, mut events: EventReceiver, shutdown: CancellationToken) -> RunOutcome {
    let finished = session.finished();
    let timeout = session.settings().ticker_timeout;
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    info!(tickers = session.tickers().len(), ?timeout, "Waiting for provider callbacks");

    let outcome = loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Shutdown requested, releasing pending requests");
                session.cancel_pending();
                break RunOutcome::Stopped;
            }
            _ = finished.cancelled() => {
                session.cancel_pending();
                break settled_outcome(session);
            }
            _ = &mut deadline => {
                warn!(
                    completed = session.aggregator().completed_count(),
                    in_flight = session.registry().in_flight(),
                    "Ticker deadline reached"
                );
                session.expire_incomplete();
                break settled_outcome(session);
            }
            event = events.recv() => match event {
                Some(ProviderEvent::ConnectionClosed) | None => {
                    error!(in_flight = session.registry().in_flight(), "Provider event stream closed");
                    session.expire_incomplete();
                    break RunOutcome::Disconnected;
                }
                Some(event) => session.handle(event),
            }
        }
    };

    info!(outcome = ?outcome, completed = session.aggregator().completed_count(), "Session finished");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{event_channel, ProviderRequest, SimulatedProvider};
    use crate::report::CollectingSink;
    use crate::session::SessionSettings;
    use crate::testing::{harness, settings, ticker};
    use crate::types::{Bar, ContractMetadata, TickField};
    use assert_matches::assert_matches;
    use common::RequestId;
    use std::sync::Arc;
    use std::time::Duration;

    fn simulated_session(symbols: &[&str], settings: SessionSettings, latency: Option<Duration>) -> (Session, EventReceiver, Arc<CollectingSink>) {
        let (tx, rx) = event_channel();
        let mut provider = SimulatedProvider::new(tx, settings.today);
        if let Some(delay) = latency {
            provider = provider.with_latency(delay, tokio::runtime::Handle::current());
        }
        let sink = Arc::new(CollectingSink::new());
        let session = Session::new(
            symbols.iter().map(|s| ticker(s)).collect(),
            Arc::new(provider),
            sink.clone(),
            settings,
        );
        (session, rx, sink)
    }

    #[tokio::test]
    async fn test_simulated_run_completes() {
        let settings = SessionSettings {
            request_option_snapshot: true,
            ..settings()
        };
        let (session, rx, sink) = simulated_session(&["MSFT", "NVDA", "TSLA"], settings, None);
        session.start().unwrap();

        let outcome = run_session(&session, rx, CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Completed);

        let reports = sink.reports();
        assert_eq!(reports.len(), 3);
        for report in &reports {
            assert_eq!(report.bar_count, 22);
            assert_eq!(report.implied_volatility.as_ref().map(|iv| iv.points), Some(30));
            assert!(!report.option_chain.strikes.is_empty());
        }
        let statistics = sink.emitted_statistics();
        assert_eq!(statistics.len(), 1);
        assert_eq!(statistics[0].rows.len(), 3);

        // Each report waited for its ATM quote
        for report in &reports {
            let atm = report.atm.as_ref().unwrap();
            assert!(atm.market_price.is_some(), "{}", report.ticker);
        }
        assert_eq!(session.registry().in_flight(), 0);
    }

    /// Callbacks for a single ticker started on a fresh session; request ids
    /// follow issue order.
    fn scripted_events(option_price: Option<f64>) -> Vec<ProviderEvent> {
        let id = RequestId;
        let end = |n| ProviderEvent::HistoricalDataEnd {
            req_id: id(n),
            start: "20240312".to_string(),
            end: "20240313".to_string(),
        };
        let sample = |n, date: &str, value| ProviderEvent::Bar {
            req_id: id(n),
            bar: Bar::sample(date, value),
        };
        let mut events = vec![
            ProviderEvent::ContractDetails {
                req_id: id(1),
                details: ContractMetadata {
                    symbol: "MSFT".to_string(),
                    long_name: "MICROSOFT CORP".to_string(),
                    primary_exchange: "NASDAQ".to_string(),
                    con_id: 272093,
                },
            },
            ProviderEvent::ContractDetailsEnd { req_id: id(1) },
            ProviderEvent::TickPrice {
                req_id: id(2),
                field: TickField::Last,
                price: 100.0,
            },
            ProviderEvent::OptionParameters {
                req_id: id(3),
                exchange: "SMART".to_string(),
                expirations: vec!["20240315".to_string()],
                strikes: vec![95.0, 100.0, 105.0],
            },
            ProviderEvent::OptionParametersEnd { req_id: id(3) },
            sample(4, "20240312", 100.0),
            sample(4, "20240313", 101.0),
            end(4),
            sample(5, "20240313", 0.20),
            end(5),
            sample(6, "20240313", 0.25),
            end(6),
        ];
        if let Some(price) = option_price {
            events.push(ProviderEvent::TickPrice {
                req_id: id(7),
                field: TickField::Mark,
                price,
            });
        }
        events
    }

    fn option_settings() -> SessionSettings {
        SessionSettings {
            request_option_snapshot: true,
            ticker_timeout: Duration::from_secs(5),
            ..settings()
        }
    }

    #[tokio::test]
    async fn test_completed_run_cancels_option_snapshot() {
        let h = harness(&["MSFT"], option_settings());
        h.session.start().unwrap();
        let (tx, rx) = event_channel();
        for event in scripted_events(Some(2.15)) {
            tx.send(event).unwrap();
        }

        let outcome = run_session(&h.session, rx, CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(h.session.registry().in_flight(), 0);
        assert!(h
            .provider
            .requests()
            .iter()
            .any(|r| matches!(r, ProviderRequest::CancelMarketData { id } if *id == RequestId(7))));

        let reports = h.sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].atm.as_ref().and_then(|atm| atm.market_price), Some(2.15));
        assert_eq!(h.sink.emitted_statistics().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_option_snapshot_reported_at_deadline() {
        let h = harness(&["MSFT"], option_settings());
        h.session.start().unwrap();
        let (tx, rx) = event_channel();
        for event in scripted_events(None) {
            tx.send(event).unwrap();
        }

        let outcome = run_session(&h.session, rx, CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(h.session.registry().in_flight(), 0);
        assert_matches!(
            h.provider.requests().last(),
            Some(ProviderRequest::CancelMarketData { id }) if *id == RequestId(7)
        );

        let reports = h.sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].atm.as_ref().and_then(|atm| atm.market_price), None);
        assert!(h.sink.timed_out().is_empty());
        assert_eq!(h.sink.emitted_statistics().len(), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_simulated_run_with_latency() {
        let (session, rx, sink) = simulated_session(&["MSFT", "AAPL"], settings(), Some(Duration::from_millis(5)));
        session.start().unwrap();

        let outcome = run_session(&session, rx, CancellationToken::new()).await;
        assert!(outcome.is_success());
        assert_eq!(sink.reports().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out_silent_provider() {
        let h = harness(
            &["MSFT", "NVDA"],
            SessionSettings {
                ticker_timeout: Duration::from_secs(5),
                ..settings()
            },
        );
        h.session.start().unwrap();
        let (_tx, rx) = event_channel();

        let outcome = run_session(&h.session, rx, CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::TimedOut);
        assert_eq!(h.sink.timed_out().len(), 2);
        assert!(h.sink.emitted_statistics().is_empty());
        assert_eq!(h.session.registry().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let h = harness(&["MSFT"], settings());
        h.session.start().unwrap();
        let (_tx, rx) = event_channel();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let outcome = run_session(&h.session, rx, shutdown).await;
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(h.session.registry().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_ends_run() {
        let h = harness(&["MSFT"], settings());
        h.session.start().unwrap();
        let (tx, rx) = event_channel();
        tx.send(ProviderEvent::ConnectionClosed).unwrap();

        let outcome = run_session(&h.session, rx, CancellationToken::new()).await;
        assert_eq!(outcome, RunOutcome::Disconnected);
        assert_eq!(h.sink.timed_out(), vec![ticker("MSFT")]);
    }
}
