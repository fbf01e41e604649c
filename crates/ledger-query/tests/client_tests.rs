//! End-to-end query client behaviour over a scripted ledger

mod common;

use anyhow::Result;
use common::{client, client_with_retry, sample, token, urls, ScriptedRpc, Step, ACCOUNT};
use ledger_query::{
    Holding, MetricsSource, OperationKind, QueryClient, QueryConfig, QueryError, QueryEvent, QueryOptions,
    RetryPolicy,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn drain(mut rx: mpsc::Receiver<QueryEvent>) -> Vec<QueryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_balance_from_first_endpoint() -> Result<()> {
    let endpoints = urls(2);
    let rpc = Arc::new(ScriptedRpc::new().script(&endpoints[0], vec![Step::Balance(2_500_000_000)]));
    let client = client(rpc.clone(), &endpoints);

    let balance = client.query_balance(ACCOUNT, QueryOptions::new()).await?;

    assert_eq!(balance.balance, 2.5);
    assert_eq!(balance.to_string(), "2.5 SOL (2500000000 lamports)");
    assert_eq!(rpc.attempts(), vec![endpoints[0].clone()]);
    Ok(())
}

#[tokio::test]
async fn test_invalid_identifier_makes_no_calls() {
    let endpoints = urls(2);
    let rpc = Arc::new(ScriptedRpc::new().script(&endpoints[0], vec![Step::Balance(1)]));
    let client = client(rpc.clone(), &endpoints);

    for input in ["", "abc", "0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl", "1".repeat(45).as_str()] {
        let balance = client.query_balance(input, QueryOptions::new()).await;
        assert!(matches!(balance, Err(QueryError::InvalidIdentifier { .. })), "{:?}", input);

        let holdings = client.query_holdings(input, QueryOptions::new()).await;
        assert!(matches!(holdings, Err(QueryError::InvalidIdentifier { .. })), "{:?}", input);
    }

    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn test_holdings_drop_zero_balances_in_order() -> Result<()> {
    let endpoints = urls(1);
    let rpc = Arc::new(ScriptedRpc::new().script(
        &endpoints[0],
        vec![Step::Holdings(vec![
            token("MintA", 0.0),
            token("MintB", 3.2),
            token("MintC", 0.0),
            token("MintD", 1.5),
        ])],
    ));
    let client = client(rpc, &endpoints);

    let holdings = client.query_holdings(ACCOUNT, QueryOptions::new()).await?;

    let mints: Vec<&str> = holdings.iter().map(|h| h.mint.as_str()).collect();
    assert_eq!(mints, vec!["MintB", "MintD"]);
    assert_eq!(
        holdings.holdings[0],
        Holding {
            mint: "MintB".to_string(),
            amount: 3.2,
            decimals: 6
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_holdings_returned_without_retry() -> Result<()> {
    let endpoints = urls(2);
    let rpc = Arc::new(ScriptedRpc::new().script(&endpoints[0], vec![Step::Holdings(Vec::new())]));
    let client = client(rpc.clone(), &endpoints);

    let holdings = client.query_holdings(ACCOUNT, QueryOptions::new()).await?;

    assert!(holdings.is_empty());
    assert_eq!(holdings.to_string(), "no token holdings");
    assert_eq!(rpc.attempts().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_live_network_metrics() -> Result<()> {
    let endpoints = urls(1);
    let rpc = Arc::new(ScriptedRpc::new().script(
        &endpoints[0],
        vec![Step::Metrics {
            samples: vec![sample(12_345, 60)],
            epoch: 612,
            slot: 264_412_345,
        }],
    ));
    let client = client(rpc, &endpoints);

    let metrics = client.query_network_metrics(QueryOptions::new()).await?;

    assert_eq!(metrics.tps, 206);
    assert_eq!(metrics.epoch, 612);
    assert_eq!(metrics.slot, 264_412_345);
    assert_eq!(metrics.source, MetricsSource::Live);
    Ok(())
}

#[tokio::test]
async fn test_metrics_without_samples_substitute_throughput() -> Result<()> {
    let endpoints = urls(1);
    let rpc = Arc::new(ScriptedRpc::new().script(
        &endpoints[0],
        vec![Step::Metrics {
            samples: Vec::new(),
            epoch: 612,
            slot: 264_412_345,
        }],
    ));
    let client = client(rpc, &endpoints);

    let metrics = client.query_network_metrics(QueryOptions::new()).await?;

    assert_eq!(metrics.tps, 3_000);
    assert_eq!(metrics.epoch, 612);
    assert_eq!(metrics.source, MetricsSource::PartialFallback);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_metrics_fall_back_without_waiting() -> Result<()> {
    let endpoints = urls(3);
    let rpc = Arc::new(ScriptedRpc::new());
    let client = client(rpc.clone(), &endpoints);
    let (tx, rx) = mpsc::channel(16);

    let start = Instant::now();
    let metrics = client
        .query_network_metrics(QueryOptions::new().with_events(tx))
        .await?;

    assert_eq!((metrics.tps, metrics.epoch, metrics.slot), (3_000, 0, 0));
    assert_eq!(metrics.source, MetricsSource::Fallback);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(rpc.attempts(), endpoints);
    assert_eq!(
        drain(rx),
        vec![QueryEvent::Congested {
            kind: OperationKind::NetworkMetrics,
            cycle: 1,
            failed_endpoints: 3,
            retry_in: None
        }]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_pool_retries_from_first_endpoint() -> Result<()> {
    let endpoints = urls(2);
    let rpc = Arc::new(
        ScriptedRpc::new()
            .script(&endpoints[0], vec![Step::refused(), Step::Balance(1_000_000_000)])
            .script(&endpoints[1], vec![Step::refused()]),
    );
    let client = client(rpc.clone(), &endpoints);
    let (tx, rx) = mpsc::channel(16);

    let start = Instant::now();
    let balance = client
        .query_balance(ACCOUNT, QueryOptions::new().with_events(tx))
        .await?;

    assert_eq!(balance.balance, 1.0);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(
        rpc.attempts(),
        vec![endpoints[0].clone(), endpoints[1].clone(), endpoints[0].clone()]
    );
    assert_eq!(
        drain(rx),
        vec![
            QueryEvent::Congested {
                kind: OperationKind::Balance,
                cycle: 1,
                failed_endpoints: 2,
                retry_in: Some(Duration::from_secs(5))
            },
            QueryEvent::Retrying {
                kind: OperationKind::Balance,
                cycle: 2
            },
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_bounded_retry_gives_up() {
    let endpoints = urls(2);
    let rpc = Arc::new(ScriptedRpc::new());
    let policy = RetryPolicy {
        delay: Duration::from_secs(5),
        max_cycles: Some(3),
    };
    let client = client_with_retry(rpc.clone(), &endpoints, policy);

    let result = client.query_holdings(ACCOUNT, QueryOptions::new()).await;

    assert_eq!(
        result,
        Err(QueryError::PoolExhausted {
            cycles: 3,
            endpoints: 2
        })
    );
    assert_eq!(rpc.attempts().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_retry_wait() {
    let endpoints = urls(2);
    let rpc = Arc::new(ScriptedRpc::new());
    let client = client(rpc.clone(), &endpoints);
    let cancel = CancellationToken::new();

    let canceller = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        }
    });

    let start = Instant::now();
    let result = client
        .query_balance(ACCOUNT, QueryOptions::new().with_cancel(cancel))
        .await;

    assert_eq!(result, Err(QueryError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(rpc.attempts().len(), 2);
    canceller.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_stalled_attempt() {
    let endpoints = urls(1);
    let rpc = Arc::new(ScriptedRpc::new().script(
        &endpoints[0],
        vec![Step::slow(Duration::from_secs(600), Step::Balance(1))],
    ));
    let client = client(rpc, &endpoints);
    let cancel = CancellationToken::new();

    let canceller = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            cancel.cancel();
        }
    });

    let start = Instant::now();
    let result = client
        .query_balance(ACCOUNT, QueryOptions::new().with_cancel(cancel))
        .await;

    assert_eq!(result, Err(QueryError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(8));
    canceller.await.unwrap();
}

#[tokio::test]
async fn test_cancelled_metrics_query_makes_no_calls() {
    let endpoints = urls(1);
    let rpc = Arc::new(ScriptedRpc::new());
    let client = client(rpc.clone(), &endpoints);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = client
        .query_network_metrics(QueryOptions::new().with_cancel(cancel))
        .await;

    assert_eq!(result, Err(QueryError::Cancelled));
    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_stalled_metrics_attempt() {
    let endpoints = urls(2);
    let rpc = Arc::new(ScriptedRpc::new().script(
        &endpoints[0],
        vec![Step::slow(
            Duration::from_secs(600),
            Step::Metrics {
                samples: vec![sample(12_345, 60)],
                epoch: 612,
                slot: 264_412_345,
            },
        )],
    ));
    let client = client(rpc.clone(), &endpoints);
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(16);

    let canceller = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            cancel.cancel();
        }
    });

    let start = Instant::now();
    let result = client
        .query_network_metrics(QueryOptions::new().with_cancel(cancel).with_events(tx))
        .await;

    assert_eq!(result, Err(QueryError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(8));
    // Cancelled before the first endpoint answered or timed out
    assert_eq!(rpc.attempts(), vec![endpoints[0].clone()]);
    assert!(drain(rx).is_empty());
    canceller.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_undrained_events_do_not_stall_retries() {
    let endpoints = urls(2);
    let rpc = Arc::new(ScriptedRpc::new());
    let policy = RetryPolicy {
        delay: Duration::from_secs(5),
        max_cycles: Some(4),
    };
    let client = client_with_retry(rpc.clone(), &endpoints, policy);
    let (tx, rx) = mpsc::channel(1);

    let result = client
        .query_balance(ACCOUNT, QueryOptions::new().with_events(tx))
        .await;

    assert_eq!(
        result,
        Err(QueryError::PoolExhausted {
            cycles: 4,
            endpoints: 2
        })
    );
    assert_eq!(rpc.attempts().len(), 8);
    assert_eq!(drain(rx).len(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() -> Result<()> {
    let endpoints = urls(1);
    let rpc = Arc::new(ScriptedRpc::new().script(&endpoints[0], vec![Step::Balance(7)]));
    let balance_client = client(rpc, &endpoints);

    let holdings_endpoints = urls(1);
    let holdings_rpc = Arc::new(
        ScriptedRpc::new().script(&holdings_endpoints[0], vec![Step::Holdings(vec![token("MintB", 3.2)])]),
    );
    let holdings_client = client(holdings_rpc, &holdings_endpoints);

    let (balance, holdings) = tokio::join!(
        balance_client.query_balance(ACCOUNT, QueryOptions::new()),
        holdings_client.query_holdings(ACCOUNT, QueryOptions::new()),
    );

    assert_eq!(balance?.lamports, 7);
    assert_eq!(holdings?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_client_from_config_rejects_empty_pool() {
    let mut config = QueryConfig::default();
    config.pool.endpoints.clear();

    let result = QueryClient::with_rpc(&config, Arc::new(ScriptedRpc::new()));

    assert!(result.is_err());
}

#[tokio::test]
async fn test_client_from_config_uses_declared_pool() -> Result<()> {
    let endpoints = urls(2);
    let mut config = QueryConfig::default();
    config.override_endpoints(&endpoints.join(","));
    let rpc = Arc::new(ScriptedRpc::new().script(&endpoints[1], vec![Step::Balance(3)]));

    let client = QueryClient::with_rpc(&config, rpc.clone())?;
    let balance = client.query_balance(ACCOUNT, QueryOptions::new()).await?;

    assert_eq!(client.pool().urls(), vec![endpoints[0].as_str(), endpoints[1].as_str()]);
    assert_eq!(balance.lamports, 3);
    assert_eq!(rpc.attempts(), endpoints);
    Ok(())
}
