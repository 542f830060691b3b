//! Assertion macros shared by the integration tests

/// Unwrap an `Ok`, panicking with the error's debug output otherwise
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("expected Ok, got {:?}", e),
        }
    };
}

/// Receive from a `SyncEvent` broadcast until an event matches `$pattern`
///
/// Other events are skipped. Fails after five seconds.
#[macro_export]
macro_rules! expect_event {
    ($rx:expr, $pattern:pat) => {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                match $rx.recv().await {
                    Ok(event @ $pattern) => break event,
                    Ok(_) => continue,
                    Err(e) => panic!("event stream closed: {:?}", e),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    };
}

/// Assert how many `$method $path` requests the mock backend received
#[macro_export]
macro_rules! assert_sent {
    ($server:expr, $method:expr, $path:expr, $count:expr) => {{
        let requests = $server.received_requests().await.unwrap_or_default();
        let sent = requests
            .iter()
            .filter(|r| r.method.as_str() == $method && r.url.path() == $path)
            .count();
        assert_eq!(sent, $count, "{} {} sent {} time(s)", $method, $path, sent);
    }};
}
