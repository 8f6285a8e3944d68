//! End-to-end resolver behavior over an in-memory transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, secret_body};
use secretmux::{
    Error, MemoryTransport, MergePolicy, Precedence, Resolver, SourceDescriptor,
};

fn two_overlapping_sources(transport: &MemoryTransport) -> Vec<SourceDescriptor> {
    let secret1 = SourceDescriptor::new("default", "secret1");
    let secret2 = SourceDescriptor::new("default", "secret2");
    transport.insert(
        secret1.resource_path(),
        secret_body(&[("USERNAME", "alice"), ("PASSWORD", "p1")]),
    );
    transport.insert(
        secret2.resource_path(),
        secret_body(&[("USERNAME", "bob"), ("PASSWORD", "p2")]),
    );
    vec![secret1, secret2]
}

#[tokio::test]
async fn refresh_publishes_merged_view() {
    let transport = MemoryTransport::new();
    let sources = two_overlapping_sources(&transport);

    let resolver = Resolver::new(fast_config(sources), Arc::new(transport)).unwrap();
    let report = resolver.refresh().await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert!(report.failures.is_empty());
    assert_eq!(report.keys, 2);
    assert_eq!(report.collisions, 2);

    let entry = resolver.get("USERNAME").await.unwrap();
    assert_eq!(entry.value, b"bob");
    assert_eq!(entry.source_id, "default/secret2");
    assert!(entry.collided);
}

#[tokio::test]
async fn lookups_fail_before_first_refresh() {
    let transport = MemoryTransport::new();
    let sources = two_overlapping_sources(&transport);

    let resolver = Resolver::new(fast_config(sources), Arc::new(transport)).unwrap();

    assert!(matches!(
        resolver.get("USERNAME").await,
        Err(Error::NotReady)
    ));
    assert!(matches!(resolver.snapshot().await, Err(Error::NotReady)));
}

#[tokio::test]
async fn missing_key_is_a_typed_error() {
    let transport = MemoryTransport::new();
    let sources = two_overlapping_sources(&transport);

    let resolver = Resolver::new(fast_config(sources), Arc::new(transport)).unwrap();
    resolver.refresh().await.unwrap();

    assert!(matches!(
        resolver.get("NO_SUCH_KEY").await,
        Err(Error::KeyNotFound(_))
    ));
}

#[tokio::test]
async fn path_segmented_keeps_every_source_addressable() {
    let transport = MemoryTransport::new();
    let sources = two_overlapping_sources(&transport);

    let mut config = fast_config(sources);
    config.policy = MergePolicy::PathSegmented;

    let resolver = Resolver::new(config, Arc::new(transport)).unwrap();
    let report = resolver.refresh().await.unwrap();

    assert_eq!(report.keys, 4);
    assert_eq!(report.collisions, 0);
    assert_eq!(
        resolver.get("secret1/USERNAME").await.unwrap().value,
        b"alice"
    );
    assert_eq!(resolver.get("secret2/USERNAME").await.unwrap().value, b"bob");
}

#[tokio::test]
async fn precedence_reversal_flips_the_winner() {
    let transport = MemoryTransport::new();
    let sources = two_overlapping_sources(&transport);

    let mut config = fast_config(sources);
    config.precedence = Precedence::Earlier;

    let resolver = Resolver::new(config, Arc::new(transport)).unwrap();
    resolver.refresh().await.unwrap();

    assert_eq!(resolver.get("USERNAME").await.unwrap().value, b"alice");
}

#[tokio::test]
async fn failing_source_does_not_block_the_others() {
    let transport = MemoryTransport::new();
    let healthy = SourceDescriptor::new("default", "healthy");
    let broken = SourceDescriptor::new("default", "broken");
    transport.insert(healthy.resource_path(), secret_body(&[("TOKEN", "t0k3n")]));
    transport.fail(
        broken.resource_path(),
        Error::Transport {
            source_id: broken.id(),
            message: "connection refused".to_string(),
            retryable: true,
        },
    );

    let resolver = Resolver::new(
        fast_config(vec![healthy, broken.clone()]),
        Arc::new(transport),
    )
    .unwrap();
    let report = resolver.refresh().await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source_id, broken.id());
    assert!(report.failures[0].error.is_retryable());

    assert_eq!(resolver.get("TOKEN").await.unwrap().value, b"t0k3n");
}

#[tokio::test]
async fn refresh_with_zero_successes_fails_and_stays_unpopulated() {
    let transport = MemoryTransport::new();
    let gone = SourceDescriptor::new("default", "gone");
    // Nothing inserted: the transport reports NotFound.

    let resolver = Resolver::new(fast_config(vec![gone]), Arc::new(transport)).unwrap();

    assert!(matches!(
        resolver.refresh().await,
        Err(Error::RefreshFailed(_))
    ));
    assert!(matches!(
        resolver.get("ANYTHING").await,
        Err(Error::NotReady)
    ));
}

#[tokio::test]
async fn failed_refresh_retains_the_previous_view() {
    let transport = Arc::new(MemoryTransport::new());
    let source = SourceDescriptor::new("default", "secret1");
    let path = source.resource_path();
    transport.insert(path.clone(), secret_body(&[("USERNAME", "alice")]));

    let resolver = Resolver::new(fast_config(vec![source.clone()]), transport.clone()).unwrap();
    resolver.refresh().await.unwrap();

    // The upstream starts rejecting the token; the stale view must keep
    // serving.
    transport.fail(
        path,
        Error::Unauthorized {
            source_id: source.id(),
        },
    );
    assert!(matches!(
        resolver.refresh().await,
        Err(Error::RefreshFailed(_))
    ));
    assert_eq!(resolver.get("USERNAME").await.unwrap().value, b"alice");
}

#[tokio::test]
async fn refresh_is_idempotent_for_unchanged_upstream_data() {
    let transport = MemoryTransport::new();
    let sources = two_overlapping_sources(&transport);

    let resolver = Resolver::new(fast_config(sources), Arc::new(transport)).unwrap();
    resolver.refresh().await.unwrap();
    let first = resolver.snapshot().await.unwrap();

    resolver.refresh().await.unwrap();
    let second = resolver.snapshot().await.unwrap();

    assert_eq!(first.entries(), second.entries());
    assert_eq!(first.collisions(), second.collisions());
}

#[tokio::test]
async fn transient_failures_recover_within_max_attempts() {
    let transport = MemoryTransport::new();
    let source = SourceDescriptor::new("default", "flaky");
    let path = source.resource_path();
    let transient = Error::Transport {
        source_id: source.id(),
        message: "connection reset".to_string(),
        retryable: true,
    };
    transport.script(
        path,
        vec![
            Err(transient.clone()),
            Err(transient),
            Ok(secret_body(&[("USERNAME", "alice")])),
        ],
    );

    let resolver = Resolver::new(fast_config(vec![source]), Arc::new(transport)).unwrap();
    let report = resolver.refresh().await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn allow_list_excluding_everything_still_counts_as_success() {
    let transport = MemoryTransport::new();
    let empty = SourceDescriptor::new("default", "secret1")
        .with_keys(vec!["ABSENT".to_string()]);
    let full = SourceDescriptor::new("default", "secret2");
    transport.insert(empty.resource_path(), secret_body(&[("USERNAME", "alice")]));
    transport.insert(full.resource_path(), secret_body(&[("TOKEN", "t0k3n")]));

    let resolver =
        Resolver::new(fast_config(vec![empty, full]), Arc::new(transport)).unwrap();
    let report = resolver.refresh().await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.keys, 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_deadline_cancels_slow_fetches() {
    let transport = MemoryTransport::new();
    let source = SourceDescriptor::new("default", "slow");
    transport.insert(source.resource_path(), secret_body(&[("USERNAME", "alice")]));
    transport.set_delay(Duration::from_secs(60));

    let mut config = fast_config(vec![source]);
    config.refresh_timeout_secs = 1;

    let resolver = Resolver::new(config, Arc::new(transport)).unwrap();

    assert!(matches!(
        resolver.refresh().await,
        Err(Error::DeadlineExceeded(1))
    ));
    assert!(matches!(
        resolver.get("USERNAME").await,
        Err(Error::NotReady)
    ));
}

#[tokio::test]
async fn snapshot_exposes_the_collision_report() {
    let transport = MemoryTransport::new();
    let sources = two_overlapping_sources(&transport);

    let resolver = Resolver::new(fast_config(sources), Arc::new(transport)).unwrap();
    resolver.refresh().await.unwrap();

    let view = resolver.snapshot().await.unwrap();
    let usernames: Vec<_> = view
        .real_collisions()
        .filter(|c| c.key == "USERNAME")
        .collect();
    assert_eq!(usernames.len(), 1);
    assert_eq!(usernames[0].winner, "default/secret2");
    assert_eq!(
        usernames[0].contenders,
        vec!["default/secret1".to_string(), "default/secret2".to_string()]
    );
}

#[tokio::test]
async fn periodic_refresh_populates_and_shuts_down() {
    let transport = MemoryTransport::new();
    let sources = two_overlapping_sources(&transport);

    let mut config = fast_config(sources);
    config.refresh_interval_secs = Some(3600);

    let resolver = Arc::new(Resolver::new(config, Arc::new(transport)).unwrap());
    let handle = resolver.clone().spawn_periodic().unwrap();

    // The first tick fires immediately; wait for the view to appear.
    let mut populated = false;
    for _ in 0..50 {
        if resolver.snapshot().await.is_ok() {
            populated = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(populated, "periodic task never published a view");

    handle.shutdown().await;
}

#[tokio::test]
async fn spawn_periodic_requires_an_interval() {
    let transport = MemoryTransport::new();
    let sources = two_overlapping_sources(&transport);

    let resolver = Arc::new(Resolver::new(fast_config(sources), Arc::new(transport)).unwrap());
    assert!(matches!(
        resolver.spawn_periodic(),
        Err(Error::InvalidConfig(_))
    ));
}
