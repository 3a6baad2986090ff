#![allow(clippy::unwrap_used)]

use crate::{
    Command, CommandEnvelope, CommandResponse, Correlator, LocalBus, MessageBus, RecorderError,
    TopicScheme,
    tests::support::{WAIT, module_id},
};

use std::{sync::Arc, time::Duration};

fn correlator(bus: &LocalBus, timeout: Duration) -> Arc<Correlator> {
    Arc::new(Correlator::new(
        Arc::new(bus.connect("controller")),
        TopicScheme::default(),
        timeout,
    ))
}

/// WHAT: A response nobody waits for is discarded
/// WHY: Late or foreign responses must not be delivered to the wrong caller
#[test]
fn given_no_pending_requests_when_resolving_then_discarded() {
    // Given: An idle correlator
    let bus = LocalBus::new();
    let correlator = correlator(&bus, Duration::from_secs(5));

    // When: A response with an unknown id, and one with no id, arrive
    let unknown = correlator.resolve(
        &module_id("mic1"),
        CommandResponse::ok(Some("nobody".to_string()), "Status published"),
    );
    let anonymous = correlator.resolve(&module_id("mic1"), CommandResponse::ok(None, "x"));

    // Then: Both dropped
    assert!(!unknown);
    assert!(!anonymous);
    assert_eq!(correlator.pending_count(), 0);
}

/// WHAT: A timed-out request fails with Timeout and leaves nothing pending
/// WHY: Silent modules must not leak correlator entries
#[tokio::test(start_paused = true)]
async fn given_silent_module_when_sending_command_then_timeout_and_entry_removed() {
    // Given: No module listening
    let bus = LocalBus::new();
    let correlator = correlator(&bus, Duration::from_secs(5));

    // When: Sending a status request
    let result = correlator
        .send_command(&module_id("mic1"), Command::Status)
        .await;

    // Then: Timeout naming the module, and the map is empty
    match result {
        Err(e @ RecorderError::Timeout { .. }) => {
            assert!(e.is_timeout());
            assert!(e.to_string().contains("mic1"));
        }
        other => unreachable!("expected timeout, got {other:?}"),
    }
    assert_eq!(correlator.pending_count(), 0);
}

/// WHAT: A response arriving after its timeout is discarded
/// WHY: The caller has already been told the command failed
#[tokio::test(start_paused = true)]
async fn given_timed_out_request_when_late_response_arrives_then_discarded() {
    // Given: A module that reads the command but answers too late
    let bus = LocalBus::new();
    let module = bus.connect("mic1");
    module.subscribe("rslogger/audio/mic1/command").await.unwrap();
    let correlator = correlator(&bus, Duration::from_millis(200));

    let result = correlator
        .send_command(&module_id("mic1"), Command::Stop)
        .await;
    assert!(result.unwrap_err().is_timeout());

    // When: The late answer arrives
    let message = module.next_message().await.unwrap();
    let envelope = CommandEnvelope::decode(&message.payload).unwrap();
    let delivered = correlator.resolve(
        &module_id("mic1"),
        CommandResponse::ok(envelope.request_id, "Recording stopped"),
    );

    // Then: Nobody receives it
    assert!(!delivered);
}

/// WHAT: Concurrent requests to one module are matched by request id, not order
/// WHY: Modules may answer out of order under load
#[tokio::test]
async fn given_two_concurrent_requests_when_answered_in_reverse_then_each_caller_gets_its_own() {
    // Given: A fake module that collects two commands then answers newest first
    let bus = LocalBus::new();
    let module = bus.connect("mic1");
    module.subscribe("rslogger/audio/mic1/command").await.unwrap();
    let correlator = correlator(&bus, WAIT);

    let responder = {
        let correlator = Arc::clone(&correlator);
        tokio::spawn(async move {
            let mut request_ids = Vec::new();
            for _ in 0..2 {
                let message = module.next_message().await.unwrap();
                let envelope = CommandEnvelope::decode(&message.payload).unwrap();
                request_ids.push((envelope.request_id.unwrap(), envelope.command.kind()));
            }
            for (request_id, kind) in request_ids.into_iter().rev() {
                let response = CommandResponse::ok(Some(request_id), kind);
                assert!(correlator.resolve(&module_id("mic1"), response));
            }
        })
    };

    // When: Two commands are in flight at once
    let mic1 = module_id("mic1");
    let (status, stop) = tokio::join!(
        correlator.send_command(&mic1, Command::Status),
        correlator.send_command(&mic1, Command::Stop),
    );
    responder.await.unwrap();

    // Then: Each got the answer to its own command
    assert_eq!(status.unwrap().message, "status");
    assert_eq!(stop.unwrap().message, "stop");
    assert_eq!(correlator.pending_count(), 0);
}

/// WHAT: A failed publish removes the entry and returns the bus error
/// WHY: A command that never left must not wait out the full timeout
#[tokio::test]
async fn given_disconnected_bus_when_sending_command_then_bus_error_and_nothing_pending() {
    // Given: A correlator whose session was dropped by the broker
    let bus = LocalBus::new();
    let correlator = correlator(&bus, WAIT);
    bus.disconnect("controller");

    // When: Sending
    let result = correlator
        .send_command(&module_id("mic1"), Command::Status)
        .await;

    // Then: Bus error, no leftover entry
    assert!(matches!(result, Err(RecorderError::Bus { .. })));
    assert_eq!(correlator.pending_count(), 0);
}

/// WHAT: Abandoning a request future removes its entry
/// WHY: Callers that give up early must not leave slots behind
#[tokio::test(start_paused = true)]
async fn given_caller_gives_up_early_when_future_dropped_then_entry_removed() {
    // Given: A correlator with a long deadline
    let bus = LocalBus::new();
    let correlator = correlator(&bus, Duration::from_secs(60));

    // When: The caller stops waiting after one second
    let abandoned = tokio::time::timeout(
        Duration::from_secs(1),
        correlator.send_command(&module_id("mic1"), Command::Status),
    )
    .await;

    // Then: The entry went away with the future
    assert!(abandoned.is_err());
    assert_eq!(correlator.pending_count(), 0);
}

/// WHAT: Shutdown fails waiting callers and refuses new commands
/// WHY: Controller teardown must not leave callers hanging until their timeouts
#[tokio::test]
async fn given_pending_request_when_correlator_shuts_down_then_correlator_closed() {
    // Given: A request in flight
    let bus = LocalBus::new();
    let correlator = correlator(&bus, WAIT);
    let waiter = {
        let correlator = Arc::clone(&correlator);
        tokio::spawn(async move {
            correlator
                .send_command(&module_id("mic1"), Command::Status)
                .await
        })
    };
    while correlator.pending_count() == 0 {
        tokio::task::yield_now().await;
    }

    // When: Shutting down
    let abandoned = correlator.shutdown();

    // Then: The waiter and any later caller see CorrelatorClosed
    assert_eq!(abandoned, 1);
    assert!(matches!(
        waiter.await.unwrap(),
        Err(RecorderError::CorrelatorClosed { .. })
    ));
    assert!(matches!(
        correlator
            .send_command(&module_id("mic1"), Command::Status)
            .await,
        Err(RecorderError::CorrelatorClosed { .. })
    ));
}
