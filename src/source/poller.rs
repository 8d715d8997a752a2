use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::BatchSource;
use crate::coordinator::CoordinatorHandle;
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;

/// Pulls batches from `source` into the coordinator until `token` is cancelled.
///
/// Empty polls and retryable errors extend a streak that drives `backoff`; a batch
/// resets it. Stops early when the source reports it is closed or the coordinator is gone.
pub async fn run_poller(
    source: Arc<dyn BatchSource>,
    coordinator: CoordinatorHandle,
    backoff: BackoffPolicy,
    bus: Bus,
    token: CancellationToken,
) {
    let mut streak: u32 = 0;

    loop {
        let polled = tokio::select! {
            _ = token.cancelled() => return,
            polled = source.poll_next_batch() => polled,
        };

        let event = match polled {
            Ok(Some(batch)) => {
                streak = 0;
                if coordinator.submit(batch).await.is_err() {
                    tracing::debug!(source = source.name(), "coordinator gone, poller exits");
                    return;
                }
                continue;
            }
            Ok(None) => Event::new(EventKind::PollBackoff),
            Err(e) if !e.is_retryable() => {
                bus.publish(
                    Event::new(EventKind::SourcePollFailed)
                        .with_actor(source.name())
                        .with_reason(e.to_string()),
                );
                return;
            }
            Err(e) => Event::new(EventKind::SourcePollFailed).with_reason(e.to_string()),
        };

        let delay = backoff.next(streak);
        streak = streak.saturating_add(1);
        bus.publish(
            event
                .with_actor(source.name())
                .with_attempt(streak)
                .with_delay(delay),
        );

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Command;
    use crate::model::Batch;
    use crate::source::InMemorySource;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn forwards_batches_and_backs_off_when_empty() {
        let source = Arc::new(InMemorySource::with_batches([Batch::fresh("a", vec![])]));
        let (tx, mut rx) = mpsc::channel(4);
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let token = CancellationToken::new();

        let poller = tokio::spawn(run_poller(
            source.clone(),
            CoordinatorHandle::new(tx),
            BackoffPolicy::constant(Duration::from_millis(100)),
            bus.clone(),
            token.clone(),
        ));

        match rx.recv().await {
            Some(Command::Submit(batch)) => assert_eq!(batch.id.as_str(), "a"),
            other => panic!("unexpected {other:?}"),
        }

        let first = events.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::PollBackoff);
        assert_eq!(first.attempt, Some(1));
        assert_eq!(first.delay_ms, Some(100));

        source.push(Batch::fresh("b", vec![])).await;
        match rx.recv().await {
            Some(Command::Submit(batch)) => assert_eq!(batch.id.as_str(), "b"),
            other => panic!("unexpected {other:?}"),
        }

        token.cancel();
        poller.await.unwrap();
    }
}
