use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// Stream framing markers. They bracket the job's real output and are not
/// content; consumers collecting "full output" must filter them out.
pub const STREAM_STARTED: &str = "Job started";
pub const STREAM_COMPLETED: &str = "Job completed";

/// Relays a job's output as SSE `output` events in production order,
/// bracketed by the framing markers. If the job faults mid-run its channel
/// simply closes; whatever was produced is followed by the terminal marker
/// and the stream ends.
pub fn sse_response(
    output: mpsc::Receiver<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(output_events(output)).keep_alive(KeepAlive::default())
}

pub(crate) fn output_events(
    output: mpsc::Receiver<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    tokio_stream::once(STREAM_STARTED.to_string())
        .chain(ReceiverStream::new(output))
        .chain(tokio_stream::once(STREAM_COMPLETED.to_string()))
        .map(|line| Ok(Event::default().event("output").data(line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(rx: mpsc::Receiver<String>) -> Vec<String> {
        // Render each event the way it goes on the wire so ordering and
        // framing are observable.
        output_events(rx)
            .map(|event| format!("{:?}", event.unwrap()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn frames_output_with_start_and_completion_markers() {
        let (tx, rx) = mpsc::channel(8);
        tx.send("64 bytes from 142.250.74.78".to_string())
            .await
            .unwrap();
        tx.send("1 packets transmitted, 1 received".to_string())
            .await
            .unwrap();
        drop(tx);

        let events = collect(rx).await;
        assert_eq!(events.len(), 4);
        assert!(events[0].contains(STREAM_STARTED));
        assert!(events[1].contains("64 bytes from"));
        assert!(events[2].contains("1 packets transmitted"));
        assert!(events[3].contains(STREAM_COMPLETED));
    }

    #[tokio::test]
    async fn empty_output_still_gets_both_markers() {
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(tx);

        let events = collect(rx).await;
        assert_eq!(events.len(), 2);
        assert!(events[0].contains(STREAM_STARTED));
        assert!(events[1].contains(STREAM_COMPLETED));
    }

    #[tokio::test]
    async fn lines_arrive_as_they_are_produced() {
        let (tx, rx) = mpsc::channel(1);
        let mut stream = Box::pin(output_events(rx));

        // Start marker is available before the job produced anything.
        let first = stream.next().await.unwrap().unwrap();
        assert!(format!("{first:?}").contains(STREAM_STARTED));

        tx.send("line 1".to_string()).await.unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert!(format!("{second:?}").contains("line 1"));

        drop(tx);
        let last = stream.next().await.unwrap().unwrap();
        assert!(format!("{last:?}").contains(STREAM_COMPLETED));
        assert!(stream.next().await.is_none());
    }
}
