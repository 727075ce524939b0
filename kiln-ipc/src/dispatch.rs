//! Message sinks and the end-of-stream shutdown protocol

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::IpcError;
use crate::protocol::Message;

/// A sink that messages can be delivered to
#[async_trait]
pub trait Dispatch<T: Send + 'static>: Send + Sync {
    /// Deliver one message
    async fn dispatch(&self, message: T) -> Result<(), IpcError>;
}

/// A dispatch that can be shut down
#[async_trait]
pub trait StoppableDispatch<T: Send + 'static>: Dispatch<T> {
    /// Stop the dispatch. Calls after the first are no-ops.
    async fn stop(&self) -> Result<(), IpcError>;
}

#[async_trait]
impl<T, D> Dispatch<T> for Arc<D>
where
    T: Send + 'static,
    D: Dispatch<T> + ?Sized,
{
    async fn dispatch(&self, message: T) -> Result<(), IpcError> {
        (**self).dispatch(message).await
    }
}

/// Wraps a sink so that stopping it delivers exactly one
/// [`Message::EndOfStream`], and nothing is delivered after it.
///
/// Dispatches share a read lock and run concurrently with each other. `stop`
/// takes the write lock, so it waits for in-flight dispatches to finish and
/// no dispatch can start between the flag flip and the marker.
pub struct EndOfStreamDispatch<D> {
    dispatch: D,
    stopped: RwLock<bool>,
}

impl<D> EndOfStreamDispatch<D> {
    pub fn new(dispatch: D) -> Self {
        Self {
            dispatch,
            stopped: RwLock::new(false),
        }
    }

    /// Whether `stop` has been called
    pub async fn is_stopped(&self) -> bool {
        *self.stopped.read().await
    }

    /// The wrapped sink
    pub fn inner(&self) -> &D {
        &self.dispatch
    }
}

#[async_trait]
impl<D: Dispatch<Message>> Dispatch<Message> for EndOfStreamDispatch<D> {
    async fn dispatch(&self, message: Message) -> Result<(), IpcError> {
        let stopped = self.stopped.read().await;
        if *stopped {
            return Err(IpcError::IllegalState(format!(
                "Cannot dispatch message {}, as this dispatch has been stopped.",
                message
            )));
        }
        if message.is_end_of_stream() {
            return Err(IpcError::IllegalState(
                "Cannot dispatch an end-of-stream marker directly; stop the dispatch instead."
                    .to_string(),
            ));
        }
        // The read guard stays alive until delivery has finished.
        let result = self.dispatch.dispatch(message).await;
        drop(stopped);
        result
    }
}

#[async_trait]
impl<D: Dispatch<Message>> StoppableDispatch<Message> for EndOfStreamDispatch<D> {
    async fn stop(&self) -> Result<(), IpcError> {
        let mut stopped = self.stopped.write().await;
        if *stopped {
            return Ok(());
        }
        *stopped = true;
        self.dispatch.dispatch(Message::EndOfStream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Records everything delivered to it
    #[derive(Default)]
    struct RecordingDispatch {
        messages: Mutex<Vec<Message>>,
        delay: Option<Duration>,
        entered: Notify,
    }

    impl RecordingDispatch {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        fn messages(&self) -> Vec<Message> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Dispatch<Message> for RecordingDispatch {
        async fn dispatch(&self, message: Message) -> Result<(), IpcError> {
            self.entered.notify_one();
            match self.delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            self.messages.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn payload(n: usize) -> Message {
        Message::payload(&n).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_forwards_in_order() {
        let dispatch = EndOfStreamDispatch::new(Arc::new(RecordingDispatch::default()));

        for n in 0..3 {
            dispatch.dispatch(payload(n)).await.unwrap();
        }

        assert_eq!(dispatch.inner().messages(), vec![payload(0), payload(1), payload(2)]);
        assert!(!dispatch.is_stopped().await);
    }

    #[tokio::test]
    async fn test_stop_produces_single_end_of_stream() {
        let dispatch = EndOfStreamDispatch::new(Arc::new(RecordingDispatch::default()));

        dispatch.dispatch(payload(1)).await.unwrap();
        dispatch.stop().await.unwrap();
        dispatch.stop().await.unwrap();

        assert_eq!(dispatch.inner().messages(), vec![payload(1), Message::EndOfStream]);
        assert!(dispatch.is_stopped().await);
    }

    #[tokio::test]
    async fn test_dispatch_after_stop_fails() {
        let dispatch = EndOfStreamDispatch::new(Arc::new(RecordingDispatch::default()));
        dispatch.stop().await.unwrap();

        let err = dispatch.dispatch(payload(1)).await.unwrap_err();
        assert!(matches!(err, IpcError::IllegalState(_)));
        assert!(err.to_string().contains("has been stopped"));
        assert_eq!(dispatch.inner().messages(), vec![Message::EndOfStream]);
    }

    #[tokio::test]
    async fn test_end_of_stream_cannot_be_dispatched_directly() {
        let dispatch = EndOfStreamDispatch::new(Arc::new(RecordingDispatch::default()));

        let err = dispatch.dispatch(Message::EndOfStream).await.unwrap_err();
        assert!(matches!(err, IpcError::IllegalState(_)));

        dispatch.stop().await.unwrap();
        assert_eq!(dispatch.inner().messages(), vec![Message::EndOfStream]);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_dispatch() {
        let sink = Arc::new(RecordingDispatch::with_delay(Duration::from_millis(50)));
        let dispatch = Arc::new(EndOfStreamDispatch::new(sink.clone()));

        let in_flight = {
            let dispatch = dispatch.clone();
            tokio::spawn(async move { dispatch.dispatch(payload(7)).await })
        };
        sink.entered.notified().await;

        dispatch.stop().await.unwrap();

        assert_eq!(sink.messages(), vec![payload(7), Message::EndOfStream]);
        assert!(in_flight.await.unwrap().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_racing_stop() {
        let sink = Arc::new(RecordingDispatch::default());
        let dispatch = Arc::new(EndOfStreamDispatch::new(sink.clone()));

        let mut senders = Vec::new();
        for task in 0..16 {
            let dispatch = dispatch.clone();
            senders.push(tokio::spawn(async move {
                let mut accepted = 0usize;
                let mut rejected = 0usize;
                for n in 0..50 {
                    match dispatch.dispatch(payload(task * 1000 + n)).await {
                        Ok(()) => accepted += 1,
                        Err(IpcError::IllegalState(_)) => rejected += 1,
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
                (accepted, rejected)
            }));
        }

        let stopper = {
            let dispatch = dispatch.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                dispatch.stop().await
            })
        };

        let mut accepted = 0;
        let mut rejected = 0;
        for sender in futures::future::join_all(senders).await {
            let (a, r) = sender.unwrap();
            accepted += a;
            rejected += r;
        }
        stopper.await.unwrap().unwrap();

        // Anything dispatched after the stop completed must fail.
        assert!(dispatch.dispatch(payload(0)).await.is_err());

        let messages = sink.messages();
        let markers = messages.iter().filter(|m| m.is_end_of_stream()).count();
        assert_eq!(markers, 1);
        assert_eq!(messages.last(), Some(&Message::EndOfStream));
        assert_eq!(messages.len(), accepted + 1);
        assert_eq!(accepted + rejected, 16 * 50);
    }
}
