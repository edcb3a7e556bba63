use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::event::StompEvent;
use crate::frame::Frame;
use crate::subscription::Handler;

/// Work handed from the connection task to the delivery context.
pub(crate) enum Delivery {
    Event(StompEvent),
    Message {
        destination: String,
        handler: Handler,
        frame: Frame,
    },
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Delivery::Message { destination, .. } => f
                .debug_struct("Message")
                .field("destination", destination)
                .finish_non_exhaustive(),
        }
    }
}

/// Spawn the task that runs handlers and forwards events, in the order the
/// connection produced them.
///
/// Runs on `handle` when given, otherwise on the current runtime. Ends when
/// the connection task drops its sender.
pub(crate) fn spawn_dispatcher(
    mut deliveries: mpsc::UnboundedReceiver<Delivery>,
    events: mpsc::UnboundedSender<StompEvent>,
    handle: Option<tokio::runtime::Handle>,
) -> JoinHandle<()> {
    let task = async move {
        while let Some(delivery) = deliveries.recv().await {
            match delivery {
                Delivery::Event(event) => {
                    // Nobody listening is fine; handlers still run.
                    let _ = events.send(event);
                }
                Delivery::Message {
                    destination,
                    handler,
                    frame,
                } => {
                    let outcome =
                        catch_unwind(AssertUnwindSafe(|| handler(&frame.body, &frame.headers)));
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(%destination, error = %e, "dropping undecodable message");
                            let _ = events.send(StompEvent::DecodeError {
                                destination,
                                error: e.to_string(),
                            });
                        }
                        Err(panic) => warn!(
                            %destination,
                            panic = panic_message(panic.as_ref()),
                            "message handler panicked"
                        ),
                    }
                }
            }
        }
        debug!("dispatcher stopped");
    };
    match handle {
        Some(handle) => handle.spawn(task),
        None => tokio::spawn(task),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
