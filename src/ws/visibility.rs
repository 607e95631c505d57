use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use kameo::prelude::{Actor, ActorRef, Message as KameoMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::{ChannelEvent, Visibility, WebSocketResult};

/// Host-provided source of page visibility transitions.
pub trait VisibilityTrigger: Stream<Item = Visibility> + Send + Unpin + 'static {}

impl<S> VisibilityTrigger for S where S: Stream<Item = Visibility> + Send + Unpin + 'static {}

/// Host side of [`visibility_channel`].
#[derive(Clone, Debug)]
pub struct VisibilitySender {
    tx: mpsc::UnboundedSender<Visibility>,
}

impl VisibilitySender {
    /// Report a transition. Returns `false` once every listener is gone.
    pub fn report(&self, visibility: Visibility) -> bool {
        self.tx.send(visibility).is_ok()
    }
}

/// Channel-backed trigger for hosts that push visibility changes imperatively.
pub struct VisibilityReceiver {
    rx: mpsc::UnboundedReceiver<Visibility>,
}

impl Stream for VisibilityReceiver {
    type Item = Visibility;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

pub fn visibility_channel() -> (VisibilitySender, VisibilityReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (VisibilitySender { tx }, VisibilityReceiver { rx })
}

/// Forward every transition into the channel actor until the trigger ends or the actor stops.
///
/// The actor decides whether a transition reconnects; this task never opens sockets itself.
pub fn spawn_visibility_policy<A, V>(actor_ref: ActorRef<A>, mut trigger: V) -> JoinHandle<()>
where
    A: Actor + KameoMessage<ChannelEvent, Reply = WebSocketResult<()>>,
    V: VisibilityTrigger,
{
    tokio::spawn(async move {
        while let Some(visibility) = trigger.next().await {
            if actor_ref
                .tell(ChannelEvent::Visibility(visibility))
                .send()
                .await
                .is_err()
            {
                debug!("channel actor gone; visibility policy stopping");
                break;
            }
        }
    })
}
