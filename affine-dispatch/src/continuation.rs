// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use log::{debug, trace};

/// A suspended computation that is resumed exactly once.
///
/// `resume_inline` runs on the calling thread, right now. Timer and frame
/// callbacks already execute on the home thread, so they resume through this
/// method and never post a second time. The re-posting variant is
/// [`AffineDispatcherExt::resume_via_dispatch`](crate::AffineDispatcherExt::resume_via_dispatch).
///
/// Taking `Box<Self>` makes a second resume impossible. Resuming a
/// computation whose owner has already gone away must be a harmless no-op.
pub trait Continuation<T>: Send + 'static {
    fn resume_inline(self: Box<Self>, value: T);
}

impl<T, F> Continuation<T> for F
where
    F: FnOnce(T) + Send + 'static,
{
    fn resume_inline(self: Box<Self>, value: T) {
        (*self)(value)
    }
}

/// Continuation half of [`suspend`].
struct Resumer<T> {
    tx: oneshot::Sender<T>,
}

impl<T: Send + 'static> Continuation<T> for Resumer<T> {
    fn resume_inline(self: Box<Self>, value: T) {
        if self.tx.send(value).is_err() {
            trace!("resumption dropped before it was resumed");
        }
    }
}

/// Create a continuation together with the future it resumes.
pub fn suspend<T: Send + 'static>() -> (Box<dyn Continuation<T>>, Resumption<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Box::new(Resumer { tx }),
        Resumption {
            rx,
            abandoned: false,
        },
    )
}

/// Future side of [`suspend`]. Completes with the value passed to the
/// continuation.
///
/// If the continuation is dropped without being resumed, e.g. because its
/// queue shut down, the future never completes.
#[derive(Debug)]
#[must_use = "a resumption does nothing unless awaited"]
pub struct Resumption<T> {
    rx: oneshot::Receiver<T>,
    abandoned: bool,
}

impl<T> Future for Resumption<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        if self.abandoned {
            return Poll::Pending;
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(oneshot::Canceled)) => {
                debug!("continuation dropped without resuming; suspending forever");
                self.abandoned = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
