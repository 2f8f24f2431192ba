//! Per-agent mailboxes.
//!
//! A [`Mailbox`] is the receiving end of an agent's call queue and lives
//! inside the agent, in the agent's own execution context. A [`Postbox`] is
//! the cloneable sending end: any context may hold one and enqueue calls,
//! but only the owner runs them, strictly in arrival order.
//!
//! ```text
//!  caller context            owner context
//!  ┌───────────┐  post()    ┌─────────────────────────────┐
//!  │  Postbox  │ ─────────▶ │ Mailbox ──drain──▶ call(&mut │
//!  └───────────┘            │                     agent)  │
//!        ▲      Reply<R>    └─────────────────────────────┘
//!        └──────────────────────────── request() result
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::DEFAULT_BACKLOG_WARNING;

/// A deferred operation against an agent of type `T`.
pub type Call<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

/// Errors raised when talking to a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// The owning agent no longer exists
    #[error("mailbox closed: its owner no longer exists")]
    Closed,
    /// The call was discarded before it produced a reply
    #[error("call was dropped before it produced a reply")]
    NoReply,
    /// The owner has not run the call yet
    #[error("reply not ready yet")]
    Pending,
}

/// Receiving end of an agent's call queue.
pub struct Mailbox<T> {
    // Kept so postboxes can be minted at any time; the queue therefore stays
    // open for as long as the owner lives.
    sender: mpsc::UnboundedSender<Call<T>>,
    receiver: mpsc::UnboundedReceiver<Call<T>>,
    backlog_warning: usize,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            backlog_warning: DEFAULT_BACKLOG_WARNING,
        }
    }

    /// Returns a new sending handle for this mailbox.
    pub fn postbox(&self) -> Postbox<T> {
        Postbox {
            sender: self.sender.clone(),
        }
    }

    /// Pops the oldest queued call, if any. Never waits.
    pub fn next_call(&mut self) -> Option<Call<T>> {
        self.receiver.try_recv().ok()
    }

    pub fn backlog_warning(&self) -> usize {
        self.backlog_warning
    }

    pub fn set_backlog_warning(&mut self, calls: usize) {
        self.backlog_warning = calls;
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("backlog_warning", &self.backlog_warning)
            .finish_non_exhaustive()
    }
}

/// Sending end of an agent's call queue. Cheap to clone, safe to send.
pub struct Postbox<T> {
    sender: mpsc::UnboundedSender<Call<T>>,
}

impl<T: 'static> Postbox<T> {
    /// Appends a call to the tail of the queue. Never blocks.
    pub fn post<F>(&self, call: F) -> Result<(), MailboxError>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.sender
            .send(Box::new(call))
            .map_err(|_| MailboxError::Closed)
    }

    /// Appends a call whose result is sent back through the returned [`Reply`].
    pub fn request<R, F>(&self, call: F) -> Result<Reply<R>, MailboxError>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post(move |target| {
            // The requester may have dropped its reply.
            let _ = tx.send(call(target));
        })?;
        Ok(Reply { receiver: rx })
    }
}

impl<T> Postbox<T> {
    /// Returns true once the owning agent has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Returns true if both postboxes feed the same mailbox.
    pub fn same_mailbox(&self, other: &Postbox<T>) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

impl<T> Clone for Postbox<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> fmt::Debug for Postbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Postbox")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The eventual result of a [`Postbox::request`].
///
/// Await it from async code, or poll it with [`Reply::try_take`] once the
/// owner has drained its mailbox.
#[derive(Debug)]
pub struct Reply<R> {
    receiver: oneshot::Receiver<R>,
}

impl<R> Reply<R> {
    /// Takes the result if the owner has already run the call.
    pub fn try_take(&mut self) -> Result<R, MailboxError> {
        self.receiver.try_recv().map_err(|e| match e {
            oneshot::error::TryRecvError::Empty => MailboxError::Pending,
            oneshot::error::TryRecvError::Closed => MailboxError::NoReply,
        })
    }

    /// Blocks the current thread until the result arrives.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> Result<R, MailboxError> {
        self.receiver.blocking_recv().map_err(|_| MailboxError::NoReply)
    }
}

impl<R> Future for Reply<R> {
    type Output = Result<R, MailboxError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| MailboxError::NoReply))
    }
}

/// Implemented by agents that own a [`Mailbox`] of themselves.
pub trait MailboxOwner: Sized {
    fn mailbox_mut(&mut self) -> &mut Mailbox<Self>;

    /// Runs queued calls in arrival order until the queue is empty.
    ///
    /// Calls enqueued while draining, including by the calls themselves, run
    /// in the same pass after everything that was already queued. Returns the
    /// number of calls executed. Must only be called by the owning context.
    fn drain_mailbox(&mut self) -> usize {
        let mut executed = 0;
        while let Some(call) = self.mailbox_mut().next_call() {
            call(self);
            executed += 1;
        }

        let threshold = self.mailbox_mut().backlog_warning();
        if executed > threshold {
            tracing::warn!(calls = executed, threshold, "drained a large mailbox backlog");
        }
        executed
    }
}
