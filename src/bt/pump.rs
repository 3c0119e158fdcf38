//! Event queue between the radio callback and the dispatcher.
//!
//! The vendor stack calls back from its own task, often with interrupts
//! masked or a foreign lock held, so it must not run the dispatcher
//! directly. It posts into an [`EventQueue`] instead; a dedicated task
//! drains the queue with [`EventQueue::run`].

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use super::discovery::Recon;
use super::{RadioStack, StackEvent};
use crate::config::EVENT_QUEUE_DEPTH;
use crate::error::Error;

pub struct EventQueue<M: RawMutex, const N: usize = EVENT_QUEUE_DEPTH> {
    channel: Channel<M, StackEvent, N>,
}

impl<M: RawMutex, const N: usize> EventQueue<M, N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Queue an event without blocking. Safe to call from the stack's
    /// callback context.
    pub fn post(&self, event: StackEvent) -> Result<(), Error> {
        self.channel.try_send(event).map_err(|_| {
            warn!("Event queue full, dropping stack event");
            Error::QueueFull
        })
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Handle everything currently queued. Returns the number of events.
    pub fn drain<RM: RawMutex, R: RadioStack>(&self, recon: &Recon<RM, R>) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.channel.try_receive() {
            recon.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Dispatcher task body: handle events forever, one at a time.
    pub async fn run<RM: RawMutex, R: RadioStack>(&self, recon: &Recon<RM, R>) -> ! {
        loop {
            let event = self.channel.receive().await;
            let outcome = recon.handle_event(event);
            debug!("Handled stack event: {:?}", outcome);
        }
    }
}

impl<M: RawMutex, const N: usize> Default for EventQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
