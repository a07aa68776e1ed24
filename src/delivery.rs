//! Worker-to-consumer delivery channel.
//!
//! Frame events go through a single slot: a newer frame replaces one the consumer
//! has not picked up yet, so a slow consumer always sees the latest frame. Errors
//! go through an ordered queue and are never replaced; each is received exactly
//! once. Events come out in the order they were sent.

use crossbeam_channel::{RecvError, RecvTimeoutError, TryRecvError};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::decode::{BackendKind, DecodedSymbol};
use crate::error::ScanError;
use crate::frame::Frame;

/// One delivered frame.
#[derive(Debug)]
pub struct FrameEvent {
    /// Captured (and annotated, when enabled) frame. Owned by the consumer now.
    pub frame: Frame,
    /// Symbols first seen in this session on this frame.
    pub symbols: Vec<DecodedSymbol>,
    /// Every symbol decoded on this frame, reported or not.
    pub in_view: Vec<DecodedSymbol>,
    /// Backend that decoded the frame.
    pub backend: BackendKind,
}

#[derive(Debug)]
pub enum ScanEvent {
    Frame(FrameEvent),
    Error(ScanError),
}

#[derive(Default)]
struct Mailbox {
    next_seq: u64,
    latest: Option<(u64, FrameEvent)>,
    errors: VecDeque<(u64, ScanError)>,
    replaced: u64,
    closed: bool,
}

impl Mailbox {
    fn take(&mut self) -> Option<ScanEvent> {
        let frame_seq = self.latest.as_ref().map(|(seq, _)| *seq);
        let error_seq = self.errors.front().map(|(seq, _)| *seq);
        match (frame_seq, error_seq) {
            (Some(f), Some(e)) if e < f => {
                self.errors.pop_front().map(|(_, e)| ScanEvent::Error(e))
            }
            (Some(_), _) => self.latest.take().map(|(_, f)| ScanEvent::Frame(f)),
            (None, Some(_)) => self.errors.pop_front().map(|(_, e)| ScanEvent::Error(e)),
            (None, None) => None,
        }
    }
}

struct Shared {
    mailbox: Mutex<Mailbox>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Mailbox> {
        // A panic while holding the lock cannot leave the mailbox half-written.
        self.mailbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create a connected sender/receiver pair.
pub fn delivery_channel() -> (DeliverySender, DeliveryReceiver) {
    let shared = Arc::new(Shared {
        mailbox: Mutex::new(Mailbox::default()),
        ready: Condvar::new(),
    });
    (
        DeliverySender {
            shared: shared.clone(),
        },
        DeliveryReceiver { shared },
    )
}

/// Worker side. Dropping it disconnects the receiver once pending events drain.
pub struct DeliverySender {
    shared: Arc<Shared>,
}

impl DeliverySender {
    /// Publish a frame, replacing any frame still waiting. Never blocks on the consumer.
    pub fn send_frame(&self, event: FrameEvent) {
        let mut mailbox = self.shared.lock();
        let seq = mailbox.next_seq;
        mailbox.next_seq += 1;
        if mailbox.latest.replace((seq, event)).is_some() {
            mailbox.replaced += 1;
        }
        drop(mailbox);
        self.shared.ready.notify_one();
    }

    /// Queue an error. Errors are never replaced or dropped.
    pub fn send_error(&self, error: ScanError) {
        let mut mailbox = self.shared.lock();
        let seq = mailbox.next_seq;
        mailbox.next_seq += 1;
        mailbox.errors.push_back((seq, error));
        drop(mailbox);
        self.shared.ready.notify_one();
    }

    /// Frames overwritten before the consumer picked them up.
    pub fn replaced(&self) -> u64 {
        self.shared.lock().replaced
    }
}

impl Drop for DeliverySender {
    fn drop(&mut self) {
        self.shared.lock().closed = true;
        self.shared.ready.notify_all();
    }
}

/// Consumer side.
pub struct DeliveryReceiver {
    shared: Arc<Shared>,
}

impl DeliveryReceiver {
    pub fn try_recv(&self) -> Result<ScanEvent, TryRecvError> {
        let mut mailbox = self.shared.lock();
        match mailbox.take() {
            Some(event) => Ok(event),
            None if mailbox.closed => Err(TryRecvError::Disconnected),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Block until an event arrives or the sender is gone.
    pub fn recv(&self) -> Result<ScanEvent, RecvError> {
        let mut mailbox = self.shared.lock();
        loop {
            if let Some(event) = mailbox.take() {
                return Ok(event);
            }
            if mailbox.closed {
                return Err(RecvError);
            }
            mailbox = self
                .shared
                .ready
                .wait(mailbox)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<ScanEvent, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        let mut mailbox = self.shared.lock();
        loop {
            if let Some(event) = mailbox.take() {
                return Ok(event);
            }
            if mailbox.closed {
                return Err(RecvTimeoutError::Disconnected);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RecvTimeoutError::Timeout);
            }
            mailbox = self
                .shared
                .ready
                .wait_timeout(mailbox, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame_event(marker: u8) -> FrameEvent {
        FrameEvent {
            frame: Frame::new(1, 1, vec![marker, marker, marker]).unwrap(),
            symbols: Vec::new(),
            in_view: Vec::new(),
            backend: BackendKind::GeneralPurpose,
        }
    }

    fn marker(event: ScanEvent) -> u8 {
        match event {
            ScanEvent::Frame(f) => f.frame.pixels()[0],
            ScanEvent::Error(e) => panic!("unexpected error event {e}"),
        }
    }

    #[test]
    fn slow_consumer_sees_latest_frame() {
        let (tx, rx) = delivery_channel();
        for i in 0..10 {
            tx.send_frame(frame_event(i));
        }
        assert_eq!(marker(rx.try_recv().unwrap()), 9);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(tx.replaced(), 9);
    }

    #[test]
    fn errors_are_never_dropped() {
        let (tx, rx) = delivery_channel();
        tx.send_error(ScanError::device_unavailable(3, "missing"));
        tx.send_frame(frame_event(1));
        tx.send_error(ScanError::ReadTimeout {
            index: 0,
            waited_ms: 500,
        });
        tx.send_frame(frame_event(2));

        let mut errors = Vec::new();
        let mut frames = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ScanEvent::Error(e) => errors.push(e.kind()),
                ScanEvent::Frame(f) => frames.push(f.frame.pixels()[0]),
            }
        }
        assert_eq!(errors, vec!["device_unavailable", "read_timeout"]);
        assert_eq!(frames, vec![2]);
    }

    #[test]
    fn frame_sent_before_error_is_received_first() {
        let (tx, rx) = delivery_channel();
        tx.send_frame(frame_event(7));
        tx.send_error(ScanError::ReadTimeout {
            index: 0,
            waited_ms: 30,
        });
        assert_eq!(marker(rx.try_recv().unwrap()), 7);
        assert!(matches!(rx.try_recv(), Ok(ScanEvent::Error(_))));
    }

    #[test]
    fn dropping_sender_disconnects_after_drain() {
        let (tx, rx) = delivery_channel();
        tx.send_frame(frame_event(1));
        drop(tx);
        assert!(rx.recv().is_ok());
        assert!(rx.recv().is_err());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn recv_wakes_on_send_from_other_thread() {
        let (tx, rx) = delivery_channel();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send_frame(frame_event(5));
            tx
        });
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(marker(event), 5);
        drop(handle.join().unwrap());
    }

    #[test]
    fn recv_timeout_expires_when_idle() {
        let (_tx, rx) = delivery_channel();
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(RecvTimeoutError::Timeout)
        ));
    }
}
