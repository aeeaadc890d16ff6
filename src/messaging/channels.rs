// Lock-free communication channels

use crate::messaging::command::AudioCommand;
use crate::messaging::notification::Notification;
use ringbuf::{
    HeapRb,
    traits::{Producer, Split},
};
use std::sync::{Arc, Mutex};

pub type CommandProducer = ringbuf::HeapProd<AudioCommand>;
pub type CommandConsumer = ringbuf::HeapCons<AudioCommand>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<AudioCommand>::new(capacity.max(1));
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

/// Notification producer shared by the session, the clock thread and the engine
pub type SharedNotificationProducer = Arc<Mutex<NotificationProducer>>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity.max(1));
    rb.split()
}

/// Push a notification without blocking
///
/// Returns false if the producer is busy or the queue is full; the
/// notification is dropped in that case.
pub fn push_notification(tx: &SharedNotificationProducer, notification: Notification) -> bool {
    match tx.try_lock() {
        Ok(mut producer) => producer.try_push(notification).is_ok(),
        Err(_) => false,
    }
}
