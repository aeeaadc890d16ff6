// Messaging - lock-free channels between UI, clock and audio threads

pub mod channels;
pub mod command;
pub mod notification;
