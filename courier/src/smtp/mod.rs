//! Mail submission: address syntax, replies, commands, and the client side
//! state machine.

pub mod args;
mod client;
mod command;
mod message;
mod response;

pub use client::{Client, ClientError, Delivery, Output};
pub use command::{Command, Mechanism};
pub use message::Envelope;
pub use response::{ParseResponseError, Response, ResponseCode};
