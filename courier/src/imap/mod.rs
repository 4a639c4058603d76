//! Just enough IMAP4rev1 to find and fetch bounce notifications.

mod command;
mod response;

pub use command::{Command, Tagger};
pub use response::{ParseResponseError, Response, ResponseReader, Status};
