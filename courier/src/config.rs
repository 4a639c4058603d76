use std::fmt::Display;

use thiserror::Error;

use crate::smtp::args::Domain;

pub const SUBMISSION_HOST: &str = "smtp.gmail.com";
pub const SUBMISSION_PORT: u16 = 587;
pub const MAILBOX_HOST: &str = "imap.gmail.com";
pub const MAILBOX_PORT: u16 = 993;
pub const DEFAULT_MAILBOX: &str = "INBOX";
pub const BOUNCE_SENDER: &str = "Mail Delivery Subsystem";

/// How a connection gets encrypted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Security {
	/// Plain text throughout. Only useful against a local test server.
	None,
	/// Connect in plain text, then upgrade before authenticating
	StartTls,
	/// TLS from the first byte
	Tls,
}

impl std::str::FromStr for Security {
	type Err = ParseSecurityError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"none" | "plain" => Ok(Security::None),
			"starttls" => Ok(Security::StartTls),
			"tls" | "ssl" => Ok(Security::Tls),
			_ => Err(ParseSecurityError(s.to_owned())),
		}
	}
}

impl Display for Security {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Security::None => write!(f, "none"),
			Security::StartTls => write!(f, "starttls"),
			Security::Tls => write!(f, "tls"),
		}
	}
}

#[derive(Debug, Error)]
#[error("'{0}' is not one of none, starttls, tls")]
pub struct ParseSecurityError(String);

/// A server to connect to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
	pub host: String,
	pub port: u16,
	pub security: Security,
}

impl Endpoint {
	pub fn new<S: Into<String>>(host: S, port: u16, security: Security) -> Self {
		Self {
			host: host.into(),
			port,
			security,
		}
	}

	pub fn default_submission() -> Self {
		Self::new(SUBMISSION_HOST, SUBMISSION_PORT, Security::StartTls)
	}

	pub fn default_mailbox() -> Self {
		Self::new(MAILBOX_HOST, MAILBOX_PORT, Security::Tls)
	}
}

impl Display for Endpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{} ({})", self.host, self.port, self.security)
	}
}

pub trait Config: Send + Sync {
	/// Where outgoing mail is submitted.
	fn submission(&self) -> &Endpoint;

	/// Where bounce notifications are read from.
	fn mailbox(&self) -> &Endpoint;

	/// The folder searched for bounces.
	fn mailbox_name(&self) -> &str {
		DEFAULT_MAILBOX
	}

	/// The From label bounce notifications carry.
	fn bounce_sender(&self) -> &str {
		BOUNCE_SENDER
	}

	/// Returns the hostname the client introduces itself as
	fn hello_name(&self) -> Domain {
		Domain::local()
	}
}
