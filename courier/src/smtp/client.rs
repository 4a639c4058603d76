use std::fmt::Display;

use base64::Engine;
use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::{
	args::Domain, Command, Envelope, Mechanism, ParseResponseError, Response, ResponseCode,
};

/// A submission session. This does no I/O: feed it whatever the server sends
/// with [Client::push] and write out whatever [Output] comes back.
pub struct Client {
	state: State,
	reply: String,
	hello: Domain,
	starttls: bool,
	tls_active: bool,
	username: String,
	secret: SecretString,
	capabilities: Capabilities,
	delivery: Option<Delivery>,
	pending: Option<Envelope>,
}

/// What happened to the last message handed to [Client::send].
#[derive(Clone, Debug)]
pub enum Delivery {
	Accepted,
	Rejected(Response),
}

impl Client {
	pub fn initiate(hello: Domain, starttls: bool, username: String, secret: SecretString) -> Self {
		Self {
			state: State::Initiated,
			reply: String::new(),
			hello,
			starttls,
			tls_active: false,
			username,
			secret,
			capabilities: Capabilities::default(),
			delivery: None,
			pending: None,
		}
	}

	pub fn push(&mut self, reply: &str) -> Result<Option<Output>, ClientError> {
		self.reply.push_str(reply);

		if !Response::is_complete(&self.reply) {
			return Ok(None);
		}

		let response: Response = self.reply.parse()?;
		self.reply.clear();
		debug!("S: {}", response);

		self.process_reply(response)
	}

	/// The driver has finished the TLS handshake asked for by [Output::StartTls].
	/// Capabilities have to be asked for again on the new channel.
	pub fn tls_established(&mut self) -> Output {
		self.tls_active = true;
		self.capabilities = Capabilities::default();
		self.state = State::SentEhlo;
		Output::Command(Command::Ehlo(self.hello.clone()))
	}

	/// Start a transaction for one message. Returns None unless the session is
	/// authenticated and idle.
	pub fn send(&mut self, envelope: Envelope) -> Option<Output> {
		if self.state != State::Ready {
			return None;
		}

		let command = Command::Mail(envelope.reverse_path.clone());
		self.pending = Some(envelope);
		self.delivery = None;
		self.state = State::SentMail;
		Some(Output::Command(command))
	}

	pub fn take_delivery(&mut self) -> Option<Delivery> {
		self.delivery.take()
	}

	pub fn quit(&mut self) -> Output {
		self.state = State::SentQuit;
		Output::Command(Command::Quit)
	}

	pub fn is_ready(&self) -> bool {
		self.state == State::Ready
	}

	pub fn should_exit(&self) -> bool {
		self.state == State::Closed
	}

	fn process_reply(&mut self, response: Response) -> Result<Option<Output>, ClientError> {
		let code = response.code;

		let output = match self.state {
			State::Initiated => match code {
				ResponseCode::ServiceReady => {
					self.state = State::SentEhlo;
					Output::Command(Command::Ehlo(self.hello.clone()))
				}
				_ => return Err(ClientError::Greeting(response)),
			},
			State::SentEhlo => {
				if !code.is_completion() {
					return Err(ClientError::Hello(response));
				}
				self.capabilities = Capabilities::from_ehlo(&response);

				if self.starttls && !self.tls_active {
					if !self.capabilities.starttls {
						return Err(ClientError::StartTlsUnavailable);
					}
					self.state = State::SentStartTls;
					Output::Command(Command::StartTls)
				} else {
					self.authenticate()
				}
			}
			State::SentStartTls => match code {
				ResponseCode::ServiceReady => {
					self.state = State::AwaitingTls;
					Output::StartTls
				}
				_ => return Err(ClientError::StartTls(response)),
			},
			State::AwaitingTls => return Err(ClientError::Unexpected("upgrading to TLS", response)),
			State::SentAuth(mechanism) => match (mechanism, code) {
				(_, ResponseCode::AuthSucceeded) => {
					self.state = State::Ready;
					return Ok(None);
				}
				(Mechanism::Login, ResponseCode::ServerChallenge) => {
					self.state = State::SentUsername;
					Output::Command(Command::AuthResponse(encode(&self.username)))
				}
				_ => return Err(ClientError::Authentication(response)),
			},
			State::SentUsername => match code {
				ResponseCode::ServerChallenge => {
					self.state = State::SentSecret;
					Output::Command(Command::AuthResponse(encode(self.secret.expose_secret())))
				}
				_ => return Err(ClientError::Authentication(response)),
			},
			State::SentSecret => match code {
				ResponseCode::AuthSucceeded => {
					self.state = State::Ready;
					return Ok(None);
				}
				_ => return Err(ClientError::Authentication(response)),
			},
			State::Ready => return Err(ClientError::Unexpected("idle", response)),
			State::SentMail => {
				if code.is_negative() {
					return Ok(Some(self.reject(response)));
				}

				match self.pending.as_ref() {
					Some(envelope) => {
						self.state = State::SentRcpt;
						Output::Command(Command::Rcpt(envelope.forward_path.clone()))
					}
					None => return Err(ClientError::Unexpected("sending MAIL", response)),
				}
			}
			State::SentRcpt => {
				if code.is_negative() {
					return Ok(Some(self.reject(response)));
				}
				self.state = State::SentData;
				Output::Command(Command::Data)
			}
			State::SentData => match code {
				ResponseCode::StartMailInput => match self.pending.take() {
					Some(envelope) => {
						self.state = State::SentPayload;
						Output::Data(envelope.data)
					}
					None => return Err(ClientError::Unexpected("sending DATA", response)),
				},
				_ => return Ok(Some(self.reject(response))),
			},
			State::SentPayload => {
				// The transaction is over either way, no RSET needed
				self.delivery = Some(if code.is_completion() {
					Delivery::Accepted
				} else {
					Delivery::Rejected(response)
				});
				self.state = State::Ready;
				return Ok(None);
			}
			State::SentRset => {
				if code.is_negative() {
					warn!("server refused RSET: {}", response);
				}
				self.state = State::Ready;
				return Ok(None);
			}
			State::SentQuit => {
				if code != ResponseCode::ServiceClosing {
					// RFC says server MUST send the 221 service closing
					// we're still allowed to exit if it's not 221
					warn!("server sent something other than a 221 to our quit: {}", response);
				}
				self.state = State::Closed;
				return Ok(None);
			}
			State::Closed => return Err(ClientError::Unexpected("closed", response)),
		};

		Ok(Some(output))
	}

	fn authenticate(&mut self) -> Output {
		let mechanism = self.capabilities.mechanism();

		match mechanism {
			Mechanism::Plain => {
				let payload = format!("\0{}\0{}", self.username, self.secret.expose_secret());
				self.state = State::SentAuth(mechanism);
				Output::Command(Command::Auth(mechanism, Some(encode(&payload))))
			}
			Mechanism::Login => {
				self.state = State::SentAuth(mechanism);
				Output::Command(Command::Auth(mechanism, None))
			}
		}
	}

	fn reject(&mut self, response: Response) -> Output {
		self.pending = None;
		self.delivery = Some(Delivery::Rejected(response));
		self.state = State::SentRset;
		Output::Command(Command::Rset)
	}
}

fn encode(value: &str) -> String {
	base64::engine::general_purpose::STANDARD.encode(value.as_bytes())
}

/// The parts of an EHLO reply we act on.
#[derive(Clone, Debug, Default, PartialEq)]
struct Capabilities {
	starttls: bool,
	auth: Vec<String>,
}

impl Capabilities {
	fn from_ehlo(response: &Response) -> Self {
		let mut caps = Self::default();

		// The first line is the server greeting itself
		for line in response.messages().iter().skip(1) {
			let upper = line.to_ascii_uppercase();
			let mut words = upper.split(|c: char| c == ' ' || c == '=');

			match words.next() {
				Some("STARTTLS") => caps.starttls = true,
				Some("AUTH") => caps.auth.extend(words.map(String::from)),
				_ => (),
			}
		}

		caps
	}

	/// PLAIN unless the server says it only does LOGIN.
	fn mechanism(&self) -> Mechanism {
		let offers = |name: &str| self.auth.iter().any(|m| m == name);

		if !offers("PLAIN") && offers("LOGIN") {
			Mechanism::Login
		} else {
			Mechanism::Plain
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
	Initiated,
	SentEhlo,
	SentStartTls,
	AwaitingTls,
	SentAuth(Mechanism),
	SentUsername,
	SentSecret,
	Ready,
	SentMail,
	SentRcpt,
	SentData,
	SentPayload,
	SentRset,
	SentQuit,
	Closed,
}

#[derive(Debug)]
pub enum Output {
	Command(Command),
	Data(String),
	/// Perform a TLS handshake on the connection, then call [Client::tls_established]
	StartTls,
}

impl Output {
	pub fn redacted(&self) -> String {
		match self {
			Self::Command(command) => command.redacted(),
			Self::Data(data) => format!("<{} bytes of data>", data.len()),
			Self::StartTls => String::from("<tls handshake>"),
		}
	}
}

impl Display for Output {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Command(command) => write!(f, "{}\r\n", command),
			Self::Data(data) => write!(f, "{}.\r\n", data),
			Self::StartTls => Ok(()),
		}
	}
}

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("server did not greet us: {0}")]
	Greeting(Response),
	#[error("server refused EHLO: {0}")]
	Hello(Response),
	#[error("server does not offer STARTTLS")]
	StartTlsUnavailable,
	#[error("server refused STARTTLS: {0}")]
	StartTls(Response),
	#[error("authentication failed: {0}")]
	Authentication(Response),
	#[error("could not parse the server reply")]
	Unparseable(#[from] ParseResponseError),
	#[error("unexpected reply while {0}: {1}")]
	Unexpected(&'static str, Response),
}

#[cfg(test)]
mod test {
	use super::*;

	fn client(starttls: bool) -> Client {
		Client::initiate(
			Domain::Name(String::from("client.x.com")),
			starttls,
			String::from("me@x.com"),
			SecretString::new(String::from("hunter2")),
		)
	}

	fn line(output: Option<Output>) -> String {
		output.expect("expected output").to_string()
	}

	fn authenticated() -> Client {
		let mut client = client(false);
		client.push("220 ready\r\n").unwrap();
		client.push("250-hi\r\n250 AUTH PLAIN\r\n").unwrap();
		assert!(client.push("235 ok\r\n").unwrap().is_none());
		assert!(client.is_ready());
		client
	}

	fn envelope(to: &str) -> Envelope {
		Envelope::plain(
			"me@x.com".parse().unwrap(),
			to.parse().unwrap(),
			"s",
			"b",
			&Domain::Name(String::from("client.x.com")),
		)
	}

	#[test]
	fn starttls_then_plain_auth() {
		let mut client = client(true);

		assert_eq!(line(client.push("220 smtp.x.com ESMTP\r\n").unwrap()), "EHLO client.x.com\r\n");
		// partial multiline reply waits for the rest
		assert!(client.push("250-smtp.x.com\r\n").unwrap().is_none());
		assert_eq!(line(client.push("250 STARTTLS\r\n").unwrap()), "STARTTLS\r\n");
		assert!(matches!(client.push("220 go ahead\r\n").unwrap(), Some(Output::StartTls)));

		assert_eq!(client.tls_established().to_string(), "EHLO client.x.com\r\n");
		let auth = line(client.push("250-smtp.x.com\r\n250 AUTH LOGIN PLAIN\r\n").unwrap());
		// base64 of "\0me@x.com\0hunter2"
		assert_eq!(auth, "AUTH PLAIN AG1lQHguY29tAGh1bnRlcjI=\r\n");

		assert!(client.push("235 accepted\r\n").unwrap().is_none());
		assert!(client.is_ready());
	}

	#[test]
	fn login_auth_when_plain_missing() {
		let mut client = client(false);
		client.push("220 ready\r\n").unwrap();

		let auth = client.push("250-hi\r\n250 AUTH LOGIN\r\n").unwrap().unwrap();
		assert_eq!(auth.to_string(), "AUTH LOGIN\r\n");
		assert_eq!(line(client.push("334 VXNlcm5hbWU6\r\n").unwrap()), "bWVAeC5jb20=\r\n");

		let secret = client.push("334 UGFzc3dvcmQ6\r\n").unwrap().unwrap();
		assert_eq!(secret.redacted(), "<redacted>");
		assert_eq!(secret.to_string(), "aHVudGVyMg==\r\n");

		client.push("235 ok\r\n").unwrap();
		assert!(client.is_ready());
	}

	#[test]
	fn missing_starttls_is_fatal() {
		let mut client = client(true);
		client.push("220 ready\r\n").unwrap();

		assert!(matches!(
			client.push("250 hi\r\n"),
			Err(ClientError::StartTlsUnavailable)
		));
	}

	#[test]
	fn bad_credentials_are_fatal() {
		let mut client = client(false);
		client.push("220 ready\r\n").unwrap();
		client.push("250 hi\r\n").unwrap();

		assert!(matches!(
			client.push("535 5.7.8 Username and Password not accepted\r\n"),
			Err(ClientError::Authentication(_))
		));
	}

	#[test]
	fn bad_greeting_is_fatal() {
		let mut client = client(false);

		assert!(matches!(
			client.push("554 go away\r\n"),
			Err(ClientError::Greeting(_))
		));
	}

	#[test]
	fn accepted_message() {
		let mut client = authenticated();

		assert_eq!(line(client.send(envelope("a@x.com"))), "MAIL FROM:<me@x.com>\r\n");
		assert_eq!(line(client.push("250 ok\r\n").unwrap()), "RCPT TO:<a@x.com>\r\n");
		assert_eq!(line(client.push("250 ok\r\n").unwrap()), "DATA\r\n");

		let data = line(client.push("354 go\r\n").unwrap());
		assert!(data.ends_with("\r\nb\r\n.\r\n"));

		assert!(client.push("250 queued\r\n").unwrap().is_none());
		assert!(matches!(client.take_delivery(), Some(Delivery::Accepted)));
		assert!(client.is_ready());
	}

	#[test]
	fn rejected_recipient_resets() {
		let mut client = authenticated();

		client.send(envelope("b@x.com"));
		client.push("250 ok\r\n").unwrap();
		assert_eq!(line(client.push("550 no such user\r\n").unwrap()), "RSET\r\n");
		assert!(!client.is_ready());

		client.push("250 flushed\r\n").unwrap();
		assert!(client.is_ready());
		match client.take_delivery() {
			Some(Delivery::Rejected(response)) => {
				assert_eq!(response.code, ResponseCode::PermanentMailFail)
			}
			other => panic!("expected rejection, got {:?}", other),
		}
	}

	#[test]
	fn send_refused_while_busy() {
		let mut client = authenticated();

		assert!(client.send(envelope("a@x.com")).is_some());
		assert!(client.send(envelope("b@x.com")).is_none());
	}

	#[test]
	fn quit_tolerates_odd_reply() {
		let mut client = authenticated();

		assert_eq!(client.quit().to_string(), "QUIT\r\n");
		client.push("250 whatever\r\n").unwrap();
		assert!(client.should_exit());
	}
}
