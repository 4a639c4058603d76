use log::{debug, warn};
use thiserror::Error;

use crate::{
	config::Security,
	imap::{Command, ParseResponseError, Response, ResponseReader, Status, Tagger},
};

use super::{read, write, NetError, Transport};

/// An IMAP connection, one command in flight at a time.
pub struct ImapSession<T> {
	stream: T,
	reader: ResponseReader,
	tags: Tagger,
	preauthenticated: bool,
	buf: Vec<u8>,
}

/// The tagged result of a command and everything the server said before it.
struct Completion {
	status: Status,
	text: String,
	untagged: Vec<Response>,
}

impl<T: Transport> ImapSession<T> {
	/// Waits for the greeting, upgrading to TLS first when `security` says so.
	pub async fn establish(stream: T, host: &str, security: Security) -> Result<Self, MailboxError> {
		let mut session = Self {
			stream,
			reader: ResponseReader::default(),
			tags: Tagger::default(),
			preauthenticated: false,
			buf: vec![0; 8192],
		};

		let greeting = session.next_response().await?;
		match greeting.untagged_status() {
			Some(Status::Ok) => (),
			Some(Status::PreAuth) => session.preauthenticated = true,
			_ => return Err(MailboxError::Greeting(format!("{:?}", greeting))),
		}

		if security == Security::StartTls {
			session.run(Command::StartTls).await?.expect_ok("STARTTLS")?;
			session.stream = session.stream.upgrade(host).await?;
		}

		Ok(session)
	}

	pub async fn login(&mut self, username: &str, password: &str) -> Result<(), MailboxError> {
		if self.preauthenticated {
			return Ok(());
		}

		let login = Command::Login {
			username: username.to_owned(),
			password: password.to_owned(),
		};
		self.run(login).await?.expect_ok("LOGIN")?;
		Ok(())
	}

	pub async fn select(&mut self, mailbox: &str) -> Result<(), MailboxError> {
		self.run(Command::Select(mailbox.to_owned()))
			.await?
			.expect_ok("SELECT")?;
		Ok(())
	}

	/// Message numbers of everything whose From matches `sender`.
	pub async fn search_from(&mut self, sender: &str) -> Result<Vec<u32>, MailboxError> {
		let untagged = self
			.run(Command::SearchFrom(sender.to_owned()))
			.await?
			.expect_ok("SEARCH")?;

		Ok(untagged.iter().filter_map(Response::search_ids).flatten().collect())
	}

	/// The raw message, or None when the server will not hand this one over.
	pub async fn fetch(&mut self, id: u32) -> Result<Option<Vec<u8>>, MailboxError> {
		let completion = self.run(Command::Fetch(id)).await?;

		if completion.status != Status::Ok {
			warn!("server refused to fetch message {}: {}", id, completion.text);
			return Ok(None);
		}

		Ok(completion
			.untagged
			.into_iter()
			.filter_map(Response::into_fetched)
			.find(|(fetched, _)| *fetched == id)
			.map(|(_, body)| body))
	}

	pub async fn logout(mut self) -> Result<(), MailboxError> {
		match self.run(Command::Logout).await {
			// servers are allowed to hang up right after the BYE
			Err(MailboxError::Net(NetError::ConnectionClosed)) => Ok(()),
			other => other.map(|_| ()),
		}
	}

	async fn run(&mut self, command: Command) -> Result<Completion, MailboxError> {
		let tag = self.tags.next();
		debug!("C: {} {}", tag, command.redacted());
		write(&mut self.stream, command.tagged(&tag).as_bytes()).await?;

		let mut untagged = vec![];
		loop {
			match self.next_response().await? {
				Response::Tagged {
					tag: done,
					status,
					text,
				} if done == tag => {
					debug!("S: {} {:?} {}", done, status, text);
					return Ok(Completion {
						status,
						text,
						untagged,
					});
				}
				Response::Tagged { tag, .. } => warn!("ignoring completion for unknown tag {}", tag),
				Response::Continue(text) => return Err(MailboxError::UnexpectedContinuation(text)),
				response => untagged.push(response),
			}
		}
	}

	async fn next_response(&mut self) -> Result<Response, MailboxError> {
		loop {
			if let Some(response) = self.reader.next()? {
				return Ok(response);
			}

			let read = read(&mut self.stream, &mut self.buf).await?;
			self.reader.push(&self.buf[..read]);
		}
	}
}

impl Completion {
	fn expect_ok(self, command: &'static str) -> Result<Vec<Response>, MailboxError> {
		match self.status {
			Status::Ok => Ok(self.untagged),
			_ => Err(MailboxError::Refused {
				command,
				text: self.text,
			}),
		}
	}
}

#[derive(Debug, Error)]
pub enum MailboxError {
	#[error(transparent)]
	Net(#[from] NetError),
	#[error("could not understand the server: {0}")]
	Parse(#[from] ParseResponseError),
	#[error("server did not greet us: {0}")]
	Greeting(String),
	#[error("server refused {command}: {text}")]
	Refused { command: &'static str, text: String },
	#[error("server asked for more input than we had: {0}")]
	UnexpectedContinuation(String),
}
