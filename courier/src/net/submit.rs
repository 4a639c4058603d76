use log::debug;
use thiserror::Error;

use crate::smtp::{Client, ClientError, Delivery, Envelope, Output};

use super::{read, write, NetError, Transport};

/// Drives a [Client] over a live connection. Handles the low level reading
/// and writing and passes strings back and forth with the state machine.
pub struct SubmitSession<T> {
	stream: Option<T>,
	host: String,
	client: Client,
	buf: Vec<u8>,
}

impl<T: Transport> SubmitSession<T> {
	/// Reads the greeting and runs the session up to an authenticated, idle
	/// state.
	pub async fn establish(stream: T, host: &str, client: Client) -> Result<Self, SubmitError> {
		let mut session = Self {
			stream: Some(stream),
			host: host.to_owned(),
			client,
			buf: vec![0; 1024],
		};

		session.drive(Client::is_ready).await?;
		Ok(session)
	}

	/// Runs one MAIL/RCPT/DATA transaction. A rejection by the server is an
	/// `Ok`, only a broken session is an error.
	pub async fn deliver(&mut self, envelope: Envelope) -> Result<Delivery, SubmitError> {
		let output = self.client.send(envelope).ok_or(SubmitError::NotReady)?;
		self.emit(output).await?;
		self.drive(Client::is_ready).await?;

		self.client.take_delivery().ok_or(SubmitError::NotReady)
	}

	pub async fn close(mut self) -> Result<(), SubmitError> {
		let output = self.client.quit();
		self.emit(output).await?;
		self.drive(Client::should_exit).await
	}

	async fn drive(&mut self, done: fn(&Client) -> bool) -> Result<(), SubmitError> {
		while !done(&self.client) {
			let stream = self.stream.as_mut().ok_or(NetError::ConnectionClosed)?;
			let read = read(stream, &mut self.buf).await?;

			let reply = String::from_utf8_lossy(&self.buf[..read]).into_owned();
			if let Some(output) = self.client.push(&reply)? {
				self.emit(output).await?;
			}
		}

		Ok(())
	}

	async fn emit(&mut self, output: Output) -> Result<(), SubmitError> {
		debug!("C: {}", output.redacted());

		match output {
			Output::StartTls => {
				let stream = self.stream.take().ok_or(NetError::ConnectionClosed)?;
				self.stream = Some(stream.upgrade(&self.host).await?);

				let ehlo = self.client.tls_established();
				debug!("C: {}", ehlo.redacted());
				self.write(ehlo).await
			}
			other => self.write(other).await,
		}
	}

	async fn write(&mut self, output: Output) -> Result<(), SubmitError> {
		let stream = self.stream.as_mut().ok_or(NetError::ConnectionClosed)?;
		Ok(write(stream, output.to_string().as_bytes()).await?)
	}
}

#[derive(Debug, Error)]
pub enum SubmitError {
	#[error(transparent)]
	Net(#[from] NetError),
	#[error(transparent)]
	Protocol(#[from] ClientError),
	#[error("the session is not ready to send")]
	NotReady,
}
