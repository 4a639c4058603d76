use std::{
	future::Future,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
	time::Duration,
};

use log::info;
use rustls::{pki_types::ServerName, ClientConfig, RootCertStore};
use thiserror::Error;
use tokio::{
	io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf},
	net::TcpStream,
	time::{error::Elapsed, timeout},
};
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::config::{Endpoint, Security};

pub mod mailbox;
pub mod submit;

#[cfg(test)]
pub(crate) mod script;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
// generous, the server may sit on DATA for a while
const IO_TIMEOUT: Duration = Duration::from_secs(60);

/// A connection a protocol driver can talk over, and upgrade to TLS when the
/// protocol asks for it.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + Sized {
	fn upgrade(self, host: &str) -> impl Future<Output = Result<Self, NetError>> + Send;
}

pub enum MailStream {
	Plain(TcpStream),
	Tls(Box<TlsStream<TcpStream>>),
}

/// Opens a connection to `endpoint`, already encrypted when it uses implicit TLS.
pub async fn connect(endpoint: &Endpoint) -> Result<MailStream, NetError> {
	info!("connecting to {}", endpoint);

	let tcp = timeout(
		CONNECT_TIMEOUT,
		TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
	)
	.await??;

	match endpoint.security {
		Security::Tls => Ok(MailStream::Tls(Box::new(handshake(tcp, &endpoint.host).await?))),
		Security::StartTls | Security::None => Ok(MailStream::Plain(tcp)),
	}
}

async fn handshake(tcp: TcpStream, host: &str) -> Result<TlsStream<TcpStream>, NetError> {
	let mut roots = RootCertStore::empty();
	roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

	let config = ClientConfig::builder()
		.with_root_certificates(roots)
		.with_no_client_auth();
	let connector = TlsConnector::from(Arc::new(config));
	let name = ServerName::try_from(host.to_owned())
		.map_err(|_| NetError::InvalidServerName(host.to_owned()))?;

	let stream = timeout(CONNECT_TIMEOUT, connector.connect(name, tcp))
		.await?
		.map_err(NetError::Tls)?;

	info!("TLS established with {}", host);
	Ok(stream)
}

impl Transport for MailStream {
	async fn upgrade(self, host: &str) -> Result<Self, NetError> {
		match self {
			MailStream::Plain(tcp) => Ok(MailStream::Tls(Box::new(handshake(tcp, host).await?))),
			already @ MailStream::Tls(_) => Ok(already),
		}
	}
}

impl AsyncRead for MailStream {
	fn poll_read(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<io::Result<()>> {
		match self.get_mut() {
			MailStream::Plain(tcp) => Pin::new(tcp).poll_read(cx, buf),
			MailStream::Tls(tls) => Pin::new(tls.as_mut()).poll_read(cx, buf),
		}
	}
}

impl AsyncWrite for MailStream {
	fn poll_write(
		self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &[u8],
	) -> Poll<io::Result<usize>> {
		match self.get_mut() {
			MailStream::Plain(tcp) => Pin::new(tcp).poll_write(cx, buf),
			MailStream::Tls(tls) => Pin::new(tls.as_mut()).poll_write(cx, buf),
		}
	}

	fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		match self.get_mut() {
			MailStream::Plain(tcp) => Pin::new(tcp).poll_flush(cx),
			MailStream::Tls(tls) => Pin::new(tls.as_mut()).poll_flush(cx),
		}
	}

	fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		match self.get_mut() {
			MailStream::Plain(tcp) => Pin::new(tcp).poll_shutdown(cx),
			MailStream::Tls(tls) => Pin::new(tls.as_mut()).poll_shutdown(cx),
		}
	}
}

/// Reads whatever is available. A zero sized read means the server hung up.
pub(crate) async fn read<T: AsyncRead + Unpin>(stream: &mut T, buf: &mut [u8]) -> Result<usize, NetError> {
	let read = timeout(IO_TIMEOUT, stream.read(buf)).await??;

	if read == 0 {
		return Err(NetError::ConnectionClosed);
	}

	Ok(read)
}

pub(crate) async fn write<T: AsyncWrite + Unpin>(stream: &mut T, bytes: &[u8]) -> Result<(), NetError> {
	timeout(IO_TIMEOUT, stream.write_all(bytes)).await??;
	timeout(IO_TIMEOUT, stream.flush()).await??;
	Ok(())
}

#[derive(Debug, Error)]
pub enum NetError {
	#[error("timed out waiting for the server")]
	ConnectionTimeout(#[from] Elapsed),
	#[error("connection unexpectedly closed by server")]
	ConnectionClosed,
	#[error("there was an error talking to the host: {0}")]
	ConnectionError(#[from] std::io::Error),
	#[error("'{0}' is not a valid TLS server name")]
	InvalidServerName(String),
	#[error("TLS handshake failed: {0}")]
	Tls(std::io::Error),
}
