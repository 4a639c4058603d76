//! A scripted server on the far end of an in-memory pipe.

use std::future::Future;

use tokio::{
	io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream},
	task::JoinHandle,
};

use super::{NetError, Transport};

// The pipe has no TLS to upgrade to, the protocol carries on in the clear
impl Transport for DuplexStream {
	fn upgrade(self, _host: &str) -> impl Future<Output = Result<Self, NetError>> + Send {
		async move { Ok(self) }
	}
}

#[derive(Clone, Copy)]
pub enum Step {
	/// Write these bytes to the client
	Send(&'static str),
	/// Read one line and check it starts with this
	Expect(&'static str),
	/// Read message data up to and including the lone "."
	ExpectData,
	/// Hang up
	Close,
}

/// Runs `script` against whatever is written to the returned stream. The
/// handle resolves to every line the client sent.
pub fn serve(script: Vec<Step>) -> (DuplexStream, JoinHandle<Vec<String>>) {
	let (client, server) = duplex(64 * 1024);

	let handle = tokio::spawn(async move {
		let mut server = BufReader::new(server);
		let mut received = vec![];

		for step in script {
			match step {
				Step::Send(text) => server.get_mut().write_all(text.as_bytes()).await.unwrap(),
				Step::Expect(prefix) => {
					let line = read_line(&mut server).await;
					assert!(line.starts_with(prefix), "expected {:?}, got {:?}", prefix, line);
					received.push(line);
				}
				Step::ExpectData => loop {
					let line = read_line(&mut server).await;
					let done = line == ".\r\n";
					received.push(line);
					if done {
						break;
					}
				},
				Step::Close => return received,
			}
		}

		received
	});

	(client, handle)
}

async fn read_line(server: &mut BufReader<DuplexStream>) -> String {
	let mut line = String::new();
	server.read_line(&mut line).await.unwrap();
	line
}
