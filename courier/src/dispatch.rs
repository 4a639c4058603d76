use log::{info, warn};
use thiserror::Error;

use crate::{
	config::{Config, Endpoint, Security},
	loader::Template,
	net::{
		self,
		submit::{SubmitError, SubmitSession},
		NetError, Transport,
	},
	smtp::{
		args::{Domain, ParsePathError, Path},
		Client, Delivery, Envelope,
	},
	Credentials,
};

/// Tally of one dispatch. `success + failure` is always the number of
/// recipients the dispatch was given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchResult {
	pub success: usize,
	pub failure: usize,
}

impl DispatchResult {
	pub fn total(&self) -> usize {
		self.success + self.failure
	}
}

/// Reported after every attempt, successful or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
	pub completed: usize,
	pub total: usize,
}

impl Progress {
	pub fn fraction(&self) -> f32 {
		if self.total == 0 {
			1.0
		} else {
			self.completed as f32 / self.total as f32
		}
	}
}

/// Sends `template` to every recipient, in order, over one authenticated
/// submission session.
///
/// Failing to connect or log in fails the whole call. Once the session is up,
/// a recipient the server refuses (or that is not an address at all) only
/// counts as a failure.
pub async fn dispatch<C: Config + ?Sized>(
	config: &C,
	credentials: &Credentials,
	template: &Template,
	recipients: &[String],
	progress: &mut dyn FnMut(Progress),
) -> Result<DispatchResult, DispatchError> {
	let endpoint = config.submission();
	let stream = net::connect(endpoint).await?;

	dispatch_over(
		stream,
		endpoint,
		config.hello_name(),
		credentials,
		template,
		recipients,
		progress,
	)
	.await
}

pub(crate) async fn dispatch_over<T: Transport>(
	stream: T,
	endpoint: &Endpoint,
	hello: Domain,
	credentials: &Credentials,
	template: &Template,
	recipients: &[String],
	progress: &mut dyn FnMut(Progress),
) -> Result<DispatchResult, DispatchError> {
	let sender: Path = credentials
		.address()
		.parse()
		.map_err(|err| DispatchError::Sender(credentials.address().to_owned(), err))?;

	let client = Client::initiate(
		hello.clone(),
		endpoint.security == Security::StartTls,
		credentials.address().to_owned(),
		credentials.secret().clone(),
	);
	let mut session = SubmitSession::establish(stream, &endpoint.host, client).await?;
	info!("submission session ready, sending to {} recipients", recipients.len());

	let total = recipients.len();
	let mut result = DispatchResult::default();
	let mut broken = false;

	for (idx, recipient) in recipients.iter().enumerate() {
		let accepted = if broken {
			warn!("not sending to {}: the connection was lost", recipient);
			false
		} else {
			match recipient.parse::<Path>() {
				Err(err) => {
					warn!("not sending to {:?}: {}", recipient, err);
					false
				}
				Ok(to) => {
					let envelope =
						Envelope::plain(sender.clone(), to, &template.subject, &template.body, &hello);

					match session.deliver(envelope).await {
						Ok(Delivery::Accepted) => true,
						Ok(Delivery::Rejected(response)) => {
							warn!("server rejected {}: {}", recipient, response);
							false
						}
						Err(err) => {
							warn!("lost the session while sending to {}: {}", recipient, err);
							broken = true;
							false
						}
					}
				}
			}
		};

		if accepted {
			result.success += 1;
		} else {
			result.failure += 1;
		}

		progress(Progress {
			completed: idx + 1,
			total,
		});
	}

	if !broken {
		if let Err(err) = session.close().await {
			warn!("submission session did not close cleanly: {}", err);
		}
	}

	info!("dispatch finished: {} sent, {} failed", result.success, result.failure);
	Ok(result)
}

#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("the sender address {0:?} is not valid: {1}")]
	Sender(String, ParsePathError),
	#[error(transparent)]
	Connect(#[from] NetError),
	#[error(transparent)]
	Session(#[from] SubmitError),
}

#[cfg(test)]
mod test {
	use secrecy::SecretString;

	use super::*;
	use crate::net::script::{serve, Step, Step::*};

	fn credentials() -> Credentials {
		Credentials::new("me@x.com", SecretString::new(String::from("pw"))).unwrap()
	}

	fn template() -> Template {
		Template {
			subject: String::from("News"),
			body: String::from("Hello there"),
		}
	}

	fn endpoint() -> Endpoint {
		Endpoint::new("smtp.x.com", 587, Security::None)
	}

	fn login() -> Vec<Step> {
		vec![
			Send("220 ready\r\n"),
			Expect("EHLO"),
			Send("250-hi\r\n250 AUTH PLAIN\r\n"),
			Expect("AUTH PLAIN"),
			Send("235 ok\r\n"),
		]
	}

	fn accept(to: &'static str) -> Vec<Step> {
		vec![
			Expect("MAIL FROM:<me@x.com>"),
			Send("250 ok\r\n"),
			Expect(to),
			Send("250 ok\r\n"),
			Expect("DATA"),
			Send("354 go\r\n"),
			ExpectData,
			Send("250 queued\r\n"),
		]
	}

	fn quit() -> Vec<Step> {
		vec![Expect("QUIT"), Send("221 bye\r\n")]
	}

	async fn run(script: Vec<Step>, recipients: &[&str]) -> (Result<DispatchResult, DispatchError>, Vec<Progress>) {
		let (stream, _server) = serve(script);
		let recipients: Vec<String> = recipients.iter().map(|r| r.to_string()).collect();
		let mut seen = vec![];

		let result = dispatch_over(
			stream,
			&endpoint(),
			Domain::Name(String::from("client.x.com")),
			&credentials(),
			&template(),
			&recipients,
			&mut |p| seen.push(p),
		)
		.await;

		(result, seen)
	}

	#[tokio::test]
	async fn all_delivered() {
		let script = [
			login(),
			accept("RCPT TO:<a@x.com>"),
			accept("RCPT TO:<b@x.com>"),
			accept("RCPT TO:<c@x.com>"),
			quit(),
		]
		.concat();

		let (result, progress) = run(script, &["a@x.com", "b@x.com", "c@x.com"]).await;

		assert_eq!(result.unwrap(), DispatchResult { success: 3, failure: 0 });
		assert_eq!(progress.len(), 3);
		assert_eq!(progress[2].fraction(), 1.0);
	}

	#[tokio::test]
	async fn rejected_recipient_is_counted() {
		let script = [
			login(),
			accept("RCPT TO:<a@x.com>"),
			vec![
				Expect("MAIL FROM"),
				Send("250 ok\r\n"),
				Expect("RCPT TO:<b@x.com>"),
				Send("550 5.1.1 no such user\r\n"),
				Expect("RSET"),
				Send("250 ok\r\n"),
			],
			quit(),
		]
		.concat();

		let (result, _) = run(script, &["a@x.com", "b@x.com"]).await;

		assert_eq!(result.unwrap(), DispatchResult { success: 1, failure: 1 });
	}

	#[tokio::test]
	async fn malformed_recipient_is_not_sent() {
		let script = [login(), accept("RCPT TO:<c@x.com>"), quit()].concat();

		let (result, progress) = run(script, &["not an address", "c@x.com"]).await;

		assert_eq!(result.unwrap(), DispatchResult { success: 1, failure: 1 });
		assert_eq!(progress[0], Progress { completed: 1, total: 2 });
	}

	#[tokio::test]
	async fn empty_list_still_opens_and_closes() {
		let script = [login(), quit()].concat();

		let (result, progress) = run(script, &[]).await;

		assert_eq!(result.unwrap(), DispatchResult::default());
		assert!(progress.is_empty());
	}

	#[tokio::test]
	async fn lost_connection_fails_the_rest() {
		let script = [
			login(),
			accept("RCPT TO:<a@x.com>"),
			vec![Expect("MAIL FROM"), Close],
		]
		.concat();

		let (result, progress) = run(script, &["a@x.com", "b@x.com", "c@x.com", "d@x.com"]).await;

		let result = result.unwrap();
		assert_eq!(result, DispatchResult { success: 1, failure: 3 });
		assert_eq!(result.total(), 4);
		assert_eq!(progress.len(), 4);
	}

	#[tokio::test]
	async fn failed_login_sends_nothing() {
		let script = vec![
			Send("220 ready\r\n"),
			Expect("EHLO"),
			Send("250 hi\r\n"),
			Expect("AUTH PLAIN"),
			Send("535 no\r\n"),
		];

		let (result, progress) = run(script, &["a@x.com"]).await;

		assert!(matches!(result, Err(DispatchError::Session(_))));
		assert!(progress.is_empty());
	}
}
