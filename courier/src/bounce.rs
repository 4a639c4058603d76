use std::{
	collections::{BTreeSet, HashSet},
	sync::OnceLock,
};

use log::{debug, info, warn};
use mailparse::{parse_mail, MailParseError, ParsedMail};
use regex::Regex;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::{
	config::{Config, Endpoint},
	net::{
		self,
		mailbox::{ImapSession, MailboxError},
		NetError, Transport,
	},
	Credentials,
};

/// Recipients found bounced, deduplicated and in a stable order.
pub type BounceSet = BTreeSet<String>;

fn notice() -> &'static Regex {
	static NOTICE: OnceLock<Regex> = OnceLock::new();
	NOTICE.get_or_init(|| {
		Regex::new(r"Your message wasn['’]t delivered to ([\w.-]+@[\w.-]+)")
			.expect("bounce notice pattern is valid")
	})
}

/// The address a delivery failure notice names, if `text` contains one.
pub fn candidate(text: &str) -> Option<&str> {
	let captures = notice().captures(text)?;
	// the sentence usually ends right after the address
	let address = captures.get(1)?.as_str().trim_end_matches('.');

	(!address.is_empty()).then_some(address)
}

/// Every candidate address in a raw message. A multipart message has its
/// plain text parts scanned, a single part message its one payload, whatever
/// the type.
pub fn candidates(raw: &[u8]) -> Result<Vec<String>, MessageError> {
	let mail = parse_mail(raw)?;
	let mut found = vec![];

	if mail.subparts.is_empty() {
		scan(&mail, &mut found)?;
	} else {
		walk(&mail, &mut found)?;
	}

	Ok(found)
}

fn walk(part: &ParsedMail, found: &mut Vec<String>) -> Result<(), MessageError> {
	if !part.subparts.is_empty() {
		for sub in &part.subparts {
			walk(sub, found)?;
		}
	} else if part.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
		scan(part, found)?;
	}

	Ok(())
}

fn scan(part: &ParsedMail, found: &mut Vec<String>) -> Result<(), MessageError> {
	let body = part.get_body()?;
	if let Some(address) = candidate(&body) {
		found.push(address.to_owned());
	}

	Ok(())
}

/// Pulls the bounced addresses out of `messages`, keeping only those that
/// are in `known`. A message that can't be parsed is skipped.
pub fn reconcile<I, B>(messages: I, known: &[String]) -> BounceSet
where
	I: IntoIterator<Item = B>,
	B: AsRef<[u8]>,
{
	let known: HashSet<&str> = known.iter().map(String::as_str).collect();
	let mut bounced = BounceSet::new();

	for raw in messages {
		let found = match candidates(raw.as_ref()) {
			Ok(found) => found,
			Err(err) => {
				warn!("skipping a notice that could not be read: {}", err);
				continue;
			}
		};

		for address in found {
			if known.contains(address.as_str()) {
				bounced.insert(address);
			} else {
				debug!("{} bounced but was not one of our recipients", address);
			}
		}
	}

	bounced
}

/// Logs in to the mailbox, reads every notice from the bounce sender and
/// returns which of `known` bounced. Nothing in the mailbox is modified.
pub async fn scan_bounces<C: Config + ?Sized>(
	config: &C,
	credentials: &Credentials,
	known: &[String],
) -> Result<BounceSet, ScanError> {
	let endpoint = config.mailbox();
	let stream = net::connect(endpoint).await?;

	scan_over(
		stream,
		endpoint,
		config.mailbox_name(),
		config.bounce_sender(),
		credentials,
		known,
	)
	.await
}

pub(crate) async fn scan_over<T: Transport>(
	stream: T,
	endpoint: &Endpoint,
	mailbox: &str,
	sender: &str,
	credentials: &Credentials,
	known: &[String],
) -> Result<BounceSet, ScanError> {
	let mut session = ImapSession::establish(stream, &endpoint.host, endpoint.security).await?;
	session
		.login(credentials.address(), credentials.secret().expose_secret())
		.await?;
	session.select(mailbox).await?;

	let ids = session.search_from(sender).await?;
	info!("{} notices from {:?} in {}", ids.len(), sender, mailbox);

	let mut messages = Vec::with_capacity(ids.len());
	for id in ids {
		if let Some(raw) = session.fetch(id).await? {
			messages.push(raw);
		}
	}

	if let Err(err) = session.logout().await {
		warn!("mailbox session did not close cleanly: {}", err);
	}

	let bounced = reconcile(messages, known);
	info!("{} of {} recipients bounced", bounced.len(), known.len());
	Ok(bounced)
}

#[derive(Debug, Error)]
pub enum MessageError {
	#[error("malformed message: {0}")]
	Parse(#[from] MailParseError),
}

#[derive(Debug, Error)]
pub enum ScanError {
	#[error(transparent)]
	Connect(#[from] NetError),
	#[error(transparent)]
	Mailbox(#[from] MailboxError),
}
