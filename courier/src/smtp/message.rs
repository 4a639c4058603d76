use std::time::SystemTime;

use base64::Engine;
use rand::Rng;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use super::args::{Domain, Path};

/// One message for one recipient, ready to go over the wire.
#[derive(Clone, Debug)]
pub struct Envelope {
	pub reverse_path: Path,
	pub forward_path: Path,
	pub data: String,
}

impl Envelope {
	/// Builds a plain-text message from `from` to `to`. The data is CRLF
	/// terminated and dot-stuffed.
	pub fn plain(from: Path, to: Path, subject: &str, body: &str, host: &Domain) -> Self {
		let mut data = String::new();
		let mut header = |name: &str, value: &str| {
			data.push_str(&format!("{}: {}\r\n", name, value));
		};

		header("From", &from.address());
		header("To", &to.address());
		header("Subject", &encode_header(subject));
		if let Some(date) = date_header() {
			header("Date", &date);
		}
		header("Message-ID", &message_id(host));
		header("MIME-Version", "1.0");
		header("Content-Type", "text/plain; charset=utf-8");
		header("Content-Transfer-Encoding", "8bit");
		data.push_str("\r\n");
		data.push_str(&dot_stuff(body));

		Self {
			reverse_path: from,
			forward_path: to,
			data,
		}
	}
}

// 45 bytes encode to 60 characters, which with the 12 characters around them
// stays under the 75 an encoded-word may be
const ENCODED_WORD_BYTES: usize = 45;

/// Header values have to be ASCII. Anything else goes out as RFC 2047
/// encoded-words, folded onto continuation lines.
fn encode_header(value: &str) -> String {
	// Folded lines would let a template inject headers
	let value = value.replace(['\r', '\n'], " ");

	if value.is_ascii() {
		return value;
	}

	let mut words = vec![];
	let mut start = 0;
	for (idx, ch) in value.char_indices() {
		if idx + ch.len_utf8() - start > ENCODED_WORD_BYTES {
			words.push(&value[start..idx]);
			start = idx;
		}
	}
	words.push(&value[start..]);

	words
		.into_iter()
		.map(|word| {
			let encoded = base64::engine::general_purpose::STANDARD.encode(word.as_bytes());
			format!("=?utf-8?B?{}?=", encoded)
		})
		.collect::<Vec<_>>()
		.join("\r\n ")
}

fn date_header() -> Option<String> {
	let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
	now.format(&Rfc2822).ok()
}

fn message_id(host: &Domain) -> String {
	let secs = SystemTime::now()
		.duration_since(SystemTime::UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or_default();
	let middle: u32 = rand::thread_rng().gen();

	format!("<{}.{:08x}@{}>", secs, middle, host)
}

/// Normalises line endings to CRLF and doubles leading periods so a line
/// holding a single `.` cannot end DATA early.
fn dot_stuff(body: &str) -> String {
	let mut stuffed = String::with_capacity(body.len() + 16);

	for line in body.trim_end_matches(['\r', '\n']).split('\n') {
		let line = line.strip_suffix('\r').unwrap_or(line);
		if line.starts_with('.') {
			stuffed.push('.');
		}
		stuffed.push_str(line);
		stuffed.push_str("\r\n");
	}

	stuffed
}

#[cfg(test)]
mod test {
	use super::*;

	fn envelope(subject: &str, body: &str) -> Envelope {
		Envelope::plain(
			"me@x.com".parse().unwrap(),
			"you@x.com".parse().unwrap(),
			subject,
			body,
			&Domain::Name(String::from("client.x.com")),
		)
	}

	#[test]
	fn headers_and_body() {
		let env = envelope("Hello", "Line one\nLine two");
		let (head, body) = env.data.split_once("\r\n\r\n").unwrap();

		assert!(head.starts_with("From: me@x.com\r\nTo: you@x.com\r\nSubject: Hello\r\n"));
		assert!(head.contains("Content-Type: text/plain; charset=utf-8"));
		assert!(head.contains("@client.x.com>"));
		assert_eq!(body, "Line one\r\nLine two\r\n");
	}

	#[test]
	fn non_ascii_subject_is_encoded() {
		let env = envelope("Grüße", "hi");

		assert!(env.data.contains("Subject: =?utf-8?B?R3LDvMOfZQ==?=\r\n"));
	}

	#[test]
	fn long_subject_is_folded() {
		let subject = "Überraschung für alle Empfänger: ".repeat(4);
		let folded = encode_header(&subject);

		let words: Vec<&str> = folded.split("\r\n ").collect();
		assert!(words.len() > 1);

		let mut decoded = vec![];
		for word in words {
			assert!(word.len() <= 75, "{} is too long", word);
			let inner = word.strip_prefix("=?utf-8?B?").unwrap().strip_suffix("?=").unwrap();
			decoded.extend(base64::engine::general_purpose::STANDARD.decode(inner).unwrap());
		}
		assert_eq!(String::from_utf8(decoded).unwrap(), subject);
	}

	#[test]
	fn subject_cannot_inject_headers() {
		let env = envelope("Hi\r\nBcc: everyone@x.com", "hi");

		assert!(!env.data.contains("\r\nBcc:"));
	}

	#[test]
	fn dot_stuffing() {
		assert_eq!(dot_stuff(".\n..two\r\nthree\n"), "..\r\n...two\r\nthree\r\n");
		assert_eq!(dot_stuff(""), "\r\n");
	}
}
