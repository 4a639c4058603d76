use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
	Ok,
	No,
	Bad,
	PreAuth,
	Bye,
}

impl std::str::FromStr for Status {
	type Err = ParseResponseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"OK" => Ok(Status::Ok),
			"NO" => Ok(Status::No),
			"BAD" => Ok(Status::Bad),
			"PREAUTH" => Ok(Status::PreAuth),
			"BYE" => Ok(Status::Bye),
			_ => Err(ParseResponseError::UnknownStatus(s.to_owned())),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum Response {
	Tagged {
		tag: String,
		status: Status,
		text: String,
	},
	/// `* ...`. Literals are pulled out of the text in the order they appear.
	Untagged {
		text: String,
		literals: Vec<Vec<u8>>,
	},
	Continue(String),
}

impl Response {
	/// The status of an untagged status response such as the greeting.
	pub fn untagged_status(&self) -> Option<Status> {
		match self {
			Response::Untagged { text, .. } => text.split(' ').next()?.parse().ok(),
			_ => None,
		}
	}

	/// Message numbers from a `* SEARCH` response.
	pub fn search_ids(&self) -> Option<Vec<u32>> {
		let Response::Untagged { text, .. } = self else {
			return None;
		};

		let mut words = text.split_ascii_whitespace();
		if !words.next()?.eq_ignore_ascii_case("SEARCH") {
			return None;
		}

		Some(words.filter_map(|id| id.parse().ok()).collect())
	}

	/// The message number and first literal of a `* n FETCH` response.
	pub fn into_fetched(self) -> Option<(u32, Vec<u8>)> {
		let Response::Untagged { text, literals } = self else {
			return None;
		};

		let mut words = text.split_ascii_whitespace();
		let id = words.next()?.parse().ok()?;
		if !words.next()?.eq_ignore_ascii_case("FETCH") {
			return None;
		}

		literals.into_iter().next().map(|body| (id, body))
	}
}

/// Splits an incoming byte stream into responses. Bytes can arrive in any
/// chunking; a response is only returned once all of it, literals included,
/// has been pushed.
#[derive(Default)]
pub struct ResponseReader {
	buffer: Vec<u8>,
}

impl ResponseReader {
	pub fn push(&mut self, bytes: &[u8]) {
		self.buffer.extend_from_slice(bytes);
	}

	pub fn next(&mut self) -> Result<Option<Response>, ParseResponseError> {
		let mut text = String::new();
		let mut literals = vec![];
		let mut pos = 0;

		loop {
			let Some(eol) = find_crlf(&self.buffer[pos..]) else {
				return Ok(None);
			};
			let line = &self.buffer[pos..pos + eol];

			match literal_length(line) {
				Some((prefix, length)) => {
					let start = pos + eol + 2;
					if self.buffer.len() < start + length {
						return Ok(None);
					}

					text.push_str(&String::from_utf8_lossy(prefix));
					literals.push(self.buffer[start..start + length].to_vec());
					pos = start + length;
				}
				None => {
					text.push_str(&String::from_utf8_lossy(line));
					self.buffer.drain(..pos + eol + 2);
					return parse(text, literals).map(Some);
				}
			}
		}
	}
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
	bytes.windows(2).position(|w| w == b"\r\n")
}

/// A line announcing a literal ends in `{n}` (or `{n+}`). Returns the line
/// without that suffix and n.
fn literal_length(line: &[u8]) -> Option<(&[u8], usize)> {
	let inner = line.strip_suffix(b"}")?;
	let open = inner.iter().rposition(|&b| b == b'{')?;
	let digits = &inner[open + 1..];
	let digits = digits.strip_suffix(b"+").unwrap_or(digits);

	if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
		return None;
	}

	let length = std::str::from_utf8(digits).ok()?.parse().ok()?;
	Some((&line[..open], length))
}

fn parse(text: String, literals: Vec<Vec<u8>>) -> Result<Response, ParseResponseError> {
	if let Some(rest) = text.strip_prefix("* ") {
		return Ok(Response::Untagged {
			text: rest.to_owned(),
			literals,
		});
	}

	if let Some(rest) = text.strip_prefix('+') {
		return Ok(Response::Continue(rest.trim_start().to_owned()));
	}

	let mut parts = text.splitn(3, ' ');
	match (parts.next(), parts.next()) {
		(Some(tag), Some(status)) if !tag.is_empty() => Ok(Response::Tagged {
			tag: tag.to_owned(),
			status: status.parse()?,
			text: parts.next().unwrap_or_default().to_owned(),
		}),
		_ => Err(ParseResponseError::Malformed(text)),
	}
}

#[derive(Debug, Error)]
pub enum ParseResponseError {
	#[error("unknown response status {0}")]
	UnknownStatus(String),
	#[error("malformed response: {0}")]
	Malformed(String),
}
