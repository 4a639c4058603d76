use std::num::ParseIntError;

use thiserror::Error;

/// A complete server reply, possibly spread over several lines.
#[derive(Clone, Debug)]
pub struct Response {
	pub code: ResponseCode,
	messages: Vec<String>,
}

impl Response {
	fn with_message<S: Into<String>>(code: ResponseCode, message: S) -> Self {
		Self {
			code,
			messages: vec![message.into()],
		}
	}

	fn push<S: Into<String>>(&mut self, message: S) {
		self.messages.push(message.into());
	}

	pub fn messages(&self) -> &[String] {
		&self.messages
	}

	/// Whether a buffer holds a whole reply. Only the final line of a
	/// multiline reply has a space after the code.
	pub fn is_complete(buffer: &str) -> bool {
		if !buffer.ends_with("\r\n") {
			return false;
		}

		match buffer.trim_end_matches("\r\n").rsplit("\r\n").next() {
			Some(last) => last.len() < 4 || last.as_bytes()[3] != b'-',
			None => false,
		}
	}
}

impl std::fmt::Display for Response {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {}", self.code.as_code(), self.messages.join(" "))
	}
}

impl std::str::FromStr for Response {
	type Err = ParseResponseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim_end_matches("\r\n");
		if trimmed.is_empty() {
			return Err(ParseResponseError::EmptyString);
		}

		let mut response: Option<Response> = None;

		for line in trimmed.split("\r\n") {
			if line.len() < 3 || !line.is_char_boundary(3) {
				return Err(ParseResponseError::MalformedResponse);
			}

			let (code, rest) = line.split_at(3);
			let code: ResponseCode = code.parse()?;
			let text = match rest.chars().next() {
				None => "",
				Some(' ') | Some('-') => rest[1..].trim(),
				Some(_) => return Err(ParseResponseError::MalformedResponse),
			};

			match response.as_mut() {
				None => response = Some(Response::with_message(code, text)),
				Some(existing) if existing.code == code => existing.push(text),
				Some(_) => return Err(ParseResponseError::MixedResponseCode),
			}
		}

		response.ok_or(ParseResponseError::EmptyString)
	}
}

#[derive(Error, Debug)]
pub enum ParseResponseError {
	#[error("multiline responses may not mix reply codes")]
	MixedResponseCode,
	#[error("the response was malformed")]
	MalformedResponse,
	#[error("the response code did not make sense")]
	MalformedResponseCode,
	#[error("the response code was invalid")]
	InvalidResponseCode(#[from] ParseIntError),
	#[error("the reply was empty")]
	EmptyString,
}

#[derive(Clone, Copy, Debug)]
pub enum ResponseCode {
	UnrecognizedCommand,   // 500
	InvalidParameters,     // 501
	CommandNotImplemented, // 502
	BadCommandSequence,    // 503

	ServiceReady,   // 220
	ServiceClosing, // 221
	AuthSucceeded,  // 235

	ServiceNotAvailable, // 421

	Okay,                    // 250
	UserNotLocalWillForward, // 251

	ServerChallenge, // 334
	StartMailInput,  // 354

	TemporaryMailFail,         // 450
	ProcessingError,           // 451
	InsufficientStorage,       // 452
	TemporaryAuthFailure,      // 454
	AuthRequired,              // 530
	AuthCredentialsInvalid,    // 535
	PermanentMailFail,         // 550
	UserNotLocal,              // 551
	ExceededStorageAllocation, // 552
	MailboxNameNotAllowed,     // 553
	TransactionFail,           // 554

	UnknownPositiveCompletion(u16), // 2xx
	UnknownPositiveWaiting(u16),    // 3xx
	UnknownNegativeTemporary(u16),  // 4xx
	UnknownNegativePermanent(u16),  // 5xx
}

impl PartialEq for ResponseCode {
	fn eq(&self, other: &Self) -> bool {
		self.as_code() == other.as_code()
	}
}

impl ResponseCode {
	pub fn from_code(code: u16) -> Option<ResponseCode> {
		let known = match code {
			500 => ResponseCode::UnrecognizedCommand,
			501 => ResponseCode::InvalidParameters,
			502 => ResponseCode::CommandNotImplemented,
			503 => ResponseCode::BadCommandSequence,

			220 => ResponseCode::ServiceReady,
			221 => ResponseCode::ServiceClosing,
			235 => ResponseCode::AuthSucceeded,

			421 => ResponseCode::ServiceNotAvailable,

			250 => ResponseCode::Okay,
			251 => ResponseCode::UserNotLocalWillForward,

			334 => ResponseCode::ServerChallenge,
			354 => ResponseCode::StartMailInput,

			450 => ResponseCode::TemporaryMailFail,
			451 => ResponseCode::ProcessingError,
			452 => ResponseCode::InsufficientStorage,
			454 => ResponseCode::TemporaryAuthFailure,
			530 => ResponseCode::AuthRequired,
			535 => ResponseCode::AuthCredentialsInvalid,
			550 => ResponseCode::PermanentMailFail,
			551 => ResponseCode::UserNotLocal,
			552 => ResponseCode::ExceededStorageAllocation,
			553 => ResponseCode::MailboxNameNotAllowed,
			554 => ResponseCode::TransactionFail,

			_ => {
				return match code / 100 {
					2 => Some(ResponseCode::UnknownPositiveCompletion(code)),
					3 => Some(ResponseCode::UnknownPositiveWaiting(code)),
					4 => Some(ResponseCode::UnknownNegativeTemporary(code)),
					5 => Some(ResponseCode::UnknownNegativePermanent(code)),
					_ => None,
				}
			}
		};

		Some(known)
	}

	pub fn as_code(self) -> u16 {
		match self {
			ResponseCode::UnrecognizedCommand => 500,
			ResponseCode::InvalidParameters => 501,
			ResponseCode::CommandNotImplemented => 502,
			ResponseCode::BadCommandSequence => 503,

			ResponseCode::ServiceReady => 220,
			ResponseCode::ServiceClosing => 221,
			ResponseCode::AuthSucceeded => 235,

			ResponseCode::ServiceNotAvailable => 421,

			ResponseCode::Okay => 250,
			ResponseCode::UserNotLocalWillForward => 251,

			ResponseCode::ServerChallenge => 334,
			ResponseCode::StartMailInput => 354,

			ResponseCode::TemporaryMailFail => 450,
			ResponseCode::ProcessingError => 451,
			ResponseCode::InsufficientStorage => 452,
			ResponseCode::TemporaryAuthFailure => 454,
			ResponseCode::AuthRequired => 530,
			ResponseCode::AuthCredentialsInvalid => 535,
			ResponseCode::PermanentMailFail => 550,
			ResponseCode::UserNotLocal => 551,
			ResponseCode::ExceededStorageAllocation => 552,
			ResponseCode::MailboxNameNotAllowed => 553,
			ResponseCode::TransactionFail => 554,

			ResponseCode::UnknownPositiveCompletion(code)
			| ResponseCode::UnknownPositiveWaiting(code)
			| ResponseCode::UnknownNegativeTemporary(code)
			| ResponseCode::UnknownNegativePermanent(code) => code,
		}
	}

	pub fn is_negative(&self) -> bool {
		let first = self.as_code() / 100;

		first == 4 || first == 5
	}

	/// 2xx. The command was accepted and nothing more is expected of us.
	pub fn is_completion(&self) -> bool {
		self.as_code() / 100 == 2
	}
}

impl std::str::FromStr for ResponseCode {
	type Err = ParseResponseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.len() == 3 {
			ResponseCode::from_code(s.parse()?).ok_or(ParseResponseError::MalformedResponseCode)
		} else {
			Err(ParseResponseError::MalformedResponseCode)
		}
	}
}
