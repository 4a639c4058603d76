use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// An account address and the secret that unlocks it. The same pair is used
/// for submission and for reading the mailbox.
#[derive(Clone)]
pub struct Credentials {
	address: String,
	secret: SecretString,
}

impl Credentials {
	pub fn new<S: AsRef<str>>(address: S, secret: SecretString) -> Result<Self, CredentialsError> {
		let address = address.as_ref().trim();

		if address.is_empty() {
			return Err(CredentialsError::MissingAddress);
		}
		if secret.expose_secret().is_empty() {
			return Err(CredentialsError::MissingSecret);
		}

		Ok(Self {
			address: address.to_owned(),
			secret,
		})
	}

	pub fn address(&self) -> &str {
		&self.address
	}

	pub fn secret(&self) -> &SecretString {
		&self.secret
	}
}

impl std::fmt::Debug for Credentials {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Credentials")
			.field("address", &self.address)
			.field("secret", &"<redacted>")
			.finish()
	}
}

#[derive(Debug, Error)]
pub enum CredentialsError {
	#[error("please enter both email and password: the address is empty")]
	MissingAddress,
	#[error("please enter both email and password: the password is empty")]
	MissingSecret,
}
