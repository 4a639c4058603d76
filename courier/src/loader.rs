//! Reading recipients and the message template out of tabular files.
//!
//! Both inputs are read the same way: the first row holds the column names
//! and everything after it is data. Comma separated files are read with
//! [csv], spreadsheets (`.xlsx`, `.xlsm`, `.xls`, `.ods`) with [calamine],
//! looking only at the first sheet.

use std::{
	fs::File,
	io::{self, Read},
	path::{Path, PathBuf},
};

use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use thiserror::Error;

pub const RECIPIENT_COLUMN: &str = "Email Address";
pub const SUBJECT_COLUMN: &str = "Subject";
pub const BODY_COLUMN: &str = "Body";

/// What gets sent to every recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
	pub subject: String,
	pub body: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
	Delimited,
	Spreadsheet,
}

impl Format {
	pub fn from_path(path: &Path) -> Option<Self> {
		let extension = path.extension()?.to_str()?.to_ascii_lowercase();

		match extension.as_str() {
			"csv" => Some(Format::Delimited),
			"xlsx" | "xlsm" | "xls" | "ods" => Some(Format::Spreadsheet),
			_ => None,
		}
	}
}

/// A header row and the rows under it, every cell as text.
#[derive(Debug, Default)]
pub struct Table {
	headers: Vec<String>,
	rows: Vec<Vec<String>>,
}

impl Table {
	pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
		let path = path.as_ref();

		let table = match Format::from_path(path) {
			Some(Format::Delimited) => Self::from_csv(File::open(path)?)?,
			Some(Format::Spreadsheet) => Self::from_spreadsheet(path)?,
			None => return Err(LoadError::Unsupported(path.to_owned())),
		};

		debug!(
			"read {} rows under {:?} from {}",
			table.rows.len(),
			table.headers,
			path.display()
		);
		Ok(table)
	}

	pub fn from_csv<R: Read>(reader: R) -> Result<Self, LoadError> {
		let mut reader = ReaderBuilder::new()
			.trim(Trim::Headers)
			.flexible(true)
			.from_reader(reader);

		let headers = reader.headers()?.iter().map(String::from).collect();
		let mut rows = vec![];
		for record in reader.records() {
			rows.push(record?.iter().map(String::from).collect());
		}

		Ok(Self { headers, rows })
	}

	fn from_spreadsheet(path: &Path) -> Result<Self, LoadError> {
		let mut workbook = open_workbook_auto(path)?;
		let range = workbook.worksheet_range_at(0).ok_or(LoadError::NoSheet)??;

		let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
		let headers = match rows.next() {
			Some(headers) => headers.into_iter().map(|h| h.trim().to_owned()).collect(),
			None => vec![],
		};

		Ok(Self {
			headers,
			rows: rows.collect(),
		})
	}

	/// Every cell under `name`, top to bottom. Short rows read as empty.
	pub fn column<'a>(&'a self, name: &str) -> Result<impl Iterator<Item = &'a str>, LoadError> {
		let idx = self
			.headers
			.iter()
			.position(|header| header == name)
			.ok_or_else(|| LoadError::MissingColumn(name.to_owned()))?;

		Ok(self
			.rows
			.iter()
			.map(move |row| row.get(idx).map(String::as_str).unwrap_or_default()))
	}
}

fn cell_text(cell: &Data) -> String {
	match cell {
		Data::Empty => String::new(),
		Data::String(text) => text.clone(),
		other => other.to_string(),
	}
}

/// The trimmed, non-empty cells of the recipient column, in file order.
/// Duplicates are kept.
pub fn recipients(table: &Table) -> Result<Vec<String>, LoadError> {
	Ok(table
		.column(RECIPIENT_COLUMN)?
		.map(str::trim)
		.filter(|address| !address.is_empty())
		.map(String::from)
		.collect())
}

/// The first non-empty subject and the first non-empty body. They don't
/// have to be on the same row.
pub fn template(table: &Table) -> Result<Template, LoadError> {
	let first = |name: &'static str| -> Result<String, LoadError> {
		table
			.column(name)?
			.find(|cell| !cell.trim().is_empty())
			.map(String::from)
			.ok_or(LoadError::Empty(name))
	};

	Ok(Template {
		subject: first(SUBJECT_COLUMN)?,
		body: first(BODY_COLUMN)?,
	})
}

pub fn load_recipients<P: AsRef<Path>>(path: P) -> Result<Vec<String>, LoadError> {
	let recipients = recipients(&Table::read(path)?)?;
	info!("loaded {} recipients", recipients.len());
	Ok(recipients)
}

pub fn load_template<P: AsRef<Path>>(path: P) -> Result<Template, LoadError> {
	template(&Table::read(path)?)
}

#[derive(Debug, Error)]
pub enum LoadError {
	#[error("don't know how to read {0}, expected .csv, .xlsx, .xls or .ods")]
	Unsupported(PathBuf),
	#[error("could not open file: {0}")]
	Io(#[from] io::Error),
	#[error("bad csv: {0}")]
	Csv(#[from] csv::Error),
	#[error("bad spreadsheet: {0}")]
	Spreadsheet(#[from] calamine::Error),
	#[error("the workbook has no sheets")]
	NoSheet,
	#[error("no {0:?} column")]
	MissingColumn(String),
	#[error("the {0:?} column is empty")]
	Empty(&'static str),
}
