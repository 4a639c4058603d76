use std::path::{Path, PathBuf};

use log::info;
use rust_xlsxwriter::{Workbook, XlsxError};
use thiserror::Error;

use crate::{
	bounce::BounceSet,
	loader::{self, LoadError, Table, RECIPIENT_COLUMN},
};

pub const REPORT_FILENAME: &str = "bounced_emails.xlsx";
pub const REPORT_SHEET: &str = "Bounced Emails";
pub const REPORT_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// the last row a worksheet can hold
const MAX_ROWS: usize = 1_048_576;

/// A written report, ready to be handed to whoever asked for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
	pub path: PathBuf,
	pub mime: &'static str,
	pub rows: usize,
}

/// Writes one sheet with an "Email Address" header and a row per bounced
/// address, replacing whatever is at `path`.
pub fn write_report<P: AsRef<Path>>(path: P, bounced: &BounceSet) -> Result<Report, ReportError> {
	let path = path.as_ref();
	if bounced.len() >= MAX_ROWS {
		return Err(ReportError::TooManyRows(bounced.len()));
	}

	let mut workbook = Workbook::new();
	let sheet = workbook.add_worksheet();
	sheet.set_name(REPORT_SHEET)?;
	sheet.set_column_width(0, 40)?;
	sheet.write_string(0, 0, RECIPIENT_COLUMN)?;

	for (row, address) in (1u32..).zip(bounced) {
		sheet.write_string(row, 0, address)?;
	}

	workbook.save(path)?;
	info!("wrote {} bounced addresses to {}", bounced.len(), path.display());

	Ok(Report {
		path: path.to_owned(),
		mime: REPORT_MIME,
		rows: bounced.len(),
	})
}

/// Reads back a report written by [write_report], or any sheet with an
/// "Email Address" column.
pub fn read_report<P: AsRef<Path>>(path: P) -> Result<BounceSet, ReportError> {
	let table = Table::read(path)?;
	Ok(loader::recipients(&table)?.into_iter().collect())
}

#[derive(Debug, Error)]
pub enum ReportError {
	#[error("could not write the report: {0}")]
	Write(#[from] XlsxError),
	#[error("could not read the report: {0}")]
	Read(#[from] LoadError),
	#[error("{0} addresses don't fit in one sheet")]
	TooManyRows(usize),
}

#[cfg(test)]
mod test {
	use calamine::{open_workbook_auto, Reader};

	use super::*;

	fn set(addresses: &[&str]) -> BounceSet {
		addresses.iter().map(|a| a.to_string()).collect()
	}

	#[test]
	fn written_report_reads_back() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join(REPORT_FILENAME);
		let bounced = set(&["b@x.com", "a@x.com"]);

		let report = write_report(&path, &bounced).unwrap();
		assert_eq!(report.path, path);
		assert_eq!(report.mime, REPORT_MIME);
		assert_eq!(report.rows, 2);

		assert_eq!(read_report(&path).unwrap(), bounced);
	}

	#[test]
	fn sheet_layout() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join(REPORT_FILENAME);
		write_report(&path, &set(&["b@x.com", "a@x.com"])).unwrap();

		let mut workbook = open_workbook_auto(&path).unwrap();
		assert_eq!(workbook.sheet_names(), vec![REPORT_SHEET.to_owned()]);

		let range = workbook.worksheet_range(REPORT_SHEET).unwrap();
		let cells: Vec<String> = range.rows().map(|row| row[0].to_string()).collect();
		assert_eq!(cells, vec!["Email Address", "a@x.com", "b@x.com"]);
	}

	#[test]
	fn empty_set_is_header_only() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join(REPORT_FILENAME);

		assert_eq!(write_report(&path, &BounceSet::new()).unwrap().rows, 0);
		assert!(read_report(&path).unwrap().is_empty());
	}

	#[test]
	fn overwrites_existing_report() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join(REPORT_FILENAME);

		write_report(&path, &set(&["old@x.com"])).unwrap();
		write_report(&path, &set(&["new@x.com"])).unwrap();

		assert_eq!(read_report(&path).unwrap(), set(&["new@x.com"]));
	}
}
