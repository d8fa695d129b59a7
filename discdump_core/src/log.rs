/*!
# Disc Dump: Log
*/

use crate::DumpError;
use std::{
	fs::{
		File,
		OpenOptions,
	},
	io::Write,
	path::Path,
};
use utc2k::FmtUtc2k;



#[derive(Debug)]
/// # Dump Log.
///
/// Mirrors the interesting console chatter into the image's append-only
/// `.log` file so a dump can be audited long after the terminal scrolled
/// away. Single-threaded access only; the engine owns it for the duration
/// of a mode.
pub struct DumpLog {
	file: Option<File>,
	refreshing: bool,
}

impl DumpLog {
	/// # New.
	///
	/// Open (or create) the log file and stamp a session header.
	///
	/// ## Errors
	///
	/// Returns an error if the file cannot be opened for append.
	pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DumpError> {
		let path = path.as_ref();
		let mut file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(path)
			.map_err(|_| DumpError::Write(path.to_string_lossy().into_owned()))?;

		let _res = writeln!(&mut file, "--- {} ---", FmtUtc2k::now());

		Ok(Self {
			file: Some(file),
			refreshing: false,
		})
	}

	#[must_use]
	/// # Console Only.
	///
	/// A log that prints but persists nothing, for modes that have no image
	/// directory to write into.
	pub const fn sink() -> Self {
		Self {
			file: None,
			refreshing: false,
		}
	}

	/// # Log a Line.
	///
	/// Written to both stderr and the log file.
	pub fn line(&mut self, msg: &str) {
		self.break_refresh();
		eprintln!("{msg}");
		if let Some(file) = &mut self.file {
			let _res = writeln!(file, "{msg}");
		}
	}

	/// # Console-Only Line.
	pub fn console(&mut self, msg: &str) {
		self.break_refresh();
		eprintln!("{msg}");
	}

	/// # Refresh the Progress Line.
	///
	/// Console only; carriage return, no newline, so successive calls paint
	/// over each other.
	pub fn refresh(&mut self, msg: &str) {
		use std::io::Write as _;
		let mut err = std::io::stderr().lock();
		let _res = write!(err, "\r{msg}")
			.and_then(|()| err.flush());
		self.refreshing = true;
	}

	/// # Close Out a Refresh Line.
	///
	/// Drop down to a fresh line if a progress refresh is mid-paint.
	pub fn break_refresh(&mut self) {
		if self.refreshing {
			eprintln!();
			self.refreshing = false;
		}
	}
}

impl Drop for DumpLog {
	fn drop(&mut self) {
		self.break_refresh();
		if let Some(file) = &mut self.file {
			let _res = file.flush();
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_log_file() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let path = dir.path().join("test.log");

		{
			let mut log = DumpLog::new(&path).expect("Log should open.");
			log.line("hello");
			log.line("world");
		}

		let raw = std::fs::read_to_string(&path).expect("Log should exist.");
		assert!(raw.contains("hello\nworld\n"), "Lines should persist in order.");
		assert!(raw.starts_with("--- "), "Session header should lead.");

		// Sinks never touch the disk.
		let mut log = DumpLog::sink();
		log.line("nowhere");
	}
}
