/*!
# Disc Dump: Errors
*/

use fyi_msg::Msg;
use std::{
	error::Error,
	fmt,
};



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Errors.
///
/// Per-sector media trouble (SCSI sense, C2 bits, bad Q CRC) is data, not an
/// error; those are counted by the engine and never surface here. This enum
/// covers the fatal stuff: transport failures at init, state conflicts, and
/// configuration mistakes.
pub enum DumpError {
	/// # Bug!
	Bug(&'static str),

	/// # Drive Not Ready.
	DriveNotReady(String),

	/// # Dump Already Exists.
	DumpExists(String),

	/// # Unable to Open Device.
	DeviceOpen(Option<String>),

	/// # Missing Image Name.
	ImageName,

	/// # User Abort.
	Killed,

	/// # Mixed Dump Flavors.
	MixedReadMethods,

	/// # Read Failure (File).
	Read(String),

	/// # Unsupported Read Method.
	ReadMethodUnsupported,

	/// # SCSI Command Failure.
	Scsi(&'static str, String),

	/// # Disc/File TOC Mismatch.
	TocMismatch,

	/// # Write Failure (File).
	Write(String),

	#[cfg(feature = "bin")]
	/// # Invalid CLI Option/Value.
	CliParse(&'static str),

	#[cfg(feature = "bin")]
	/// # Print Help (Not an Error).
	PrintHelp,

	#[cfg(feature = "bin")]
	/// # Print Version (Not an Error).
	PrintVersion,
}

impl Error for DumpError {}

impl From<DumpError> for Msg {
	#[inline]
	fn from(src: DumpError) -> Self { Self::error(src.to_string()) }
}

impl fmt::Display for DumpError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bug(s) => write!(f, "Bug: {s}."),
			Self::DriveNotReady(s) => write!(f, "Drive not ready, SCSI ({s})."),
			Self::DumpExists(s) => write!(f, "Dump already exists (name: {s}); pass --overwrite to start over."),
			Self::DeviceOpen(s) =>
				if let Some(s) = s { write!(f, "Unable to open connection with {s}.") }
				else {
					f.write_str("Unable to open connection with default optical drive.")
				},
			Self::ImageName => f.write_str("Image name is not provided."),
			Self::Killed => f.write_str("User abort."),
			Self::MixedReadMethods => f.write_str("Refine using mixed read methods is unsupported."),
			Self::Read(s) => write!(f, "Unable to read from {s}."),
			Self::ReadMethodUnsupported => f.write_str("Unsupported drive read method for mixed data/audio."),
			Self::Scsi(op, s) => write!(f, "{op} failed, SCSI ({s})."),
			Self::TocMismatch => f.write_str("Disc/file TOC don't match; refining from a different disc?"),
			Self::Write(s) => write!(f, "Unable to write to {s}."),

			#[cfg(feature = "bin")]
			Self::CliParse(s) => write!(f, "Unable to parse {s}."),

			#[cfg(feature = "bin")]
			Self::PrintHelp => f.write_str("help"),

			#[cfg(feature = "bin")]
			Self::PrintVersion => f.write_str(concat!("Disc Dump v", env!("CARGO_PKG_VERSION"))),
		}
	}
}
