/*!
# Disc Dump: Library
*/

#![deny(unsafe_code)]

#![warn(
	clippy::filetype_is_file,
	clippy::integer_division,
	clippy::needless_borrow,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::suboptimal_flops,
	clippy::unneeded_field_pattern,
	macro_use_extern_crate,
	missing_copy_implementations,
	missing_debug_implementations,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unreachable_pub,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]

#![allow(
	clippy::doc_markdown,
	clippy::module_name_repetitions,
	clippy::redundant_pub_crate,
)]

mod abort;
mod cdio;
mod chk;
mod drive;
mod dump;
mod error;
mod log;
mod mmc;
mod msf;
mod psx;
mod scrambler;
mod state;
mod stream;
mod subcode;
mod toc;
mod utility;

pub use abort::{
	aborted,
	interrupt,
};
pub(crate) use abort::SignalGuard;
pub use cdio::LibcdioDrive;
pub(crate) use chk::{
	bits_count,
	crc16_gsm,
};
pub use drive::{
	read_sector,
	sector_order_layout,
	DriveConfig,
	DriveType,
	ReadMethod,
	SectorLayout,
	SectorOrder,
};
pub use dump::{
	dump,
	refine,
	subchannel,
	DumpOptions,
};
pub use error::DumpError;
pub use log::DumpLog;
pub use mmc::{
	DriveHandle,
	ReadCdErrorField,
	ReadCdExpectedSectorType,
	ReadCdSubChannel,
	ReadCddaSubCode,
	ScsiStatus,
};
pub use msf::{
	bcdmsf_to_lba,
	lba_to_bcdmsf,
	lba_to_msf,
	msf_to_lba,
	MSF,
};
pub use psx::{
	psx_report,
	TrackBrowser,
};
pub use scrambler::Scrambler;
pub use state::{
	state_from_c2,
	SampleState,
};
pub use stream::{
	entry_count,
	read_entry,
	write_entry,
	MemStream,
	StreamFile,
};
pub use subcode::{
	subcode_extract_channel,
	ChannelQ,
	Subchannel,
};
pub use toc::{
	Session,
	Toc,
	Track,
};
pub use utility::string_to_ranges;
pub(crate) use utility::{
	inside_range,
	percentage,
};



/// # Bytes Per Sector (Data Plane).
///
/// The user-facing portion of a raw sector, audio or (scrambled) data alike.
pub const CD_DATA_SIZE: usize = 2352;

/// # Bytes Per Sector (C2 Plane).
///
/// One error-pointer bit per data byte. Some drives support a 296-byte
/// variation with a block-error leader; the extra bits are redundant and
/// ignored here.
pub const CD_C2_SIZE: usize = 294;

/// # Bytes Per Sector (Subcode Plane).
pub const CD_SUBCODE_SIZE: usize = 96;

/// # Bytes Per Raw Read.
///
/// A fully-populated raw read: data, C2, and subcode planes back to back.
pub const CD_RAW_DATA_SIZE: usize = CD_DATA_SIZE + CD_C2_SIZE + CD_SUBCODE_SIZE;

/// # Bytes Per Sample.
///
/// One 16-bit stereo frame, the unit of state tracking.
pub const CD_SAMPLE_SIZE: usize = 4;

/// # Samples Per Sector.
pub const SAMPLES_PER_SECTOR: usize = CD_DATA_SIZE.wrapping_div(CD_SAMPLE_SIZE);

/// # Data Sector Sync Pattern.
pub const CD_DATA_SYNC: [u8; 12] = [
	0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// # Earliest Addressable Sector.
///
/// MSF addressing wraps at 90 minutes, so the deepest reachable lead-in
/// sector (MSF 90:00:00) sits 45,150 sectors before the program area.
/// Every stream file is indexed relative to this.
pub const LBA_START: i32 = -45_150;

/// # MSF 00:00:00 in LBA Terms.
pub const MSF_LBA_SHIFT: i32 = -150;

/// # Slow Sector Threshold (Seconds).
///
/// Reads taking longer than this only affect error attribution; they never
/// cancel anything.
pub const SLOW_SECTOR_TIMEOUT: u64 = 5;

/// # Plextor Lead-In Entry Size.
///
/// Lead-in responses carry a four-byte command status before the usual raw
/// sector planes.
pub const PLEXTOR_LEADIN_ENTRY_SIZE: usize = 4 + CD_RAW_DATA_SIZE;
