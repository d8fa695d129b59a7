/*!
# Disc Dump: MMC Transport Interface
*/

use crate::DumpError;
use std::fmt;



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # SCSI Command Status.
///
/// A compacted status-plus-sense. `status_code` zero means the command
/// completed; anything else is interpreted through the sense triplet where
/// the transport could provide one.
pub struct ScsiStatus {
	/// # Status Code.
	pub status_code: u8,

	/// # Sense Key.
	pub sense_key: u8,

	/// # Additional Sense Code.
	pub asc: u8,

	/// # Additional Sense Code Qualifier.
	pub ascq: u8,
}

impl ScsiStatus {
	/// # All Good.
	pub const GOOD: Self = Self { status_code: 0, sense_key: 0, asc: 0, ascq: 0 };

	#[must_use]
	/// # Generic Check Condition.
	pub const fn check_condition(sense_key: u8, asc: u8, ascq: u8) -> Self {
		Self { status_code: 0x02, sense_key, asc, ascq }
	}

	#[must_use]
	/// # Success?
	pub const fn is_good(self) -> bool { self.status_code == 0 }

	#[must_use]
	/// # Pack Into Four Bytes.
	///
	/// Lead-in entries carry a per-sector status ahead of the raw planes;
	/// this is its wire form.
	pub const fn as_bytes(self) -> [u8; 4] {
		[self.status_code, self.sense_key, self.asc, self.ascq]
	}

	#[must_use]
	/// # Unpack From Four Bytes.
	pub const fn from_bytes(raw: [u8; 4]) -> Self {
		Self {
			status_code: raw[0],
			sense_key: raw[1],
			asc: raw[2],
			ascq: raw[3],
		}
	}
}

impl fmt::Display for ScsiStatus {
	/// # Sense Text.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_good() { return f.write_str("GOOD"); }

		let key = match self.sense_key {
			0x01 => "RECOVERED ERROR",
			0x02 => "NOT READY",
			0x03 => "MEDIUM ERROR",
			0x04 => "HARDWARE ERROR",
			0x05 => "ILLEGAL REQUEST",
			0x06 => "UNIT ATTENTION",
			0x07 => "DATA PROTECT",
			0x0B => "ABORTED COMMAND",
			_ => "UNKNOWN",
		};

		write!(
			f,
			"status: {:02X}, {key} {:02X}/{:02X}/{:02X}",
			self.status_code, self.sense_key, self.asc, self.ascq,
		)
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # READ CD Expected Sector Type.
pub enum ReadCdExpectedSectorType {
	/// # Any Sector Type.
	AllTypes,

	/// # CD-DA Only.
	CdDa,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # READ CD Error Field.
pub enum ReadCdErrorField {
	/// # No Error Pointers.
	None,

	/// # 294-Byte C2 Block.
	C2,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # READ CD Subchannel Selection.
pub enum ReadCdSubChannel {
	/// # No Subchannel.
	None,

	/// # Raw 96-Byte Subcode.
	Raw,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Vendor CDDA (D8) Subcode Selection.
pub enum ReadCddaSubCode {
	/// # Data Only.
	Data,

	/// # Data + Subcode.
	DataSub,

	/// # Data + C2 + Subcode.
	DataC2Sub,
}



/// # Drive Handle.
///
/// The engine's entire view of the transport: typed MMC operations over a
/// serialized drive. One command in flight at a time; every method blocks.
/// The production implementation wraps libcdio; tests substitute an
/// in-memory disc.
pub trait DriveHandle {
	/// # TEST UNIT READY.
	fn test_unit_ready(&mut self) -> ScsiStatus;

	/// # Drive Vendor/Product Identification.
	///
	/// ## Errors
	///
	/// Returns an error if the inquiry data cannot be retrieved.
	fn inquiry(&mut self) -> Result<(String, String), DumpError>;

	/// # SET CD SPEED.
	///
	/// `speed` in multiples of 150 KiB/s, `0xFFFF` for "whatever you've got".
	fn set_cd_speed(&mut self, speed: u16) -> ScsiStatus;

	/// # READ TOC (Format 0).
	///
	/// The verbatim response buffer, headers included.
	///
	/// ## Errors
	///
	/// Returns an error if the command fails; a disc without a readable TOC
	/// is not dumpable at all.
	fn read_toc(&mut self) -> Result<Vec<u8>, DumpError>;

	/// # READ TOC (Format 2, FULL-TOC).
	///
	/// The verbatim response buffer, or empty if the drive has nothing to
	/// say; plenty of units fumble this one.
	///
	/// ## Errors
	///
	/// Returns an error only for transport-level failures.
	fn read_full_toc(&mut self) -> Result<Vec<u8>, DumpError>;

	/// # READ TOC (Format 5, CD-TEXT).
	///
	/// Writes the verbatim response into `out` (cleared first).
	fn read_cd_text(&mut self, out: &mut Vec<u8>) -> ScsiStatus;

	/// # READ CD.
	///
	/// `buf` must hold `count` sectors of whatever plane combination the
	/// flags select.
	fn read_cd(
		&mut self,
		buf: &mut [u8],
		lba: i32,
		count: u32,
		sector_type: ReadCdExpectedSectorType,
		error_field: ReadCdErrorField,
		sub_channel: ReadCdSubChannel,
	) -> ScsiStatus;

	/// # Vendor READ CD-DA (D8).
	fn read_cdda(
		&mut self,
		buf: &mut [u8],
		lba: i32,
		count: u32,
		sub_code: ReadCddaSubCode,
	) -> ScsiStatus;

	/// # Flush the Drive Cache.
	///
	/// Implemented as a far seek; the point is only that the next read
	/// cannot be served from stale cache.
	fn flush_cache(&mut self, lba: i32) -> ScsiStatus;

	/// # Plextor Lead-In Read.
	///
	/// Returns concatenated entries of [`crate::PLEXTOR_LEADIN_ENTRY_SIZE`]
	/// bytes each: a four-byte per-sector status followed by the raw data,
	/// C2, and subcode planes.
	///
	/// ## Errors
	///
	/// Returns an error if the vendor command is rejected outright.
	fn plextor_read_leadin(&mut self, sectors: u32) -> Result<Vec<u8>, DumpError>;

	/// # LG/ASUS Cache Dump.
	///
	/// The drive's internal read cache, verbatim.
	///
	/// ## Errors
	///
	/// Returns an error if the vendor command is rejected outright.
	fn asus_cache_read(&mut self) -> Result<Vec<u8>, DumpError>;
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_status() {
		assert!(ScsiStatus::GOOD.is_good());
		assert_eq!(ScsiStatus::GOOD.to_string(), "GOOD");

		let bad = ScsiStatus::check_condition(0x03, 0x11, 0x05);
		assert!(! bad.is_good());
		assert!(bad.to_string().contains("MEDIUM ERROR"), "Sense text should name the key.");
	}
}
