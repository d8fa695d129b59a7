/*!
# Disc Dump: Drive Profiles
*/

use crate::{
	CD_C2_SIZE,
	CD_DATA_SIZE,
	CD_RAW_DATA_SIZE,
	CD_SUBCODE_SIZE,
	DriveHandle,
	ReadCdErrorField,
	ReadCdExpectedSectorType,
	ReadCdSubChannel,
	ReadCddaSubCode,
	ScsiStatus,
};
use std::fmt;



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Drive Family.
///
/// Families with special powers get their own tag so lead-in/lead-out
/// dispatch happens at the engine level rather than through vendor-string
/// comparisons sprinkled everywhere.
pub enum DriveType {
	#[default]
	/// # Anything Else.
	Generic,

	/// # Plextor (Lead-In Capable).
	Plextor,

	/// # LG/ASUS, 2MB Cache.
	LgAsu2,

	/// # LG/ASUS, 3MB Cache.
	LgAsu3,
}

impl DriveType {
	#[must_use]
	/// # Retains a Scrapeable Lead-Out Cache?
	pub const fn is_asus(self) -> bool {
		matches!(self, Self::LgAsu2 | Self::LgAsu3)
	}

	#[must_use]
	/// # From CLI Name.
	pub fn from_name(src: &str) -> Option<Self> {
		match src.to_ascii_uppercase().as_str() {
			"GENERIC" => Some(Self::Generic),
			"PLEXTOR" => Some(Self::Plextor),
			"LG_ASU2" => Some(Self::LgAsu2),
			"LG_ASU3" => Some(Self::LgAsu3),
			_ => None,
		}
	}

	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Generic => "GENERIC",
			Self::Plextor => "PLEXTOR",
			Self::LgAsu2 => "LG_ASU2",
			Self::LgAsu3 => "LG_ASU3",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Read Method.
pub enum ReadMethod {
	#[default]
	/// # READ CD, Any Sector Type.
	Be,

	/// # READ CD, Expected Type CD-DA.
	BeCdda,

	/// # Vendor CDDA (Plextor D8).
	D8,
}

impl ReadMethod {
	#[must_use]
	/// # From CLI Name.
	pub fn from_name(src: &str) -> Option<Self> {
		match src.to_ascii_uppercase().as_str() {
			"BE" => Some(Self::Be),
			"BE_CDDA" => Some(Self::BeCdda),
			"D8" => Some(Self::D8),
			_ => None,
		}
	}

	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Be => "BE",
			Self::BeCdda => "BE_CDDA",
			Self::D8 => "D8",
		}
	}
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Raw Buffer Component Order.
pub enum SectorOrder {
	#[default]
	/// # Data, C2, Subcode.
	DataC2Sub,

	/// # Data, Subcode, C2.
	DataSubC2,

	/// # Data, Subcode (No C2).
	DataSub,

	/// # Data Only.
	Data,
}

impl SectorOrder {
	#[must_use]
	/// # From CLI Name.
	pub fn from_name(src: &str) -> Option<Self> {
		match src.to_ascii_uppercase().as_str() {
			"DATA_C2_SUB" => Some(Self::DataC2Sub),
			"DATA_SUB_C2" => Some(Self::DataSubC2),
			"DATA_SUB" => Some(Self::DataSub),
			"DATA" => Some(Self::Data),
			_ => None,
		}
	}

	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::DataC2Sub => "DATA_C2_SUB",
			Self::DataSubC2 => "DATA_SUB_C2",
			Self::DataSub => "DATA_SUB",
			Self::Data => "DATA",
		}
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Plane Offsets Within a Raw Read.
///
/// A missing plane is marked by an offset equal to [`CD_RAW_DATA_SIZE`] so
/// callers can test-and-skip without an `Option` dance.
pub struct SectorLayout {
	/// # Data Plane Offset.
	pub data_offset: usize,

	/// # C2 Plane Offset.
	pub c2_offset: usize,

	/// # Subcode Plane Offset.
	pub subcode_offset: usize,

	/// # Per-Sector Stride.
	pub size: usize,
}

#[must_use]
/// # Layout For an Order.
pub const fn sector_order_layout(order: SectorOrder) -> SectorLayout {
	match order {
		SectorOrder::DataC2Sub => SectorLayout {
			data_offset: 0,
			c2_offset: CD_DATA_SIZE,
			subcode_offset: CD_DATA_SIZE + CD_C2_SIZE,
			size: CD_DATA_SIZE + CD_C2_SIZE + CD_SUBCODE_SIZE,
		},
		SectorOrder::DataSubC2 => SectorLayout {
			data_offset: 0,
			c2_offset: CD_DATA_SIZE + CD_SUBCODE_SIZE,
			subcode_offset: CD_DATA_SIZE,
			size: CD_DATA_SIZE + CD_SUBCODE_SIZE + CD_C2_SIZE,
		},
		SectorOrder::DataSub => SectorLayout {
			data_offset: 0,
			c2_offset: CD_RAW_DATA_SIZE,
			subcode_offset: CD_DATA_SIZE,
			size: CD_DATA_SIZE + CD_SUBCODE_SIZE,
		},
		SectorOrder::Data => SectorLayout {
			data_offset: 0,
			c2_offset: CD_RAW_DATA_SIZE,
			subcode_offset: CD_RAW_DATA_SIZE,
			size: CD_DATA_SIZE,
		},
	}
}



/// # Builtin Profile Table.
///
/// (vendor, product, type, read offset, C2 shift, pregap start, method,
/// order.) Matching is exact on the trimmed INQUIRY strings. Not meant to be
/// exhaustive; unknown drives get the generic profile and can be corrected
/// from the command line.
const DRIVE_TABLE: &[(&str, &str, DriveType, i32, u32, i32, ReadMethod, SectorOrder)] = &[
	("PLEXTOR", "CD-R PX-760A",   DriveType::Plextor, 30, 294, -75, ReadMethod::D8, SectorOrder::DataC2Sub),
	("PLEXTOR", "CD-R PX-755A",   DriveType::Plextor, 30, 294, -75, ReadMethod::D8, SectorOrder::DataC2Sub),
	("PLEXTOR", "CD-R PX-716A",   DriveType::Plextor, 30, 295, -75, ReadMethod::D8, SectorOrder::DataC2Sub),
	("PLEXTOR", "CD-R PX-712A",   DriveType::Plextor, 30, 295, -75, ReadMethod::D8, SectorOrder::DataC2Sub),
	("PLEXTOR", "CD-R PX-W4824A", DriveType::Plextor, 98, 295, -75, ReadMethod::D8, SectorOrder::DataC2Sub),
	("PLEXTOR", "CD-R PX-W5224A", DriveType::Plextor, 30, 294, -75, ReadMethod::D8, SectorOrder::DataC2Sub),
	("ASUS",     "BW-16D1HT",     DriveType::LgAsu3,   6,   0, -135, ReadMethod::BeCdda, SectorOrder::DataC2Sub),
	("ASUS",     "BC-12D2HT",     DriveType::LgAsu3,   6,   0, -135, ReadMethod::BeCdda, SectorOrder::DataC2Sub),
	("HL-DT-ST", "BD-RE WH16NS40", DriveType::LgAsu3,  6,   0, -135, ReadMethod::BeCdda, SectorOrder::DataC2Sub),
	("HL-DT-ST", "BD-RE WH14NS40", DriveType::LgAsu2,  6,   0, -135, ReadMethod::BeCdda, SectorOrder::DataC2Sub),
];



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Drive Configuration.
///
/// How to talk to a particular unit: which read command it answers, how its
/// planes come back, how far its head sits from the reference position, and
/// how late its C2 block arrives.
pub struct DriveConfig {
	/// # INQUIRY Vendor.
	pub vendor_id: String,

	/// # INQUIRY Product.
	pub product_id: String,

	/// # Family.
	pub drive_type: DriveType,

	/// # Read Offset (Samples, Signed).
	pub read_offset: i32,

	/// # C2 Delay (Bytes).
	pub c2_shift: u32,

	/// # Deepest Readable Pregap Sector (Negative LBA).
	pub pregap_start: i32,

	/// # Read Method.
	pub read_method: ReadMethod,

	/// # Raw Buffer Order.
	pub sector_order: SectorOrder,

	/// # Family Was Forced From the CLI.
	pub type_overridden: bool,
}

impl Default for DriveConfig {
	fn default() -> Self {
		Self {
			vendor_id: String::new(),
			product_id: String::new(),
			drive_type: DriveType::Generic,
			read_offset: 0,
			c2_shift: 0,
			pregap_start: -150,
			read_method: ReadMethod::Be,
			sector_order: SectorOrder::DataC2Sub,
			type_overridden: false,
		}
	}
}

impl fmt::Display for DriveConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"type: {}, read offset: {:+}, C2 shift: {}, pre-gap start: {}, read method: {}, sector order: {}",
			self.drive_type.as_str(),
			self.read_offset,
			self.c2_shift,
			self.pregap_start,
			self.read_method.as_str(),
			self.sector_order.as_str(),
		)
	}
}

impl DriveConfig {
	#[must_use]
	/// # Profile For a Unit.
	///
	/// Look the vendor/product pair up in the builtin table, falling back to
	/// the generic profile.
	pub fn detect(vendor_id: &str, product_id: &str) -> Self {
		let vendor_id = vendor_id.trim();
		let product_id = product_id.trim();

		for &(v, p, drive_type, read_offset, c2_shift, pregap_start, read_method, sector_order) in DRIVE_TABLE {
			if v == vendor_id && p == product_id {
				return Self {
					vendor_id: vendor_id.to_owned(),
					product_id: product_id.to_owned(),
					drive_type,
					read_offset,
					c2_shift,
					pregap_start,
					read_method,
					sector_order,
					type_overridden: false,
				};
			}
		}

		Self {
			vendor_id: vendor_id.to_owned(),
			product_id: product_id.to_owned(),
			..Self::default()
		}
	}

	/// # Apply CLI Overrides.
	///
	/// Each `Some` replaces the detected value; `None` leaves it alone.
	pub fn override_config(
		&mut self,
		drive_type: Option<DriveType>,
		read_offset: Option<i32>,
		c2_shift: Option<u32>,
		pregap_start: Option<i32>,
		read_method: Option<ReadMethod>,
		sector_order: Option<SectorOrder>,
	) {
		if let Some(v) = drive_type {
			self.drive_type = v;
			self.type_overridden = true;
		}
		if let Some(v) = read_offset { self.read_offset = v; }
		if let Some(v) = c2_shift { self.c2_shift = v; }
		if let Some(v) = pregap_start { self.pregap_start = v; }
		if let Some(v) = read_method { self.read_method = v; }
		if let Some(v) = sector_order { self.sector_order = v; }
	}

	#[must_use]
	/// # Lead-Out Cache Family?
	pub const fn is_asus(&self) -> bool { self.drive_type.is_asus() }
}



#[allow(clippy::cast_possible_truncation)]
/// # Read One Raw Sector.
///
/// Issue whichever read command the profile calls for and splice the
/// response into canonical `data | C2 | subcode` order in `out`
/// ([`CD_RAW_DATA_SIZE`] bytes). Missing planes come back zeroed.
///
/// Plextor units return C2 up to a full sector late; enough extra sectors
/// are requested to slide the block back into place. A consequence is that
/// lead-out overreads on those drives give out a few sectors early.
pub fn read_sector(
	out: &mut [u8],
	drive: &mut dyn DriveHandle,
	cfg: &DriveConfig,
	lba: i32,
) -> ScsiStatus {
	let layout = sector_order_layout(cfg.sector_order);

	let sectors_count = (cfg.c2_shift as usize).div_ceil(CD_C2_SIZE) + 1;
	let mut buffer = vec![0_u8; layout.size * sectors_count];

	let status =
		if cfg.read_method == ReadMethod::D8 {
			drive.read_cdda(
				&mut buffer,
				lba,
				sectors_count as u32,
				if cfg.sector_order == SectorOrder::DataSub { ReadCddaSubCode::DataSub }
				else { ReadCddaSubCode::DataC2Sub },
			)
		}
		else {
			drive.read_cd(
				&mut buffer,
				lba,
				sectors_count as u32,
				if cfg.read_method == ReadMethod::BeCdda { ReadCdExpectedSectorType::CdDa }
				else { ReadCdExpectedSectorType::AllTypes },
				if layout.c2_offset == CD_RAW_DATA_SIZE { ReadCdErrorField::None }
				else { ReadCdErrorField::C2 },
				if layout.subcode_offset == CD_RAW_DATA_SIZE { ReadCdSubChannel::None }
				else { ReadCdSubChannel::Raw },
			)
		};

	if status.is_good() {
		out[..CD_RAW_DATA_SIZE].fill(0);

		// Data plane.
		if layout.data_offset != CD_RAW_DATA_SIZE {
			out[..CD_DATA_SIZE]
				.copy_from_slice(&buffer[layout.data_offset..layout.data_offset + CD_DATA_SIZE]);
		}

		// C2 plane, un-shifting across the multi-sector buffer.
		if layout.c2_offset != CD_RAW_DATA_SIZE {
			let mut c2_buffer = vec![0_u8; CD_C2_SIZE * sectors_count];
			for i in 0..sectors_count {
				let src = layout.size * i + layout.c2_offset;
				c2_buffer[CD_C2_SIZE * i..CD_C2_SIZE * (i + 1)]
					.copy_from_slice(&buffer[src..src + CD_C2_SIZE]);
			}

			let shift = cfg.c2_shift as usize;
			out[CD_DATA_SIZE..CD_DATA_SIZE + CD_C2_SIZE]
				.copy_from_slice(&c2_buffer[shift..shift + CD_C2_SIZE]);
		}

		// Subcode plane.
		if layout.subcode_offset != CD_RAW_DATA_SIZE {
			out[CD_DATA_SIZE + CD_C2_SIZE..CD_RAW_DATA_SIZE]
				.copy_from_slice(&buffer[layout.subcode_offset..layout.subcode_offset + CD_SUBCODE_SIZE]);
		}
	}

	status
}
