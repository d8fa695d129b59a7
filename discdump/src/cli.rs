/*!
# Disc Dump: CLI
*/

use argyle::Argument;
use dactyl::traits::{
	BytesToSigned,
	BytesToUnsigned,
};
use discdump_core::{
	string_to_ranges,
	DriveType,
	DumpError,
	DumpOptions,
	ReadMethod,
	SectorOrder,
};



/// # Parsed Arguments.
pub(super) struct Parsed {
	/// # Modes, in Execution Order.
	pub(super) modes: Vec<String>,

	/// # Engine Options.
	pub(super) opts: DumpOptions,

	/// # Device Path.
	pub(super) dev: Option<String>,

	/// # Speed Multiplier.
	pub(super) speed: Option<u16>,

	/// # Drive Profile Overrides.
	pub(super) drive_type: Option<DriveType>,
	pub(super) drive_read_offset: Option<i32>,
	pub(super) drive_c2_shift: Option<u32>,
	pub(super) drive_pregap_start: Option<i32>,
	pub(super) drive_read_method: Option<ReadMethod>,
	pub(super) drive_sector_order: Option<SectorOrder>,
}



/// # Parse Options.
pub(super) fn parse() -> Result<Parsed, DumpError> {
	let args = argyle::args()
		.with_keywords(include!(concat!(env!("OUT_DIR"), "/argyle.rs")));

	let mut opts = DumpOptions::default();
	let mut modes = Vec::new();
	let mut dev = None;
	let mut speed = None;
	let mut drive_type = None;
	let mut drive_read_offset = None;
	let mut drive_c2_shift = None;
	let mut drive_pregap_start = None;
	let mut drive_read_method = None;
	let mut drive_sector_order = None;

	for arg in args {
		match arg {
			Argument::Key("--asus-skip-leadout") => { opts = opts.with_asus_skip_leadout(true); },
			Argument::Key("--disable-cdtext") => { opts = opts.with_disable_cdtext(true); },
			Argument::Key("-h" | "--help") => return Err(DumpError::PrintHelp),
			Argument::Key("--overwrite") => { opts = opts.with_overwrite(true); },
			Argument::Key("--plextor-skip-leadin") => { opts = opts.with_plextor_skip_leadin(true); },
			Argument::Key("--refine-subchannel") => { opts = opts.with_refine_subchannel(true); },
			Argument::Key("-v" | "--verbose") => { opts = opts.with_verbose(true); },
			Argument::Key("-V" | "--version") => return Err(DumpError::PrintVersion),

			Argument::KeyWithValue("-d" | "--drive", s) => { dev.replace(s); },
			Argument::KeyWithValue("--drive-c2-shift", s) => {
				let s = u32::btou(s.trim().as_bytes())
					.ok_or(DumpError::CliParse("--drive-c2-shift"))?;
				drive_c2_shift.replace(s);
			},
			Argument::KeyWithValue("--drive-pregap-start", s) => {
				let s = i32::btoi(s.trim().as_bytes())
					.ok_or(DumpError::CliParse("--drive-pregap-start"))?;
				drive_pregap_start.replace(s);
			},
			Argument::KeyWithValue("--drive-read-method", s) => {
				let s = ReadMethod::from_name(s.trim())
					.ok_or(DumpError::CliParse("--drive-read-method"))?;
				drive_read_method.replace(s);
			},
			Argument::KeyWithValue("--drive-read-offset", s) => {
				let s = i32::btoi(s.trim().as_bytes())
					.ok_or(DumpError::CliParse("--drive-read-offset"))?;
				drive_read_offset.replace(s);
			},
			Argument::KeyWithValue("--drive-sector-order", s) => {
				let s = SectorOrder::from_name(s.trim())
					.ok_or(DumpError::CliParse("--drive-sector-order"))?;
				drive_sector_order.replace(s);
			},
			Argument::KeyWithValue("--drive-type", s) => {
				let s = DriveType::from_name(s.trim())
					.ok_or(DumpError::CliParse("--drive-type"))?;
				drive_type.replace(s);
			},
			Argument::KeyWithValue("--image-name", s) => {
				opts = opts.with_image_name(s.trim());
			},
			Argument::KeyWithValue("--image-path", s) => {
				opts = opts.with_image_path(s.trim());
			},
			Argument::KeyWithValue("--lba-end", s) => {
				let s = i32::btoi(s.trim().as_bytes())
					.ok_or(DumpError::CliParse("--lba-end"))?;
				opts = opts.with_lba_end(s);
			},
			Argument::KeyWithValue("--lba-start", s) => {
				let s = i32::btoi(s.trim().as_bytes())
					.ok_or(DumpError::CliParse("--lba-start"))?;
				opts = opts.with_lba_start(s);
			},
			Argument::KeyWithValue("--retries", s) => {
				let s = u32::btou(s.trim().as_bytes())
					.ok_or(DumpError::CliParse("--retries"))?;
				opts = opts.with_retries(s);
			},
			Argument::KeyWithValue("--skip", s) => {
				let s = string_to_ranges(&s)
					.map_err(|_| DumpError::CliParse("--skip"))?;
				opts = opts.with_skip(s);
			},
			Argument::KeyWithValue("--speed", s) => {
				let s = u16::btou(s.trim().as_bytes())
					.ok_or(DumpError::CliParse("--speed"))?;
				speed.replace(s);
			},

			// Everything else is a mode.
			Argument::Other(s) => { modes.push(s.trim().to_ascii_lowercase()); },

			_ => {},
		}
	}

	Ok(Parsed {
		modes,
		opts,
		dev,
		speed,
		drive_type,
		drive_read_offset,
		drive_c2_shift,
		drive_pregap_start,
		drive_read_method,
		drive_sector_order,
	})
}
