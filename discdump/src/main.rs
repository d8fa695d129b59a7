/*!
# Disc Dump
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

mod cli;

use discdump_core::{
	aborted,
	interrupt,
	DriveConfig,
	DumpError,
	DumpLog,
	LibcdioDrive,
};
use fyi_msg::Msg;
use oxford_join::OxfordJoin;
use std::path::Path;
use utc2k::Utc2k;



/// # Main.
///
/// This lets us bubble up startup errors so they can be pretty-printed.
fn main() {
	match _main() {
		Ok(()) => {},
		Err(DumpError::PrintVersion) => {
			println!(concat!("Disc Dump v", env!("CARGO_PKG_VERSION")));
		},
		Err(DumpError::PrintHelp) => { helper(); },
		Err(e) => {
			Msg::from(e).eprint();
			std::process::exit(1);
		},
	}
}

#[inline]
/// # Actual Main.
///
/// This does all the stuff.
fn _main() -> Result<(), DumpError> {
	let mut parsed = cli::parse()?;
	validate(&mut parsed)?;

	// Hook up CTRL+C before anything long-running starts.
	sigint();

	// The log lives next to the image when there is one.
	let mut log =
		if parsed.opts.image_name().is_empty() { DumpLog::sink() }
		else { DumpLog::new(parsed.opts.stream_path("log"))? };

	log.line(concat!("Disc Dump v", env!("CARGO_PKG_VERSION")));
	log.line(&format!(
		"command: {}",
		std::env::args().skip(1).collect::<Vec<String>>().join(" "),
	));
	log.line(&format!("modes: {}", parsed.modes.oxford_and()));

	// Dump and refine need a live drive; everything else works from the
	// image files alone.
	let drive_required = parsed.modes.iter().any(|m| m == "dump" || m == "refine");
	let mut connection: Option<(LibcdioDrive, DriveConfig)> =
		if drive_required { Some(drive_init(&parsed, &mut log)?) }
		else { None };

	let mut skip_refine = false;
	for mode in &parsed.modes {
		if aborted() { break; }

		// Skip refine if dump already came back clean.
		if skip_refine && mode == "refine" { continue; }

		log.line(&format!("*** MODE: {mode}"));

		match mode.as_str() {
			"dump" => {
				let (drive, cfg) = connection.as_mut()
					.ok_or(DumpError::Bug("dump without a drive connection"))?;
				skip_refine = ! discdump_core::dump(drive, cfg, &parsed.opts, &mut log)?;
			},
			"refine" => {
				let (drive, cfg) = connection.as_mut()
					.ok_or(DumpError::Bug("refine without a drive connection"))?;
				discdump_core::refine(drive, cfg, &parsed.opts, &mut log)?;
			},
			"subchannel" => { discdump_core::subchannel(&parsed.opts, &mut log)?; },
			"protection" | "split" | "info" => {
				log.line(&format!("mode {mode} is handled by the post-processing tools, skipping"));
			},
			"rings" | "debug" => {
				log.line(&format!("mode {mode} is not supported in this build, skipping"));
			},
			_ => {
				log.line(&format!("warning: unknown mode, skipping ({mode})"));
			},
		}
	}

	if aborted() { Err(DumpError::Killed) }
	else { Ok(()) }
}

/// # Validate and Normalize.
///
/// Expand the `cd` meta-mode, fill in a generated image name where a dump
/// needs one, and make sure the image directory exists before the log tries
/// to live there.
fn validate(parsed: &mut cli::Parsed) -> Result<(), DumpError> {
	// No modes means the whole standard pipeline.
	if parsed.modes.is_empty() { parsed.modes.push("cd".to_owned()); }

	let mut modes = Vec::with_capacity(parsed.modes.len() + 4);
	for mode in parsed.modes.drain(..) {
		if mode == "cd" {
			for m in ["dump", "protection", "refine", "split", "info"] {
				modes.push(m.to_owned());
			}
		}
		else { modes.push(mode); }
	}
	parsed.modes = modes;

	// Windows drive letters want their colon back.
	#[cfg(windows)]
	if let Some(dev) = parsed.dev.as_mut() {
		if ! dev.ends_with(':') { dev.push(':'); }
	}

	// Fresh dumps can name themselves.
	if parsed.modes.iter().any(|m| m == "dump") && parsed.opts.image_name().is_empty() {
		let now = Utc2k::now();
		let drive_id: String = parsed.dev.as_deref()
			.unwrap_or("default")
			.chars()
			.filter(|&c| c != ':' && c != '/')
			.collect();
		parsed.opts = parsed.opts.clone().with_image_name(format!(
			"dump_{:02}{:02}{:02}_{:02}{:02}{:02}_{drive_id}",
			now.year() % 100, now.month(), now.day(),
			now.hour(), now.minute(), now.second(),
		));
	}

	// The image directory has to exist before the log opens inside it.
	if ! parsed.opts.image_name().is_empty() && ! parsed.opts.image_path().as_os_str().is_empty() {
		std::fs::create_dir_all(parsed.opts.image_path())
			.map_err(|_| DumpError::Write(parsed.opts.image_path().to_string_lossy().into_owned()))?;
	}

	Ok(())
}

/// # Connect and Prime the Drive.
fn drive_init(parsed: &cli::Parsed, log: &mut DumpLog)
-> Result<(LibcdioDrive, DriveConfig), DumpError> {
	let mut drive = LibcdioDrive::new(parsed.dev.as_deref().map(Path::new))?;

	// Test unit ready.
	let status = drive.test_unit_ready();
	if ! status.is_good() {
		return Err(DumpError::DriveNotReady(status.to_string()));
	}

	// Set drive speed; failure here is survivable.
	let speed = parsed.speed.map_or(0xFFFF, |s| s.saturating_mul(150));
	let status = drive.set_cd_speed(speed);
	if ! status.is_good() {
		log.line(&format!("drive set speed failed, SCSI ({status})"));
	}

	// Profile it.
	let (vendor, product) = drive.inquiry()?;
	let mut cfg = DriveConfig::detect(&vendor, &product);
	cfg.override_config(
		parsed.drive_type,
		parsed.drive_read_offset,
		parsed.drive_c2_shift,
		parsed.drive_pregap_start,
		parsed.drive_read_method,
		parsed.drive_sector_order,
	);

	log.line(&format!("drive path: {}", parsed.dev.as_deref().unwrap_or("(default)")));
	log.line(&format!("drive: {vendor} {product}"));
	log.line(&format!("drive configuration: {cfg}"));

	Ok((drive, cfg))
}

/// # Hook Up CTRL+C.
fn sigint() {
	let _res = ctrlc::set_handler(interrupt);
}

#[cold]
/// # Print Help.
fn helper() {
	println!(concat!(
		"Disc Dump v", env!("CARGO_PKG_VERSION"), r#"
Low-level, incremental optical disc dumping and recovery.

USAGE:
    discdump [MODES] [OPTIONS]

MODES:
    Positional, executed in order. "cd" expands to the standard pipeline:
    dump, protection, refine, split, info. Refine is skipped automatically
    when dump comes back clean.

    dump          Read the disc into raw LBA-indexed stream files.
    refine        Re-read only the sectors that still carry errors.
    subchannel    Decode and print the stored Channel-Q stream.

    The protection/split/info stages live in the post-processing tools.

BASIC SETTINGS:
        --image-name <NAME>
                      Base name for the image files.
                      [default: dump_<yymmdd_HHMMSS>_<drive>]
        --image-path <DIR>
                      Directory for the image files. [default: .]
        --retries <NUM>
                      Re-read attempts per defective sector during refine.
                      [default: 1]
        --skip <RNGs> Comma-separated LBA ranges (a-b) to leave unread.
        --overwrite   Allow dump to replace an existing image.

DRIVE SETTINGS:
    These are auto-detected and do not usually need to be provided.

    -d, --drive <PATH>
                      Device path, like /dev/sr0. [default: auto]
        --speed <NUM> Read speed multiplier (x150 KiB/s). [default: max]
        --drive-type <GENERIC|PLEXTOR|LG_ASU2|LG_ASU3>
        --drive-read-offset <SAMPLES>
        --drive-c2-shift <BYTES>
        --drive-pregap-start <LBA>
        --drive-read-method <BE|BE_CDDA|D8>
        --drive-sector-order <DATA_C2_SUB|DATA_SUB_C2|DATA_SUB|DATA>

UNUSUAL SETTINGS:
        --refine-subchannel
                      Also re-read sectors whose stored Q fails its CRC.
        --asus-skip-leadout
                      Skip the LG/ASUS lead-out cache scrape.
        --plextor-skip-leadin
                      Skip the Plextor lead-in capture.
        --disable-cdtext
                      Do not request CD-TEXT.

MISCELLANEOUS:
    -h, --help        Print help information and exit.
    -v, --verbose     Report every per-sector SCSI/C2 event.
    -V, --version     Print version information and exit.

EARLY EXIT:
    CTRL+C stops the current pass at the next sector boundary; the stream
    files stay consistent and a later refine picks up where things left off.
"#
	));
}
