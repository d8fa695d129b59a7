/*!
# Disc Dump: PSX Protection Detection
*/

use crate::{
	lba_to_msf,
	read_entry,
	ChannelQ,
	DumpError,
	StreamFile,
	CD_DATA_SIZE,
	CD_SUBCODE_SIZE,
	LBA_START,
};
use regex::Regex;



/// # PSX Executable Magic.
const EXE_MAGIC: &[u8] = b"PS-X EXE";

/// # ISO-9660 System Area (Sectors).
const SYSTEM_AREA_SIZE: i32 = 16;

/// # Known LibCrypt Base Sectors.
const LIBCRYPT_SECTORS_BASE: [i32; 32] = [
	13955, 14081, 14335, 14429, 14499, 14749, 14906, 14980,
	15092, 15162, 15228, 15478, 15769, 15881, 15951, 16017,
	41895, 42016, 42282, 42430, 42521, 42663, 42862, 43027,
	43139, 43204, 43258, 43484, 43813, 43904, 44009, 44162,
];

/// # Twin-Sector Shift.
const LIBCRYPT_SECTORS_SHIFT: i32 = 5;

/// # Accepted Candidate Totals.
const LIBCRYPT_SECTORS_COUNT: [usize; 2] = [16, 32];

/// # Serial Prefixes: Japan.
const REGION_J: [&str; 11] = [
	"ESPM", "PAPX", "PCPX", "PDPX", "SCPM", "SCPS", "SCZS", "SIPS", "SLKA", "SLPM", "SLPS",
];

/// # Serial Prefixes: USA.
const REGION_U: [&str; 5] = ["LSP", "PEPX", "SCUS", "SLUS", "SLUSP"];

/// # Serial Prefixes: Europe.
const REGION_E: [&str; 5] = ["PUPX", "SCED", "SCES", "SLED", "SLES"];

/// # Anti-Modchip Message (English).
const ANTIMOD_MESSAGE_EN: &[u8] =
	b"     SOFTWARE TERMINATED\nCONSOLE MAY HAVE BEEN MODIFIED\n     CALL 1-888-780-7690";

/// # Anti-Modchip Message (Japanese, Shift-JIS).
const ANTIMOD_MESSAGE_JP: &[u8] = &[
	0x8b, 0xad, 0x90, 0xa7, 0x8f, 0x49, 0x97, 0xb9, 0x82, 0xb5, 0x82, 0xdc, 0x82, 0xb5, 0x82, 0xbd,
	0x81, 0x42, 0x0a,
	0x96, 0x7b, 0x91, 0xcc, 0x82, 0xaa, 0x89, 0xfc, 0x91, 0xa2, 0x82, 0xb3, 0x82, 0xea, 0x82, 0xc4,
	0x82, 0xa2, 0x82, 0xe9, 0x0a,
	0x82, 0xa8, 0x82, 0xbb, 0x82, 0xea, 0x82, 0xaa, 0x82, 0xa0, 0x82, 0xe8, 0x82, 0xdc, 0x82, 0xb7,
	0x81, 0x42,
];



/// # Data Track Browser.
///
/// The ISO-9660 reader lives elsewhere; this is the sliver of it the
/// detector needs. Paths are slash-separated and relative to the image
/// root.
pub trait TrackBrowser {
	/// # Read a File by Path.
	fn read_file(&self, path: &str) -> Option<Vec<u8>>;

	/// # Visit Every File.
	///
	/// The callback receives the full path and the file contents.
	fn iterate(&self, cb: &mut dyn FnMut(&str, &[u8]));
}



/// # Find the Boot Executable.
///
/// Parse the `BOOT` line out of `SYSTEM.CNF`, uppercased; discs without one
/// boot `PSX.EXE` from the root.
pub(crate) fn find_exe(browser: &dyn TrackBrowser) -> Option<String> {
	if let Some(data) = browser.read_file("SYSTEM.CNF") {
		let text = String::from_utf8_lossy(&data);
		// Observed in the wild, all of:
		//   BOOT = cdrom:\SCUS_945.03;1
		//   BOOT=cdrom:\SLPS_004.35
		//   BOOT = cdrom:\EXE\PCPX_961.61;1
		let re = Regex::new(r"^\s*BOOT.*=\s*cdrom.?:\\*(.*?)(?:;.*\s*|\s*$)").ok()?;
		for line in text.lines() {
			if let Some(caps) = re.captures(line) {
				return Some(caps[1].to_uppercase());
			}
		}
		None
	}
	else if browser.read_file("PSX.EXE").is_some() {
		Some("PSX.EXE".to_owned())
	}
	else { None }
}

/// # Deduce the Serial From an Executable Path.
///
/// Returns the (prefix, number) pair, e.g. `("SCUS", "94423")`.
pub(crate) fn deduce_serial(exe_path: &str) -> Option<(String, String)> {
	let re = Regex::new(r"^(?:.*\\)*([A-Z]*)[_-]?([A-Z]?[0-9]+)\.([0-9]+[A-Z]?)$").ok()?;
	let caps = re.captures(exe_path)?;

	let mut prefix = caps[1].to_owned();
	let mut number = format!("{}{}", &caps[2], &caps[3]);

	// Road Writer (USA) has no prefix at all.
	if prefix.is_empty() && number == "907127001" {
		prefix = "LSP".to_owned();
	}
	// GameGenius Ver. 5.0 (Taiwan) only looks like a serial.
	else if prefix == "PAR" && number == "90001" {
		prefix.clear();
		number.clear();
	}

	if prefix.is_empty() || number.is_empty() { None }
	else { Some((prefix, number)) }
}

/// # Region From a Serial Prefix.
pub(crate) fn detect_region(prefix: &str) -> Option<&'static str> {
	if REGION_J.contains(&prefix) { Some("Japan") }
	else if REGION_U.contains(&prefix) { Some("USA") }
	else if REGION_E.contains(&prefix) { Some("Europe") }
	else { None }
}

/// # Quick EDC Probe.
///
/// Read the last system-area sector; if it is Mode 2 Form 2, report whether
/// its (optional) EDC field is populated. Post-1998 pressings fill it in;
/// early ones leave it zero.
///
/// ## Errors
///
/// Returns an error if the track stream cannot be read.
pub(crate) fn detect_edc_fast(track: &mut dyn StreamFile) -> Result<bool, DumpError> {
	let sectors_count = track.stream_len()
		.map_err(|e| DumpError::Read(e.to_string()))?
		.wrapping_div(CD_DATA_SIZE as u64);
	if sectors_count < SYSTEM_AREA_SIZE as u64 { return Ok(false); }

	let mut sector = [0_u8; CD_DATA_SIZE];
	read_entry(track, &mut sector, CD_DATA_SIZE, SYSTEM_AREA_SIZE - 1, 1, 0, 0)?;

	// Mode 2, XA submode FORM2 bit, EDC in the trailing four bytes.
	Ok(
		sector[15] == 2 &&
		sector[18] & 0x20 != 0 &&
		sector[CD_DATA_SIZE - 4..] != [0, 0, 0, 0]
	)
}

/// # Scan for Anti-Modchip Messages.
///
/// Byte-search every file for the known English and Shift-JIS lockout
/// strings, reporting `path @ 0xOFFSET: EN/JP` for each hit.
pub(crate) fn find_anti_modchip_strings(browser: &dyn TrackBrowser) -> Vec<String> {
	let mut entries = Vec::new();

	browser.iterate(&mut |path, data| {
		if let Some(at) = find_bytes(data, ANTIMOD_MESSAGE_EN) {
			entries.push(format!("{path} @ {at:#x}: EN"));
		}
		if let Some(at) = find_bytes(data, ANTIMOD_MESSAGE_JP) {
			entries.push(format!("{path} @ {at:#x}: JP"));
		}
	});

	entries
}

/// # LibCrypt Check.
///
/// The protection stamps deliberately-broken Q CRCs onto a fixed set of
/// sectors, always in `base`/`base + 5` pairs, always 8 or 16 pairs total.
/// Anything else failing its CRC is ordinary wear, not a signature.
///
/// Returns the report lines (Q bytes per flagged sector) when the pattern
/// matches, or nothing.
///
/// ## Errors
///
/// Returns an error if the subcode stream cannot be read.
pub(crate) fn detect_libcrypt(sub: &mut dyn StreamFile, lba_end: i32)
-> Result<Vec<String>, DumpError> {
	let mut candidates = Vec::new();

	let mut sub_buffer = [0_u8; CD_SUBCODE_SIZE];
	let read_q = |sub: &mut dyn StreamFile, lba: i32, buf: &mut [u8; CD_SUBCODE_SIZE]| {
		read_entry(sub, buf, CD_SUBCODE_SIZE, lba - LBA_START, 1, 0, 0)
			.map(|()| ChannelQ::from_subcode(buf))
	};

	for base in LIBCRYPT_SECTORS_BASE {
		let lba1 = base;
		let lba2 = base + LIBCRYPT_SECTORS_SHIFT;
		if lba1 >= lba_end || lba2 >= lba_end { continue; }

		let q1 = read_q(sub, lba1, &mut sub_buffer)?;
		let q2 = read_q(sub, lba2, &mut sub_buffer)?;

		if ! q1.valid() && ! q2.valid() {
			candidates.push(lba1);
			candidates.push(lba2);
		}
	}

	if ! LIBCRYPT_SECTORS_COUNT.contains(&candidates.len()) { return Ok(Vec::new()); }

	let mut out = Vec::with_capacity(candidates.len());
	for lba in candidates {
		let q = read_q(sub, lba, &mut sub_buffer)?;
		let msf = lba_to_msf(lba);
		let (m, s, f) = (q.msf().m, q.msf().s, q.msf().f);
		let (am, asx, af) = (q.a_msf().m, q.a_msf().s, q.a_msf().f);
		out.push(format!(
			"MSF: {:02}:{:02}:{:02} Q-Data: {:02X}{:02X}{:02X} {m:02X}:{s:02X}:{f:02X} {:02X} {am:02X}:{asx:02X}:{af:02X} {:04X}",
			msf.m, msf.s, msf.f,
			q.control_adr(), q.tno(), q.index(),
			q.zero(),
			q.crc(),
		));
	}

	Ok(out)
}

/// # Full PSX Report.
///
/// The `protection` stage's view of a data track: identify the boot
/// executable, serial, and region, then run the EDC, anti-modchip, and
/// LibCrypt probes. Returns `None` when the track isn't a PSX image at all.
///
/// ## Errors
///
/// Returns an error if stream reads fail along the way.
pub fn psx_report(
	browser: &dyn TrackBrowser,
	track: &mut dyn StreamFile,
	sub: Option<&mut dyn StreamFile>,
) -> Result<Option<String>, DumpError> {
	let Some(exe_path) = find_exe(browser) else { return Ok(None); };
	let Some(exe) = browser.read_file(&exe_path) else { return Ok(None); };
	if ! exe.starts_with(EXE_MAGIC) { return Ok(None); }

	let mut out = String::new();
	out.push_str(&format!("  EXE: {exe_path}\n"));

	if let Some((prefix, number)) = deduce_serial(&exe_path) {
		out.push_str(&format!("  serial: {prefix}-{number}\n"));
		if let Some(region) = detect_region(&prefix) {
			out.push_str(&format!("  region: {region}\n"));
		}
	}

	let edc = detect_edc_fast(track)?;
	out.push_str(&format!("  EDC: {}\n", if edc { "yes" } else { "no" }));

	let antimod = find_anti_modchip_strings(browser);
	out.push_str(&format!("  anti-modchip: {}\n", if antimod.is_empty() { "no" } else { "yes" }));
	for line in antimod {
		out.push_str(&format!("    {line}\n"));
	}

	if let Some(sub) = sub {
		let lba_end = track.stream_len()
			.map_err(|e| DumpError::Read(e.to_string()))?
			.wrapping_div(CD_DATA_SIZE as u64) as i32;
		let libcrypt = detect_libcrypt(sub, lba_end)?;
		out.push_str(&format!("  libcrypt: {}\n", if libcrypt.is_empty() { "no" } else { "yes" }));
		for line in libcrypt {
			out.push_str(&format!("    {line}\n"));
		}
	}

	Ok(Some(out))
}



/// # Naive Byte Search.
fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	if needle.is_empty() || haystack.len() < needle.len() { return None; }
	haystack.windows(needle.len()).position(|w| w == needle)
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		subcode::position_subcode,
		write_entry,
		MemStream,
	};
	use std::collections::HashMap;

	/// # Browser Over a Map.
	struct MockBrowser(HashMap<String, Vec<u8>>);

	impl TrackBrowser for MockBrowser {
		fn read_file(&self, path: &str) -> Option<Vec<u8>> {
			self.0.get(path).cloned()
		}

		fn iterate(&self, cb: &mut dyn FnMut(&str, &[u8])) {
			let mut paths: Vec<&String> = self.0.keys().collect();
			paths.sort();
			for path in paths {
				cb(path, &self.0[path]);
			}
		}
	}

	#[test]
	fn t_find_exe() {
		let mut files = HashMap::new();
		files.insert(
			"SYSTEM.CNF".to_owned(),
			b"BOOT = cdrom:\\SCUS_944.23;1\r\nTCB = 4\r\n".to_vec(),
		);
		let browser = MockBrowser(files);
		assert_eq!(find_exe(&browser).as_deref(), Some("SCUS_944.23"));

		// Subdirectory form.
		let mut files = HashMap::new();
		files.insert(
			"SYSTEM.CNF".to_owned(),
			b"BOOT = cdrom:\\EXE\\PCPX_961.61;1\r\n".to_vec(),
		);
		let browser = MockBrowser(files);
		assert_eq!(find_exe(&browser).as_deref(), Some("EXE\\PCPX_961.61"));

		// No config, but a root PSX.EXE.
		let mut files = HashMap::new();
		files.insert("PSX.EXE".to_owned(), b"PS-X EXE".to_vec());
		let browser = MockBrowser(files);
		assert_eq!(find_exe(&browser).as_deref(), Some("PSX.EXE"));

		// Nothing at all.
		let browser = MockBrowser(HashMap::new());
		assert_eq!(find_exe(&browser), None);
	}

	#[test]
	fn t_serial_region() {
		assert_eq!(
			deduce_serial("SCUS_944.23"),
			Some(("SCUS".to_owned(), "94423".to_owned())),
		);
		assert_eq!(detect_region("SCUS"), Some("USA"));

		assert_eq!(
			deduce_serial("EXE\\PCPX_961.61"),
			Some(("PCPX".to_owned(), "96161".to_owned())),
		);
		assert_eq!(detect_region("PCPX"), Some("Japan"));
		assert_eq!(detect_region("SLES"), Some("Europe"));
		assert_eq!(detect_region("XXXX"), None);

		// The two hardcoded oddballs.
		assert_eq!(
			deduce_serial("907127.001"),
			Some(("LSP".to_owned(), "907127001".to_owned())),
		);
		assert_eq!(deduce_serial("PAR_900.01"), None);

		// Not serial-shaped at all.
		assert_eq!(deduce_serial("PSX.EXE"), None);
	}

	#[test]
	fn t_edc() {
		// A Mode 2 Form 2 sector at the last system-area slot, EDC filled.
		let mut track = MemStream::new();
		let mut sector = [0_u8; CD_DATA_SIZE];
		sector[15] = 2;
		sector[18] = 0x20;
		sector[CD_DATA_SIZE - 4..].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
		write_entry(&mut track, &sector, CD_DATA_SIZE, SYSTEM_AREA_SIZE - 1, 1, 0).unwrap();
		// Pad the stream out to a full system area.
		write_entry(&mut track, &[0; CD_DATA_SIZE], CD_DATA_SIZE, SYSTEM_AREA_SIZE, 1, 0).unwrap();

		assert!(detect_edc_fast(&mut track).unwrap(), "Filled EDC should report yes.");

		// Zeroed EDC reports no.
		sector[CD_DATA_SIZE - 4..].fill(0);
		write_entry(&mut track, &sector, CD_DATA_SIZE, SYSTEM_AREA_SIZE - 1, 1, 0).unwrap();
		assert!(! detect_edc_fast(&mut track).unwrap());

		// Too-short tracks can't be probed.
		let mut track = MemStream::from_vec(vec![0; CD_DATA_SIZE * 4]);
		assert!(! detect_edc_fast(&mut track).unwrap());
	}

	#[test]
	fn t_antimod() {
		let mut files = HashMap::new();
		let mut exe = vec![0_u8; 512];
		exe[100..100 + ANTIMOD_MESSAGE_EN.len()].copy_from_slice(ANTIMOD_MESSAGE_EN);
		files.insert("MAIN.EXE".to_owned(), exe);
		files.insert("CLEAN.DAT".to_owned(), vec![0; 256]);

		let browser = MockBrowser(files);
		let hits = find_anti_modchip_strings(&browser);
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0], "MAIN.EXE @ 0x64: EN");
	}

	#[test]
	fn t_libcrypt() {
		let lba_end = 50_000;

		// Valid Q everywhere the detector looks, except eight chosen pairs.
		let mut sub = MemStream::new();
		for (i, &base) in LIBCRYPT_SECTORS_BASE.iter().enumerate() {
			for lba in [base, base + LIBCRYPT_SECTORS_SHIFT] {
				let buf =
					if i < 8 { [0_u8; CD_SUBCODE_SIZE] } // Invalid.
					else { position_subcode(1, 1, lba) };
				write_entry(&mut sub, &buf, CD_SUBCODE_SIZE, lba - LBA_START, 1, 0).unwrap();
			}
		}

		let lines = detect_libcrypt(&mut sub, lba_end).expect("Detection failed.");
		assert_eq!(lines.len(), 16, "Eight pairs should flag sixteen sectors.");
		assert!(lines[0].starts_with("MSF: "), "Report lines should lead with the MSF.");

		// Half-broken pairs don't count: fix one sector of each pair.
		let mut sub2 = MemStream::new();
		for (i, &base) in LIBCRYPT_SECTORS_BASE.iter().enumerate() {
			for (j, lba) in [base, base + LIBCRYPT_SECTORS_SHIFT].into_iter().enumerate() {
				let buf =
					if i < 8 && j == 0 { [0_u8; CD_SUBCODE_SIZE] }
					else { position_subcode(1, 1, lba) };
				write_entry(&mut sub2, &buf, CD_SUBCODE_SIZE, lba - LBA_START, 1, 0).unwrap();
			}
		}
		assert!(
			detect_libcrypt(&mut sub2, lba_end).unwrap().is_empty(),
			"Single-sector corruption is not the signature.",
		);

		// An all-invalid stream (64 candidates) isn't the signature either.
		let mut sub3 = MemStream::from_vec(vec![0; ((lba_end - LBA_START) as usize) * CD_SUBCODE_SIZE]);
		assert!(detect_libcrypt(&mut sub3, lba_end).unwrap().is_empty());
	}

	#[test]
	fn t_report() {
		let mut files = HashMap::new();
		files.insert(
			"SYSTEM.CNF".to_owned(),
			b"BOOT = cdrom:\\SCUS_944.23;1\r\n".to_vec(),
		);
		files.insert("SCUS_944.23".to_owned(), b"PS-X EXE then some".to_vec());
		let browser = MockBrowser(files);

		let mut track = MemStream::from_vec(vec![0; CD_DATA_SIZE * 32]);
		let report = psx_report(&browser, &mut track, None)
			.expect("Report failed.")
			.expect("Track should read as PSX.");

		assert!(report.contains("EXE: SCUS_944.23"));
		assert!(report.contains("serial: SCUS-94423"));
		assert!(report.contains("region: USA"));
		assert!(report.contains("EDC: no"));
		assert!(report.contains("anti-modchip: no"));

		// A non-PSX track comes back empty-handed.
		let browser = MockBrowser(HashMap::new());
		let mut track = MemStream::new();
		assert!(psx_report(&browser, &mut track, None).unwrap().is_none());
	}
}
