/*!
# Disc Dump: Dump/Refine Engine

The per-LBA loop. One pass of it acquires raw sectors (data, C2, subcode),
classifies the results, and merges them into the persistent LBA-indexed
streams; `dump` and `refine` are the same loop with different selection and
merge rules, exactly as the stream formats are shared between them.
*/

mod asus;
mod opts;
mod plextor;

pub use opts::DumpOptions;

use crate::{
	inside_range,
	msf_to_lba,
	percentage,
	read_entry,
	read_sector,
	sector_order_layout,
	state_from_c2,
	write_entry,
	ChannelQ,
	DriveConfig,
	DriveHandle,
	DriveType,
	DumpError,
	DumpLog,
	ReadMethod,
	SampleState,
	SignalGuard,
	CD_C2_SIZE,
	CD_DATA_SIZE,
	CD_RAW_DATA_SIZE,
	CD_SAMPLE_SIZE,
	CD_SUBCODE_SIZE,
	LBA_START,
	MSF,
	MSF_LBA_SHIFT,
	SAMPLES_PER_SECTOR,
	SLOW_SECTOR_TIMEOUT,
	entry_count,
	state::merge_sector,
	Toc,
};
use std::{
	fs::{
		File,
		OpenOptions,
	},
	path::Path,
	time::Instant,
};



/// # Consecutive Bad Qs Before a Cache Flush.
///
/// Some Plextors byte-desync the subcode stream after a mass of high-count
/// C2 errors at speed; flushing after a short run of invalid Qs stops the
/// cascade.
const Q_ERROR_FLUSH_TRIGGER: u32 = 5;

/// # Lead-Out Sectors Worth Pulling From an LG/ASUS Cache.
const ASUS_LEADOUT_LIMIT: usize = 100;



/// # Dump a Disc.
///
/// First pass: create the streams and fill them, sector by sector.
///
/// Returns `true` when a follow-up [`refine`] could still improve things,
/// i.e. media errors were recorded (or the drive family always warrants a
/// second look).
///
/// ## Errors
///
/// Returns an error for fatal conditions: state conflicts, transport
/// failures at init, stream I/O trouble. Per-sector media errors are counted
/// and logged, never raised.
pub fn dump(
	drive: &mut dyn DriveHandle,
	cfg: &DriveConfig,
	opts: &DumpOptions,
	log: &mut DumpLog,
) -> Result<bool, DumpError> {
	run(drive, cfg, opts, log, false).map(|r| r.needs_refine)
}

/// # Refine a Dump.
///
/// Second pass over existing streams: locate LBAs whose state still carries
/// `ErrorSkip`/`ErrorC2` samples (or, optionally, a broken Q), re-read them
/// with a bounded retry budget, and keep whichever samples come back better.
///
/// ## Errors
///
/// Same contract as [`dump`].
pub fn refine(
	drive: &mut dyn DriveHandle,
	cfg: &DriveConfig,
	opts: &DumpOptions,
	log: &mut DumpLog,
) -> Result<bool, DumpError> {
	run(drive, cfg, opts, log, true).map(|r| r.needs_refine)
}

/// # Walk a Subcode Stream.
///
/// Decode and print Channel-Q for every stored sector, collapsing runs of
/// blank Q into a single ellipsis.
///
/// ## Errors
///
/// Returns an error if the subcode stream is missing or ragged.
pub fn subchannel(opts: &DumpOptions, log: &mut DumpLog) -> Result<(), DumpError> {
	let sub_path = opts.stream_path("subcode");
	let mut fs_sub = File::open(&sub_path)
		.map_err(|_| DumpError::Read(sub_path.to_string_lossy().into_owned()))?;
	let sectors_count = entry_count(&mut fs_sub, CD_SUBCODE_SIZE as u64)?;

	let mut empty = false;
	let mut sub_buffer = [0_u8; CD_SUBCODE_SIZE];
	for lba_index in 0..sectors_count as i32 {
		read_entry(&mut fs_sub, &mut sub_buffer, CD_SUBCODE_SIZE, lba_index, 1, 0, 0)?;

		let q = ChannelQ::from_subcode(&sub_buffer);
		if q.is_empty() {
			if ! empty {
				log.console("...");
				empty = true;
			}
		}
		else {
			log.console(&format!(
				"[LBA: {:6}, LBAQ: {:6}] {q}",
				LBA_START + lba_index,
				q.a_lba(),
			));
			empty = false;
		}
	}

	Ok(())
}



#[derive(Debug, Clone, Copy)]
/// # Pass Outcome.
pub(crate) struct DumpResult {
	/// # Another Pass Could Help.
	pub(crate) needs_refine: bool,

	/// # Sectors Lost to SCSI Errors.
	pub(crate) errors_scsi: u32,

	/// # Sectors With C2 Errors.
	pub(crate) errors_c2: u32,

	/// # Sectors With Invalid Q.
	pub(crate) errors_q: u32,
}



#[allow(
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_sign_loss,
	clippy::too_many_lines,
)]
/// # The Loop Itself.
///
/// Dump and refine share everything below; `refine` swaps the blanket
/// store for a select/retry/merge cycle against the stored state.
pub(crate) fn run(
	drive: &mut dyn DriveHandle,
	cfg: &DriveConfig,
	opts: &DumpOptions,
	log: &mut DumpLog,
	refine: bool,
) -> Result<DumpResult, DumpError> {
	if opts.image_name().is_empty() { return Err(DumpError::ImageName); }

	let scm_path = opts.stream_path("scram");
	let scp_path = opts.stream_path("scrap");
	let sub_path = opts.stream_path("subcode");
	let state_path = opts.stream_path("state");
	let toc_path = opts.stream_path("toc");
	let fulltoc_path = opts.stream_path("fulltoc");
	let cdtext_path = opts.stream_path("cdtext");
	let asus_path = opts.stream_path("asus");

	if ! refine && ! opts.overwrite() && state_path.exists() {
		return Err(DumpError::DumpExists(opts.image_name().to_owned()));
	}

	let skip_ranges = opts.skip().to_vec();
	let mut error_ranges: Vec<(i32, i32)> = Vec::new();

	let mut lba_start = cfg.pregap_start;
	// Default disc length: 74min / 650MB.
	let mut lba_end = msf_to_lba(MSF::new(74, 0, 0));

	// TOC, preferring FULL-TOC when it reveals extra sessions.
	let toc_buffer = drive.read_toc()?;
	let mut toc = Toc::parse(&toc_buffer)?;

	let full_toc_buffer = drive.read_full_toc()?;
	if ! full_toc_buffer.is_empty() {
		let mut toc_full = Toc::parse_full(&full_toc_buffer)?;

		// Some units misreport FULL-TOC track positions; the short TOC's
		// indices always win.
		toc_full.derive_indices(&toc);

		if toc_full.sessions.len() > 1 { toc = toc_full; }
		else { toc.disc_type = toc_full.disc_type; }
	}

	if ! refine {
		log.line("");
		log.line("disc TOC:");
		for line in toc.to_string().lines() { log.line(line); }
		log.line("");
	}

	let layout = sector_order_layout(cfg.sector_order);
	let subcode = layout.subcode_offset != CD_RAW_DATA_SIZE;
	if ! subcode {
		log.line("warning: drive doesn't support reading of subchannel data");
	}
	if layout.c2_offset == CD_RAW_DATA_SIZE {
		log.line("warning: drive doesn't support C2 error pointers");
	}

	// A BE read against data tracks hands back descrambled sectors; those
	// dumps live under a different extension so nothing downstream mistakes
	// them for the raw scrambled stream.
	let mut scrap = false;
	if cfg.read_method == ReadMethod::Be && toc.has_data_tracks() {
		if ! cfg.type_overridden && toc.has_audio_tracks() {
			return Err(DumpError::ReadMethodUnsupported);
		}

		log.line("warning: unsupported drive read method");
		scrap = true;
	}

	if refine && ((scm_path.exists() && scrap) || (scp_path.exists() && ! scrap)) {
		return Err(DumpError::MixedReadMethods);
	}

	// Same disc as last time?
	if refine {
		let toc_buffer_file = std::fs::read(&toc_path)
			.map_err(|_| DumpError::Read(toc_path.to_string_lossy().into_owned()))?;
		if toc_buffer != toc_buffer_file { return Err(DumpError::TocMismatch); }
	}
	// First time through: persist the verbatim responses.
	else {
		if ! opts.image_path().as_os_str().is_empty() {
			std::fs::create_dir_all(opts.image_path())
				.map_err(|_| DumpError::Write(opts.image_path().to_string_lossy().into_owned()))?;
		}

		// Remnants of the other dump flavor have to go.
		let other = if scrap { &scm_path } else { &scp_path };
		if other.exists() {
			std::fs::remove_file(other)
				.map_err(|_| DumpError::Write(other.to_string_lossy().into_owned()))?;
		}

		write_blob(&toc_path, &toc_buffer)?;
		if ! full_toc_buffer.is_empty() { write_blob(&fulltoc_path, &full_toc_buffer)?; }

		let mut read_cdtext = ! opts.disable_cdtext();
		// One drive hangs indefinitely on multisession CD-TEXT.
		if
			toc.sessions.len() > 1 &&
			cfg.vendor_id == "PLEXTOR" && cfg.product_id == "CD-R PX-W4824A"
		{
			read_cdtext = false;
		}

		if read_cdtext {
			let mut cd_text_buffer = Vec::new();
			let status = drive.read_cd_text(&mut cd_text_buffer);
			if ! status.is_good() {
				log.line(&format!("warning: unable to read CD-TEXT, SCSI ({status})"));
			}
			else if ! cd_text_buffer.is_empty() {
				write_blob(&cdtext_path, &cd_text_buffer)?;
			}
		}
		else { log.line("warning: CD-TEXT disabled"); }
	}

	// Fresh dumps start from zero-length streams; refine keeps them.
	let mut fs_scm = open_stream(if scrap { &scp_path } else { &scm_path }, ! refine)?;
	let mut fs_sub =
		if subcode { Some(open_stream(&sub_path, ! refine)?) }
		else { None };
	let mut fs_state = open_stream(&state_path, ! refine)?;

	// Certain protected pressings ship a deliberately bogus TOC.
	if toc.is_fake() {
		log.line("warning: fake TOC detected, using default 74min disc size");
	}
	else if let Some(t) = toc.last_track() { lba_end = t.lba_end; }

	// Inter-session gaps cannot be read normally and must not count as
	// errors.
	for i in 1..toc.sessions.len() {
		let prev_end = toc.sessions[i - 1].tracks.last()
			.map_or(lba_end, |t| t.lba_end);
		let next_start = toc.sessions[i].tracks.first()
			.map_or(lba_end, |t| t.indices.first().copied().unwrap_or(t.lba_start));
		error_ranges.push((prev_end, next_start + cfg.pregap_start));
	}

	// Grab the lead-in up front; doing it before the main loop improves the
	// odds of catching every session in one go.
	if cfg.drive_type == DriveType::Plextor && ! opts.plextor_skip_leadin() {
		if let Some(fs_sub) = fs_sub.as_mut() {
			let mut session_lba_start = Vec::with_capacity(toc.sessions.len());
			for (i, s) in toc.sessions.iter().enumerate() {
				let base =
					if i == 0 { 0 }
					else {
						s.tracks.first()
							.map_or(0, |t| t.indices.first().copied().unwrap_or(t.lba_start))
					};
				session_lba_start.push(base + MSF_LBA_SHIFT);
			}

			plextor::store_sessions_leadin(
				&mut fs_scm, fs_sub, &mut fs_state,
				drive, cfg, &session_lba_start, opts, log,
			)?;
		}
	}

	if let Some(v) = opts.lba_start() { lba_start = v; }
	if let Some(v) = opts.lba_end() { lba_end = v; }

	let mut errors_scsi: u32 = 0;
	let mut errors_c2: u32 = 0;
	let mut errors_q: u32 = 0;

	let mut sector_data = [0_u8; CD_DATA_SIZE];
	let mut sector_subcode = [0_u8; CD_SUBCODE_SIZE];
	let mut sector_state = [SampleState::ErrorSkip; SAMPLES_PER_SECTOR];

	let mut subcode_shift: i32 = 0;

	let mut asus_leadout_buffer: Vec<u8> = Vec::new();

	let mut lba_refine = LBA_START - 1;
	let mut refine_counter: u32 = 0;
	let mut refine_processed: u32 = 0;
	let mut refine_count: u32 = 0;
	let refine_retries = opts.retries().max(1);

	// Tally the work ahead so refine progress means something.
	if refine {
		for lba in lba_start..lba_end {
			if inside_range(lba, &skip_ranges).is_some() || inside_range(lba, &error_ranges).is_some() {
				continue;
			}

			let lba_index = lba - LBA_START;
			let mut refine_sector = false;

			let state = read_state(&mut fs_state, lba_index, cfg.read_offset)?;
			let scsi_exists = state.iter().any(|&s| s == SampleState::ErrorSkip);
			let c2_exists = state.iter().any(|&s| s == SampleState::ErrorC2);

			if scsi_exists {
				errors_scsi += 1;
				refine_sector = true;
			}
			else if c2_exists {
				errors_c2 += 1;
				refine_sector = true;
			}

			if let Some(fs_sub) = fs_sub.as_mut() {
				read_entry(fs_sub, &mut sector_subcode, CD_SUBCODE_SIZE, lba_index, 1, 0, 0)?;
				if ! ChannelQ::from_subcode(&sector_subcode).valid() {
					errors_q += 1;
					if opts.refine_subchannel() { refine_sector = true; }
				}
			}

			if refine_sector { refine_count += 1; }
		}
	}

	let mut errors_q_last = errors_q;

	log.line(&format!("{} started", if refine { "refine" } else { "dump" }));
	let time_start = Instant::now();

	let guard = SignalGuard::engage();

	let mut lba_overread = lba_end;
	let mut lba = lba_start;
	while lba < lba_overread {
		if let Some(r) = inside_range(lba, &skip_ranges) {
			lba = r.1;
			continue;
		}
		let mut lba_next = lba + 1;

		let lba_index = lba - LBA_START;

		let mut read = true;
		let mut flush = false;
		let mut store = false;

		// Mirrored lead-out: these drives keep reads past the TOC end in an
		// internal cache that a vendor command can scrape.
		if cfg.is_asus() && ! opts.asus_skip_leadout() {
			let r = inside_range(lba, &error_ranges);

			// Initial cache read at each boundary.
			if r.map_or(false, |r| lba == r.0) || lba == lba_end {
				// A dummy read forces the cache to span the boundary.
				if refine {
					let mut sector_buffer = vec![0_u8; CD_RAW_DATA_SIZE];
					let _status = read_sector(&mut sector_buffer, drive, cfg, lba - 1);
				}

				log.line(&format!("LG/ASUS: searching lead-out in cache (LBA: {lba:6})"));
				let cache = drive.asus_cache_read()?;
				write_blob(&asus_path, &cache)?;

				asus_leadout_buffer = asus::cache_extract(&cache, lba, ASUS_LEADOUT_LIMIT);

				let entries_count = asus_leadout_buffer.len().wrapping_div(CD_RAW_DATA_SIZE);
				if entries_count == 0 { log.line("LG/ASUS: lead-out not found"); }
				else {
					log.line(&format!("LG/ASUS: lead-out found (LBA: {lba:6}, sectors: {entries_count})"));
				}
			}

			if r.map_or(false, |r| lba >= r.0) || lba >= lba_end {
				let leadout_index = (lba - r.map_or(lba_end, |r| r.0)) as usize;
				if leadout_index < asus_leadout_buffer.len().wrapping_div(CD_RAW_DATA_SIZE) {
					let entry = &asus_leadout_buffer[CD_RAW_DATA_SIZE * leadout_index..CD_RAW_DATA_SIZE * (leadout_index + 1)];

					sector_data.copy_from_slice(&entry[..CD_DATA_SIZE]);
					sector_subcode.copy_from_slice(&entry[CD_DATA_SIZE + CD_C2_SIZE..]);
					let sector_c2 = &entry[CD_DATA_SIZE..CD_DATA_SIZE + CD_C2_SIZE];

					sector_state = [SampleState::SuccessScsiOff; SAMPLES_PER_SECTOR];
					let c2_count = state_from_c2(&mut sector_state, sector_c2);
					if c2_count != 0 {
						if ! refine { errors_c2 += 1; }
						if opts.verbose() {
							log_c2(log, lba, c2_count, &sector_data, sector_c2, refine, refine_counter);
						}
					}

					store = true;
					read = false;
				}
			}
		}

		// Refine only touches sectors that still need the help.
		if refine && read {
			read = false;

			let state = read_state(&mut fs_state, lba_index, cfg.read_offset)?;
			let mut c2_exists = false;
			let mut skip_exists = false;
			for &s in &state {
				if s == SampleState::ErrorC2 { c2_exists = true; }
				else if s == SampleState::ErrorSkip {
					skip_exists = true;
					break;
				}
			}

			if c2_exists || skip_exists { read = true; }
			// Stale cache data would defeat the whole point of a re-read.
			if c2_exists { flush = true; }

			if opts.refine_subchannel() && ! read {
				if let Some(fs_sub) = fs_sub.as_mut() {
					read_entry(fs_sub, &mut sector_subcode, CD_SUBCODE_SIZE, lba_index + subcode_shift, 1, 0, 0)?;
					if ! ChannelQ::from_subcode(&sector_subcode).valid() { read = true; }
				}
			}

			if read {
				// Re-entering the same LBA burns a retry.
				if lba_refine == lba {
					refine_counter += 1;
					if refine_counter < refine_retries { lba_next = lba; }
					// Maximum retries reached.
					else {
						if opts.verbose() {
							log.line(&format!("[LBA: {lba:6}] correction failure"));
						}
						read = false;
						refine_processed += 1;
						refine_counter = 0;
					}
				}
				// Initial visit.
				else {
					lba_refine = lba;
					lba_next = lba;
				}
			}
			// Sector is fixed.
			else if lba_refine == lba {
				if opts.verbose() {
					log.line(&format!("[LBA: {lba:6}] correction success"));
				}
				refine_processed += 1;
				refine_counter = 0;
			}
		}

		if read {
			let mut sector_buffer = vec![0_u8; CD_RAW_DATA_SIZE];

			if flush { drive.flush_cache(lba); }

			let read_time_start = Instant::now();
			let status = read_sector(&mut sector_buffer, drive, cfg, lba);
			let slow = read_time_start.elapsed().as_secs() > SLOW_SECTOR_TIMEOUT;

			// Plextor multisession lead-out overread: a couple of slow
			// sectors precede the SCSI error, and some models bail on the
			// I/O semaphore instead. Ignore them.
			if cfg.drive_type == DriveType::Plextor && slow && inside_range(lba, &error_ranges).is_some() {
			}
			else if ! status.is_good() {
				// Lead-out overread errors aren't media errors.
				if inside_range(lba, &error_ranges).is_none() && lba < lba_end {
					if ! refine { errors_scsi += 1; }

					if opts.verbose() {
						let retries =
							if refine { format!(", retry: {}", refine_counter + 1) }
							else { String::new() };
						log.line(&format!("[LBA: {lba:6}] SCSI error ({status}{retries})"));
					}
				}
			}
			else {
				sector_data.copy_from_slice(&sector_buffer[..CD_DATA_SIZE]);
				sector_subcode.copy_from_slice(&sector_buffer[CD_DATA_SIZE + CD_C2_SIZE..CD_RAW_DATA_SIZE]);
				let sector_c2 = &sector_buffer[CD_DATA_SIZE..CD_DATA_SIZE + CD_C2_SIZE];

				sector_state = [SampleState::Success; SAMPLES_PER_SECTOR];
				let c2_count = state_from_c2(&mut sector_state, sector_c2);
				if c2_count != 0 {
					if ! refine { errors_c2 += 1; }
					if opts.verbose() {
						log_c2(log, lba, c2_count, &sector_data, sector_c2, refine, refine_counter);
					}
				}

				store = true;
			}
		}

		if store {
			// Some drives desync the subcode stream at a random sector;
			// follow the shift wherever a valid position Q says it went.
			if fs_sub.is_some() {
				let q = ChannelQ::from_subcode(&sector_subcode);
				if q.valid() && q.adr() == 1 && q.tno() != 0 {
					let shift = q.a_lba() - lba;
					if shift != subcode_shift {
						subcode_shift = shift;
						log.line(&format!("[LBA: {lba:6}] subcode desync (shift: {subcode_shift:+})"));
					}
				}
			}

			if refine {
				let state_file = read_state(&mut fs_state, lba_index, cfg.read_offset)?;
				let mut data_file = [0_u8; CD_DATA_SIZE];
				read_entry(
					&mut fs_scm, &mut data_file, CD_DATA_SIZE, lba_index, 1,
					cfg.read_offset * CD_SAMPLE_SIZE as i32, 0,
				)?;

				let scsi_exists_file = state_file.iter().any(|&s| s == SampleState::ErrorSkip);
				let c2_exists_file = state_file.iter().any(|&s| s == SampleState::ErrorC2);

				let update = merge_sector(&mut sector_state, &mut sector_data, &state_file, &data_file);

				let scsi_exists = sector_state.iter().any(|&s| s == SampleState::ErrorSkip);
				let c2_exists = sector_state.iter().any(|&s| s == SampleState::ErrorC2);

				if update {
					write_entry(
						&mut fs_scm, &sector_data, CD_DATA_SIZE, lba_index, 1,
						cfg.read_offset * CD_SAMPLE_SIZE as i32,
					)?;
					write_state(&mut fs_state, &sector_state, lba_index, cfg.read_offset)?;

					if inside_range(lba, &error_ranges).is_none() && lba < lba_end {
						if scsi_exists_file && ! scsi_exists {
							errors_scsi = errors_scsi.saturating_sub(1);
							if c2_exists { errors_c2 += 1; }
						}
						else if c2_exists_file && ! c2_exists {
							errors_c2 = errors_c2.saturating_sub(1);
						}
					}
				}

				if let Some(fs_sub) = fs_sub.as_mut() {
					let q = ChannelQ::from_subcode(&sector_subcode);
					if q.valid() {
						let mut sub_file = [0_u8; CD_SUBCODE_SIZE];
						read_entry(fs_sub, &mut sub_file, CD_SUBCODE_SIZE, lba_index + subcode_shift, 1, 0, 0)?;
						if ! ChannelQ::from_subcode(&sub_file).valid() {
							write_entry(fs_sub, &sector_subcode, CD_SUBCODE_SIZE, lba_index + subcode_shift, 1, 0)?;
							if inside_range(lba, &error_ranges).is_none() {
								errors_q = errors_q.saturating_sub(1);
							}
						}
					}
				}
			}
			else {
				write_entry(
					&mut fs_scm, &sector_data, CD_DATA_SIZE, lba_index, 1,
					cfg.read_offset * CD_SAMPLE_SIZE as i32,
				)?;

				if let Some(fs_sub) = fs_sub.as_mut() {
					write_entry(fs_sub, &sector_subcode, CD_SUBCODE_SIZE, lba_index + subcode_shift, 1, 0)?;

					if ChannelQ::from_subcode(&sector_subcode).valid() {
						errors_q_last = errors_q;
					}
					else {
						if errors_q - errors_q_last > Q_ERROR_FLUSH_TRIGGER {
							drive.flush_cache(lba);
							errors_q_last = errors_q;
						}
						errors_q += 1;
					}
				}

				write_state(&mut fs_state, &sector_state, lba_index, cfg.read_offset)?;
			}

			// Keep growing the lead-out overread while the drive keeps
			// answering, unless the end was pinned from the command line.
			if lba + 1 == lba_overread && opts.lba_end().is_none() {
				lba_overread += 1;
			}
		}
		else {
			// Past the last session (disc) lead-out.
			if lba + 1 == lba_overread { lba_overread = lba; }
			// Between sessions.
			else if let Some(r) = inside_range(lba, &error_ranges) { lba_next = r.1; }
		}

		if guard.interrupted() {
			log.line(&format!("[LBA: {lba:6}] forced stop"));
			lba_overread = lba;
		}

		if refine {
			if lba == lba_refine {
				log.refresh(&progress_line(
					percentage(
						(refine_processed * refine_retries + refine_counter) as i32,
						refine_count * refine_retries,
					),
					lba, lba_overread, errors_scsi, errors_c2, errors_q,
				));
			}
		}
		else {
			log.refresh(&progress_line(
				percentage(lba, (lba_overread - 1).max(0) as u32),
				lba, lba_overread, errors_scsi, errors_c2, errors_q,
			));
		}

		lba = lba_next;
	}
	drop(guard);
	log.break_refresh();

	log.line(&format!(
		"{} complete (time: {})",
		if refine { "refine" } else { "dump" },
		dactyl::NiceElapsed::from(time_start),
	));
	log.line("");
	log.line("media errors:");
	log.line(&format!("  SCSI: {errors_scsi}"));
	log.line(&format!("  C2: {errors_c2}"));
	log.line(&format!("  Q: {errors_q}"));
	log.line("");

	// LG/ASUS always gets one refine to improve the odds of capturing
	// enough lead-out sectors.
	Ok(DumpResult {
		needs_refine:
			errors_scsi != 0 ||
			errors_c2 != 0 ||
			(cfg.is_asus() && ! opts.asus_skip_leadout()),
		errors_scsi,
		errors_c2,
		errors_q,
	})
}



/// # Open a Stream File Read/Write.
fn open_stream(path: &Path, truncate: bool) -> Result<File, DumpError> {
	OpenOptions::new()
		.read(true)
		.write(true)
		.create(true)
		.truncate(truncate)
		.open(path)
		.map_err(|_| DumpError::Write(path.to_string_lossy().into_owned()))
}

/// # Atomically Write a Verbatim Blob.
fn write_blob(path: &Path, data: &[u8]) -> Result<(), DumpError> {
	write_atomic::write_file(path, data)
		.map_err(|_| DumpError::Write(path.to_string_lossy().into_owned()))
}

/// # Read One Sector's State.
fn read_state(file: &mut File, lba_index: i32, read_offset: i32)
-> Result<[SampleState; SAMPLES_PER_SECTOR], DumpError> {
	let mut buf = [SampleState::ErrorSkip.as_u8(); SAMPLES_PER_SECTOR];
	read_entry(
		file, &mut buf, SAMPLES_PER_SECTOR, lba_index, 1,
		read_offset, SampleState::ErrorSkip.as_u8(),
	)?;

	let mut out = [SampleState::ErrorSkip; SAMPLES_PER_SECTOR];
	for (o, b) in out.iter_mut().zip(buf) { *o = SampleState::from(b); }
	Ok(out)
}

/// # Write One Sector's State.
fn write_state(file: &mut File, state: &[SampleState; SAMPLES_PER_SECTOR], lba_index: i32, read_offset: i32)
-> Result<(), DumpError> {
	let mut buf = [0_u8; SAMPLES_PER_SECTOR];
	for (b, s) in buf.iter_mut().zip(state) { *b = s.as_u8(); }
	write_entry(file, &buf, SAMPLES_PER_SECTOR, lba_index, 1, read_offset)
}

/// # The Refresh Line.
fn progress_line(pct: u32, lba: i32, lba_overread: i32, errors_scsi: u32, errors_c2: u32, errors_q: u32)
-> String {
	format!("[{pct:3}%] LBA: {lba:6}/{lba_overread}, errors: {{ SCSI: {errors_scsi}, C2: {errors_c2}, Q: {errors_q} }}")
}

/// # Report a C2 Hit.
fn log_c2(
	log: &mut DumpLog,
	lba: i32,
	c2_count: u32,
	sector_data: &[u8],
	sector_c2: &[u8],
	refine: bool,
	refine_counter: u32,
) {
	let data_crc = crc32fast::hash(sector_data);
	let c2_crc = crc32fast::hash(sector_c2);
	let retries =
		if refine { format!(", retry: {}", refine_counter + 1) }
		else { String::new() };
	log.line(&format!(
		"[LBA: {lba:6}] C2 error (bits: {c2_count:4}, data crc: {data_crc:08X}, C2 crc: {c2_crc:08X}{retries})"
	));
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		subcode::position_subcode,
		toc::test::{
			full_toc,
			short_toc,
		},
		ReadCdErrorField,
		ReadCdExpectedSectorType,
		ReadCdSubChannel,
		ReadCddaSubCode,
		ScsiStatus,
	};
	use std::collections::HashMap;

	/// # Deterministic Sector Payload.
	fn sim_data(lba: i32) -> [u8; CD_DATA_SIZE] {
		let mut out = [0_u8; CD_DATA_SIZE];
		let mut seed = (lba as u32) ^ 0x9E37_79B9;
		for b in &mut out {
			seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
			*b = (seed >> 24) as u8;
		}
		out
	}

	/// # Simulated Drive.
	///
	/// Serves a synthetic disc: deterministic audio payloads, valid position
	/// Q, clean C2 except where injected, SCSI errors outside the readable
	/// window or inside `unreadable` ranges.
	struct SimDrive {
		toc: Vec<u8>,
		full_toc: Vec<u8>,
		lba_min: i32,
		lba_max: i32,
		unreadable: Vec<(i32, i32)>,
		c2: HashMap<i32, Vec<usize>>,
		leadin_end: Option<i32>,
		cache: Vec<u8>,
	}

	impl SimDrive {
		fn new(toc: Vec<u8>, lba_min: i32, lba_max: i32) -> Self {
			Self {
				toc,
				full_toc: Vec::new(),
				lba_min,
				lba_max,
				unreadable: Vec::new(),
				c2: HashMap::new(),
				leadin_end: None,
				cache: Vec::new(),
			}
		}

		fn readable(&self, lba: i32) -> bool {
			self.lba_min <= lba && lba < self.lba_max &&
			! self.unreadable.iter().any(|&(a, b)| a <= lba && lba < b)
		}

		fn fill(&self, buf: &mut [u8], lba: i32, count: u32) -> ScsiStatus {
			// Real drives fail the whole command.
			for i in 0..count as i32 {
				if ! self.readable(lba + i) {
					return ScsiStatus::check_condition(0x03, 0x11, 0x00);
				}
			}

			for i in 0..count as i32 {
				let sector = lba + i;
				let base = CD_RAW_DATA_SIZE * i as usize;

				buf[base..base + CD_DATA_SIZE].copy_from_slice(&sim_data(sector));

				let c2 = &mut buf[base + CD_DATA_SIZE..base + CD_DATA_SIZE + CD_C2_SIZE];
				c2.fill(0);
				if let Some(samples) = self.c2.get(&sector) {
					for &s in samples {
						// One bit inside the sample's nibble.
						if s % 2 == 0 { c2[s >> 1] |= 0x80; }
						else { c2[s >> 1] |= 0x08; }
					}
				}

				buf[base + CD_DATA_SIZE + CD_C2_SIZE..base + CD_RAW_DATA_SIZE]
					.copy_from_slice(&position_subcode(1, 1, sector));
			}

			ScsiStatus::GOOD
		}
	}

	impl DriveHandle for SimDrive {
		fn test_unit_ready(&mut self) -> ScsiStatus { ScsiStatus::GOOD }

		fn inquiry(&mut self) -> Result<(String, String), DumpError> {
			Ok(("SIM".to_owned(), "DRIVE 9000".to_owned()))
		}

		fn set_cd_speed(&mut self, _speed: u16) -> ScsiStatus { ScsiStatus::GOOD }

		fn read_toc(&mut self) -> Result<Vec<u8>, DumpError> { Ok(self.toc.clone()) }

		fn read_full_toc(&mut self) -> Result<Vec<u8>, DumpError> { Ok(self.full_toc.clone()) }

		fn read_cd_text(&mut self, out: &mut Vec<u8>) -> ScsiStatus {
			out.clear();
			ScsiStatus::GOOD
		}

		fn read_cd(
			&mut self,
			buf: &mut [u8],
			lba: i32,
			count: u32,
			_sector_type: ReadCdExpectedSectorType,
			_error_field: ReadCdErrorField,
			_sub_channel: ReadCdSubChannel,
		) -> ScsiStatus {
			self.fill(buf, lba, count)
		}

		fn read_cdda(
			&mut self,
			buf: &mut [u8],
			lba: i32,
			count: u32,
			_sub_code: ReadCddaSubCode,
		) -> ScsiStatus {
			self.fill(buf, lba, count)
		}

		fn flush_cache(&mut self, _lba: i32) -> ScsiStatus { ScsiStatus::GOOD }

		fn plextor_read_leadin(&mut self, sectors: u32) -> Result<Vec<u8>, DumpError> {
			let Some(end) = self.leadin_end else { return Ok(Vec::new()); };

			let mut out = Vec::new();
			for lba in end - sectors as i32..end {
				out.extend_from_slice(&ScsiStatus::GOOD.as_bytes());
				out.extend_from_slice(&sim_data(lba));
				out.extend_from_slice(&[0_u8; CD_C2_SIZE]);
				out.extend_from_slice(&position_subcode(1, 0, lba));
			}
			Ok(out)
		}

		fn asus_cache_read(&mut self) -> Result<Vec<u8>, DumpError> {
			Ok(self.cache.clone())
		}
	}

	/// # Read Back One Sector's State.
	fn stored_state(opts: &DumpOptions, cfg: &DriveConfig, lba: i32)
	-> [SampleState; SAMPLES_PER_SECTOR] {
		let mut fs = File::open(opts.stream_path("state")).expect("Missing state stream.");
		read_state(&mut fs, lba - LBA_START, cfg.read_offset).expect("State read failed.")
	}

	/// # Read Back One Sector's Data.
	fn stored_data(opts: &DumpOptions, cfg: &DriveConfig, lba: i32) -> [u8; CD_DATA_SIZE] {
		let mut fs = File::open(opts.stream_path("scram")).expect("Missing data stream.");
		let mut out = [0_u8; CD_DATA_SIZE];
		read_entry(
			&mut fs, &mut out, CD_DATA_SIZE, lba - LBA_START, 1,
			cfg.read_offset * CD_SAMPLE_SIZE as i32, 0,
		).expect("Data read failed.");
		out
	}

	#[test]
	fn t_dump_refine_cycle() {
		let _lock = crate::abort::test_guard();

		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let opts = DumpOptions::default()
			.with_image_path(dir.path())
			.with_image_name("test");
		let cfg = DriveConfig::default();
		let mut log = DumpLog::sink();

		let toc = short_toc(&[(1, 0x00, 0)], 60);
		let mut drive = SimDrive::new(toc, -150, 60);

		// A clean dump needs no refine.
		let res = run(&mut drive, &cfg, &opts, &mut log, false).expect("Dump failed.");
		assert!(! res.needs_refine, "A clean dump should not want a refine.");
		assert_eq!((res.errors_scsi, res.errors_c2, res.errors_q), (0, 0, 0));

		assert!(stored_state(&opts, &cfg, 30).iter().all(|&s| s == SampleState::Success));
		assert_eq!(stored_data(&opts, &cfg, 30), sim_data(30), "Payload mismatch.");
		let mut fs = File::open(opts.stream_path("subcode")).unwrap();
		let mut sub = [0_u8; CD_SUBCODE_SIZE];
		read_entry(&mut fs, &mut sub, CD_SUBCODE_SIZE, 30 - LBA_START, 1, 0, 0).unwrap();
		assert!(ChannelQ::from_subcode(&sub).valid(), "Stored Q should validate.");

		// A second dump without --overwrite is a conflict.
		assert!(matches!(
			run(&mut drive, &cfg, &opts, &mut log, false),
			Err(DumpError::DumpExists(_)),
		));

		// Take two: one C2 bit at LBA 30, sample 10.
		drive.c2.insert(30, vec![10]);
		let opts = opts.with_overwrite(true);
		let res = run(&mut drive, &cfg, &opts, &mut log, false).expect("Dump failed.");
		assert!(res.needs_refine, "C2 damage should trigger a refine.");
		assert_eq!(res.errors_c2, 1);

		let state = stored_state(&opts, &cfg, 30);
		assert_eq!(state[10], SampleState::ErrorC2);
		assert_eq!(state[9], SampleState::Success);

		// Refine against a clean re-read promotes the sample.
		drive.c2.clear();
		let res = run(&mut drive, &cfg, &opts, &mut log, true).expect("Refine failed.");
		assert!(! res.needs_refine, "A successful refine should settle things.");
		assert_eq!(res.errors_c2, 0);

		let state = stored_state(&opts, &cfg, 30);
		assert!(state.iter().all(|&s| s == SampleState::Success));
		assert_eq!(stored_data(&opts, &cfg, 30), sim_data(30));

		// And a second refine is a no-op.
		let res = run(&mut drive, &cfg, &opts, &mut log, true).expect("Refine failed.");
		assert_eq!((res.errors_scsi, res.errors_c2, res.errors_q), (0, 0, 0));
		assert!(! res.needs_refine);
	}

	#[test]
	fn t_error_range_isolation() {
		let _lock = crate::abort::test_guard();

		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let opts = DumpOptions::default()
			.with_image_path(dir.path())
			.with_image_name("test");
		let cfg = DriveConfig::default();
		let mut log = DumpLog::sink();

		// Two sessions; the inter-session gap reads as SCSI errors.
		let mut drive = SimDrive::new(
			short_toc(&[(1, 0x00, 0), (2, 0x00, 3200)], 6000),
			-150,
			6000,
		);
		drive.full_toc = full_toc(&[
			(&[(1, 0x00, 0)], 3000),
			(&[(2, 0x00, 3200)], 6000),
		]);
		drive.unreadable.push((3000, 3050));

		let res = run(&mut drive, &cfg, &opts, &mut log, false).expect("Dump failed.");
		assert_eq!(res.errors_scsi, 0, "Gap errors must not count.");
		assert_eq!(res.errors_c2, 0);
		assert!(! res.needs_refine);

		// Nothing was stored inside the gap; both sessions are present.
		assert!(stored_state(&opts, &cfg, 3010).iter().all(|&s| s == SampleState::ErrorSkip));
		assert!(stored_state(&opts, &cfg, 2999).iter().all(|&s| s == SampleState::Success));
		assert!(stored_state(&opts, &cfg, 3200).iter().all(|&s| s == SampleState::Success));
	}

	#[test]
	fn t_skip_ranges() {
		let _lock = crate::abort::test_guard();

		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let opts = DumpOptions::default()
			.with_image_path(dir.path())
			.with_image_name("test")
			.with_lba_start(0)
			.with_skip(vec![(10, 20)]);
		let cfg = DriveConfig::default();
		let mut log = DumpLog::sink();

		let mut drive = SimDrive::new(short_toc(&[(1, 0x00, 0)], 60), -150, 60);
		let res = run(&mut drive, &cfg, &opts, &mut log, false).expect("Dump failed.");
		assert_eq!(res.errors_scsi, 0);

		assert!(stored_state(&opts, &cfg, 15).iter().all(|&s| s == SampleState::ErrorSkip));
		assert!(stored_state(&opts, &cfg, 9).iter().all(|&s| s == SampleState::Success));
		assert!(stored_state(&opts, &cfg, 20).iter().all(|&s| s == SampleState::Success));
	}

	#[test]
	fn t_plextor_leadin() {
		let _lock = crate::abort::test_guard();

		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let opts = DumpOptions::default()
			.with_image_path(dir.path())
			.with_image_name("test");
		let cfg = DriveConfig::detect("PLEXTOR", "CD-R PX-760A");
		let mut log = DumpLog::sink();

		// The vendor lead-in read reaches the deep pregap the D8 loop
		// cannot (its floor is the -75 pregap start).
		let mut drive = SimDrive::new(short_toc(&[(1, 0x00, 0)], 60), -75, 70);
		drive.leadin_end = Some(-75);

		let res = run(&mut drive, &cfg, &opts, &mut log, false).expect("Dump failed.");
		assert_eq!((res.errors_scsi, res.errors_c2), (0, 0));
		assert!(! res.needs_refine);

		// Deep pregap samples carry the uncertain-provenance state.
		assert!(stored_state(&opts, &cfg, -100).iter().all(|&s| s == SampleState::SuccessC2Off));
		assert!(stored_state(&opts, &cfg, -150).iter().all(|&s| s == SampleState::SuccessC2Off));
		assert_eq!(stored_data(&opts, &cfg, -100), sim_data(-100));

		// The normal loop takes over at the pregap start.
		assert!(stored_state(&opts, &cfg, -75).iter().all(|&s| s == SampleState::Success));
		assert!(stored_state(&opts, &cfg, 0).iter().all(|&s| s == SampleState::Success));
	}

	#[test]
	fn t_asus_leadout() {
		let _lock = crate::abort::test_guard();

		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let opts = DumpOptions::default()
			.with_image_path(dir.path())
			.with_image_name("test");
		let cfg = DriveConfig::detect("ASUS", "BW-16D1HT");
		let mut log = DumpLog::sink();

		// The drive refuses everything past the TOC end, but its cache
		// still holds sectors 55..70 from earlier reads.
		let mut drive = SimDrive::new(short_toc(&[(1, 0x00, 0)], 60), -135, 60);
		drive.cache = asus::test::fake_cache(55..70);

		let res = run(&mut drive, &cfg, &opts, &mut log, false).expect("Dump failed.");
		assert_eq!(res.errors_scsi, 0);
		assert!(res.needs_refine, "LG/ASUS dumps always get a refine pass.");

		// Lead-out sectors were synthesized from the cache.
		let state = stored_state(&opts, &cfg, 65);
		assert!(state.iter().all(|&s| s == SampleState::SuccessScsiOff));
		let data = stored_data(&opts, &cfg, 65);
		assert_eq!(&data[..4], &65_i32.to_le_bytes(), "Cache payload mismatch.");

		// The raw cache blob was persisted alongside.
		assert!(opts.stream_path("asus").is_file(), "Cache dump should persist.");
	}

	#[test]
	fn t_subchannel_walk() {
		let _lock = crate::abort::test_guard();

		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let opts = DumpOptions::default()
			.with_image_path(dir.path())
			.with_image_name("test");
		let cfg = DriveConfig::default();
		let mut log = DumpLog::sink();

		let mut drive = SimDrive::new(short_toc(&[(1, 0x00, 0)], 10), -150, 10);
		run(&mut drive, &cfg, &opts, &mut log, false).expect("Dump failed.");

		// The walk itself is mostly printing; just prove it parses cleanly.
		subchannel(&opts, &mut log).expect("Subchannel walk failed.");
	}
}
