/*!
# Disc Dump: Plextor Lead-In Capture
*/

use crate::{
	read_entry,
	write_entry,
	ChannelQ,
	DriveConfig,
	DriveHandle,
	DumpError,
	DumpLog,
	DumpOptions,
	SampleState,
	ScsiStatus,
	StreamFile,
	CD_DATA_SIZE,
	CD_SAMPLE_SIZE,
	CD_SUBCODE_SIZE,
	LBA_START,
	MSF_LBA_SHIFT,
	PLEXTOR_LEADIN_ENTRY_SIZE,
	SAMPLES_PER_SECTOR,
};



/// # Status Prefix Size.
const STATUS_SIZE: usize = 4;



/// # Capture and Commit Session Lead-Ins.
///
/// Multi-session discs have one lead-in per session, and the drive alone
/// decides which one a vendor read returns. So: ask repeatedly, identify
/// each result by the absolute address in its last valid Q, keep the longest
/// capture per session, then merge whatever was caught into the streams.
///
/// Committed samples are marked `SuccessC2Off`; the vendor path provides no
/// C2 and the deep pregap data itself is of uncertain provenance, so a
/// normal read is still allowed to improve on it later.
///
/// ## Errors
///
/// Returns an error if the vendor command or stream I/O fails outright.
pub(super) fn store_sessions_leadin<F: StreamFile + ?Sized>(
	fs_scm: &mut F,
	fs_sub: &mut F,
	fs_state: &mut F,
	drive: &mut dyn DriveHandle,
	cfg: &DriveConfig,
	session_lba_start: &[i32],
	opts: &DumpOptions,
	log: &mut DumpLog,
) -> Result<(), DumpError> {
	let pregap_count = cfg.pregap_start - MSF_LBA_SHIFT;
	if pregap_count <= 0 { return Ok(()); }

	let mut leadin_buffers: Vec<Vec<u8>> = vec![Vec::new(); session_lba_start.len()];

	for i in 0..session_lba_start.len() {
		log.line("PLEXTOR: reading lead-in");

		// Helps with "choosing" the first session.
		if i + 1 == session_lba_start.len() {
			drive.flush_cache(i32::MAX);
		}

		#[allow(clippy::cast_sign_loss)]
		let mut leadin_buffer = drive.plextor_read_leadin(pregap_count as u32)?;
		let entries_count = leadin_buffer.len().wrapping_div(PLEXTOR_LEADIN_ENTRY_SIZE);

		if entries_count < pregap_count as usize { continue; }

		// Identify the session by walking back to the last valid Q.
		for j in (0..entries_count).rev() {
			let entry = &leadin_buffer[j * PLEXTOR_LEADIN_ENTRY_SIZE..(j + 1) * PLEXTOR_LEADIN_ENTRY_SIZE];
			if ! entry_status(entry).is_good() { continue; }

			let q = ChannelQ::from_subcode(entry_subcode(entry));
			if ! (q.valid() && q.adr() == 1 && q.tno() != 0) { continue; }

			let lba = q.a_lba();
			let mut session_found = false;
			for (s, &session_start) in session_lba_start.iter().enumerate() {
				let pregap_end = session_start + pregap_count;
				if session_start <= lba && lba < pregap_end {
					// Align the buffer to the end of this session's pregap.
					let trim_count = j + (pregap_end - lba) as usize;
					if trim_count > entries_count {
						log.line(&format!("PLEXTOR: incomplete pre-gap, skipping (session index: {s})"));
					}
					else {
						log.line(&format!("PLEXTOR: lead-in found (session index: {s}, sectors: {trim_count})"));
						if trim_count < entries_count {
							leadin_buffer.truncate(trim_count * PLEXTOR_LEADIN_ENTRY_SIZE);
						}
						if leadin_buffers[s].len() < leadin_buffer.len() {
							std::mem::swap(&mut leadin_buffers[s], &mut leadin_buffer);
						}
					}

					session_found = true;
					break;
				}
			}

			if session_found { break; }
		}
	}

	// Some units (PX-760A) lead with garbage; strip entries ahead of the
	// first valid Q.
	for (s, leadin_buffer) in leadin_buffers.iter_mut().enumerate() {
		let n = leadin_buffer.len().wrapping_div(PLEXTOR_LEADIN_ENTRY_SIZE);
		for i in 0..n {
			let entry = &leadin_buffer[i * PLEXTOR_LEADIN_ENTRY_SIZE..(i + 1) * PLEXTOR_LEADIN_ENTRY_SIZE];
			if ChannelQ::from_subcode(entry_subcode(entry)).valid() {
				if i != 0 {
					leadin_buffer.drain(..i * PLEXTOR_LEADIN_ENTRY_SIZE);
					log.line(&format!("PLEXTOR: lead-in trimmed (session index: {s}, sectors: {i})"));
				}
				break;
			}
		}
	}

	// Commit.
	for (s, leadin_buffer) in leadin_buffers.iter().enumerate() {
		let n = leadin_buffer.len().wrapping_div(PLEXTOR_LEADIN_ENTRY_SIZE);
		for i in 0..n {
			#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
			let lba = session_lba_start[s] + pregap_count - (n - i) as i32;
			let lba_index = lba - LBA_START;

			let entry = &leadin_buffer[i * PLEXTOR_LEADIN_ENTRY_SIZE..(i + 1) * PLEXTOR_LEADIN_ENTRY_SIZE];
			let status = entry_status(entry);

			if ! status.is_good() {
				if opts.verbose() {
					log.line(&format!("[LBA: {lba:6}] SCSI error ({status})"));
				}
				continue;
			}

			// Data and state, but only where nothing as good has landed yet.
			let mut state_buf = [SampleState::ErrorSkip.as_u8(); SAMPLES_PER_SECTOR];
			read_entry(
				fs_state, &mut state_buf, SAMPLES_PER_SECTOR, lba_index, 1,
				cfg.read_offset, SampleState::ErrorSkip.as_u8(),
			)?;
			if state_buf.iter().any(|&b| SampleState::from(b) < SampleState::SuccessC2Off) {
				let sector_data = &entry[STATUS_SIZE..STATUS_SIZE + CD_DATA_SIZE];
				let filled = [SampleState::SuccessC2Off.as_u8(); SAMPLES_PER_SECTOR];

				#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
				write_entry(
					fs_scm, sector_data, CD_DATA_SIZE, lba_index, 1,
					cfg.read_offset * CD_SAMPLE_SIZE as i32,
				)?;
				write_entry(fs_state, &filled, SAMPLES_PER_SECTOR, lba_index, 1, cfg.read_offset)?;
			}

			// Subcode, but only where the stored Q is broken.
			let mut sub_file = [0_u8; CD_SUBCODE_SIZE];
			read_entry(fs_sub, &mut sub_file, CD_SUBCODE_SIZE, lba_index, 1, 0, 0)?;
			if ! ChannelQ::from_subcode(&sub_file).valid() {
				write_entry(fs_sub, entry_subcode(entry), CD_SUBCODE_SIZE, lba_index, 1, 0)?;
			}
		}
	}

	Ok(())
}



/// # Entry Status.
fn entry_status(entry: &[u8]) -> ScsiStatus {
	ScsiStatus::from_bytes([entry[0], entry[1], entry[2], entry[3]])
}

/// # Entry Subcode Plane.
fn entry_subcode(entry: &[u8]) -> &[u8] {
	&entry[PLEXTOR_LEADIN_ENTRY_SIZE - CD_SUBCODE_SIZE..PLEXTOR_LEADIN_ENTRY_SIZE]
}
