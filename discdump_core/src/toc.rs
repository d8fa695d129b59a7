/*!
# Disc Dump: Table of Contents
*/

use crate::{
	msf_to_lba,
	DumpError,
	MSF,
};
use std::fmt;



/// # Format 0 Descriptor Size.
const TOC_DESCRIPTOR_SIZE: usize = 8;

/// # Format 2 (FULL-TOC) Descriptor Size.
const FULL_TOC_DESCRIPTOR_SIZE: usize = 11;

/// # Lead-Out Pseudo-Track.
const LEADOUT_TRACK: u8 = 0xAA;

/// # Control: Data Track Bit.
const CONTROL_DATA: u8 = 0x04;



#[derive(Debug, Clone, Eq, PartialEq)]
/// # One Track.
pub struct Track {
	/// # Track Number.
	pub number: u8,

	/// # Control Nibble.
	pub control: u8,

	/// # Index Starts (Index 01 First).
	pub indices: Vec<i32>,

	/// # First Sector.
	pub lba_start: i32,

	/// # One Past the Last Sector.
	pub lba_end: i32,
}

impl Track {
	#[must_use]
	/// # Data Track?
	pub const fn is_data(&self) -> bool { self.control & CONTROL_DATA != 0 }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # One Session.
pub struct Session {
	/// # Tracks, Contiguous in LBA.
	pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Table of Contents.
pub struct Toc {
	/// # Disc Type (From FULL-TOC Point A0).
	pub disc_type: Option<u8>,

	/// # Sessions.
	pub sessions: Vec<Session>,
}

impl fmt::Display for Toc {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some(t) = self.disc_type {
			writeln!(f, "disc type: {t:02X}")?;
		}
		for (i, session) in self.sessions.iter().enumerate() {
			writeln!(f, "session {}", i + 1)?;
			for t in &session.tracks {
				writeln!(
					f,
					"  track {:02} {{ {} }} LBA: {:6}..{:6}",
					t.number,
					if t.is_data() { "data" } else { "audio" },
					t.lba_start,
					t.lba_end,
				)?;
			}
		}
		Ok(())
	}
}

impl Toc {
	/// # Parse a READ TOC (Format 0) Response.
	///
	/// The short TOC is flat, so everything lands in a single session. Track
	/// ends are chained from the next track's start, terminated by the
	/// lead-out descriptor.
	///
	/// ## Errors
	///
	/// Returns an error if the response is too short to mean anything.
	pub fn parse(buffer: &[u8]) -> Result<Self, DumpError> {
		if buffer.len() < 4 {
			return Err(DumpError::Read("TOC response too short".to_owned()));
		}

		let mut tracks: Vec<Track> = Vec::new();
		let mut leadout = None;

		let mut offset = 4;
		while offset + TOC_DESCRIPTOR_SIZE <= buffer.len() {
			let d = &buffer[offset..offset + TOC_DESCRIPTOR_SIZE];
			offset += TOC_DESCRIPTOR_SIZE;

			let number = d[2];
			let control = d[1] & 0x0F;
			let lba = i32::from_be_bytes([d[4], d[5], d[6], d[7]]);

			if number == LEADOUT_TRACK { leadout = Some(lba); }
			else {
				tracks.push(Track {
					number,
					control,
					indices: vec![lba],
					lba_start: lba,
					lba_end: lba,
				});
			}
		}

		chain_track_ends(&mut tracks, leadout);

		Ok(Self {
			disc_type: None,
			sessions: vec![Session { tracks }],
		})
	}

	/// # Parse a READ TOC (Format 2, FULL-TOC) Response.
	///
	/// FULL-TOC enumerates per-session A0/A1/A2 points plus one descriptor
	/// per track, all addressed in plain-binary MSF.
	///
	/// ## Errors
	///
	/// Returns an error if the response is too short to mean anything.
	pub fn parse_full(buffer: &[u8]) -> Result<Self, DumpError> {
		if buffer.len() < 4 {
			return Err(DumpError::Read("FULL-TOC response too short".to_owned()));
		}

		// (session, leadout, tracks).
		let mut sessions: Vec<(u8, Option<i32>, Vec<Track>)> = Vec::new();
		let mut disc_type = None;

		let mut offset = 4;
		while offset + FULL_TOC_DESCRIPTOR_SIZE <= buffer.len() {
			let d = &buffer[offset..offset + FULL_TOC_DESCRIPTOR_SIZE];
			offset += FULL_TOC_DESCRIPTOR_SIZE;

			let session_number = d[0];
			let control = d[1] & 0x0F;
			let point = d[3];
			let plba = msf_to_lba(MSF::new(d[8], d[9], d[10]));

			let session = session_entry(&mut sessions, session_number);
			match point {
				// Per-track start.
				1..=99 => session.2.push(Track {
					number: point,
					control,
					indices: vec![plba],
					lba_start: plba,
					lba_end: plba,
				}),
				// First track number; disc type hides in PSEC.
				0xA0 => { disc_type.get_or_insert(d[9]); },
				// Last track number.
				0xA1 => {},
				// Session lead-out.
				0xA2 => { session.1 = Some(plba); },
				_ => {},
			}
		}

		sessions.sort_unstable_by_key(|s| s.0);

		let sessions = sessions.into_iter()
			.map(|(_, leadout, mut tracks)| {
				tracks.sort_unstable_by_key(|t| t.number);
				chain_track_ends(&mut tracks, leadout);
				Session { tracks }
			})
			.collect();

		Ok(Self { disc_type, sessions })
	}
}

impl Toc {
	/// # Reconcile Indices Against the Short TOC.
	///
	/// Some units (the PX-W5224A among them) report broken per-track
	/// positions in FULL-TOC. The short TOC's positions win whenever both
	/// forms name the same track.
	pub fn derive_indices(&mut self, short: &Toc) {
		for session in &mut self.sessions {
			for track in &mut session.tracks {
				let found = short.sessions.iter()
					.flat_map(|s| s.tracks.iter())
					.find(|t| t.number == track.number);
				if let Some(found) = found {
					track.indices.clone_from(&found.indices);
				}
			}
		}
	}

	#[must_use]
	/// # Fake TOC?
	///
	/// Certain pressings carry a deliberately bogus TOC whose lead-out sits
	/// at or before the last track start. Dumping falls back to a 74-minute
	/// disc length when this trips.
	pub fn is_fake(&self) -> bool {
		self.last_track().map_or(true, |t| t.lba_end <= t.lba_start)
	}

	#[must_use]
	/// # Last Track of the Last Session.
	pub fn last_track(&self) -> Option<&Track> {
		self.sessions.last().and_then(|s| s.tracks.last())
	}

	#[must_use]
	/// # Any Data Tracks?
	pub fn has_data_tracks(&self) -> bool {
		self.sessions.iter().flat_map(|s| s.tracks.iter()).any(Track::is_data)
	}

	#[must_use]
	/// # Any Audio Tracks?
	pub fn has_audio_tracks(&self) -> bool {
		self.sessions.iter().flat_map(|s| s.tracks.iter()).any(|t| ! t.is_data())
	}
}



/// # Chain Track Ends.
///
/// Each track runs to the start of the next; the last runs to the lead-out.
/// Without a lead-out the final track stays degenerate, which downstream
/// reads as a fake TOC.
fn chain_track_ends(tracks: &mut [Track], leadout: Option<i32>) {
	for i in 1..tracks.len() {
		tracks[i - 1].lba_end = tracks[i].lba_start;
	}
	if let Some(leadout) = leadout {
		if let Some(last) = tracks.last_mut() { last.lba_end = leadout; }
	}
}

/// # Find or Add a Session Accumulator.
fn session_entry(
	sessions: &mut Vec<(u8, Option<i32>, Vec<Track>)>,
	number: u8,
) -> &mut (u8, Option<i32>, Vec<Track>) {
	let pos = sessions.iter().position(|s| s.0 == number)
		.unwrap_or_else(|| {
			sessions.push((number, None, Vec::new()));
			sessions.len() - 1
		});
	&mut sessions[pos]
}



#[cfg(test)]
pub(crate) mod test {
	use super::*;
	use crate::lba_to_msf;

	/// # Build a Format 0 Response.
	pub(crate) fn short_toc(tracks: &[(u8, u8, i32)], leadout: i32) -> Vec<u8> {
		let mut out = vec![0_u8; 4];
		out[2] = tracks.first().map_or(1, |t| t.0);
		out[3] = tracks.last().map_or(1, |t| t.0);

		for &(number, control, lba) in tracks {
			out.extend_from_slice(&[0, control, number, 0]);
			out.extend_from_slice(&lba.to_be_bytes());
		}
		out.extend_from_slice(&[0, 0, LEADOUT_TRACK, 0]);
		out.extend_from_slice(&leadout.to_be_bytes());

		let len = (out.len() - 2) as u16;
		out[..2].copy_from_slice(&len.to_be_bytes());
		out
	}

	/// # Build a Format 2 Response.
	///
	/// Sessions are (tracks, leadout) pairs; session numbers start at one.
	pub(crate) fn full_toc(sessions: &[(&[(u8, u8, i32)], i32)]) -> Vec<u8> {
		let mut out = vec![0_u8; 4];
		out[2] = 1;
		out[3] = sessions.len() as u8;

		for (i, (tracks, leadout)) in sessions.iter().enumerate() {
			let session = (i + 1) as u8;
			let first = tracks.first().map_or(1, |t| t.0);
			let last = tracks.last().map_or(1, |t| t.0);

			// A0 (first track + disc type), A1 (last track), A2 (lead-out).
			out.extend_from_slice(&[session, 0x10, 0, 0xA0, 0, 0, 0, 0, first, 0x00, 0]);
			out.extend_from_slice(&[session, 0x10, 0, 0xA1, 0, 0, 0, 0, last, 0, 0]);
			let msf = lba_to_msf(*leadout);
			out.extend_from_slice(&[session, 0x10, 0, 0xA2, 0, 0, 0, 0, msf.m, msf.s, msf.f]);

			for &(number, control, lba) in *tracks {
				let msf = lba_to_msf(lba);
				out.extend_from_slice(&[session, control, 0, number, 0, 0, 0, 0, msf.m, msf.s, msf.f]);
			}
		}

		let len = (out.len() - 2) as u16;
		out[..2].copy_from_slice(&len.to_be_bytes());
		out
	}

	#[test]
	fn t_short_parse() {
		let buf = short_toc(&[(1, 0x00, 0), (2, 0x00, 15_000)], 30_000);
		let toc = Toc::parse(&buf).expect("Short TOC should parse.");

		assert_eq!(toc.sessions.len(), 1);
		let tracks = &toc.sessions[0].tracks;
		assert_eq!(tracks.len(), 2);
		assert_eq!(tracks[0].lba_start, 0);
		assert_eq!(tracks[0].lba_end, 15_000, "Track end should chain to the next start.");
		assert_eq!(tracks[1].lba_end, 30_000, "Last track should end at the lead-out.");
		assert!(! tracks[0].is_data());
		assert!(! toc.is_fake());
	}

	#[test]
	fn t_full_parse() {
		let buf = full_toc(&[
			(&[(1, 0x04, 0)], 30_000),
			(&[(2, 0x00, 32_000)], 60_000),
		]);
		let toc = Toc::parse_full(&buf).expect("FULL-TOC should parse.");

		assert_eq!(toc.sessions.len(), 2);
		assert_eq!(toc.disc_type, Some(0x00));
		assert!(toc.sessions[0].tracks[0].is_data());
		assert_eq!(toc.sessions[0].tracks[0].lba_end, 30_000);
		assert_eq!(toc.sessions[1].tracks[0].lba_start, 32_000);
		assert_eq!(toc.last_track().unwrap().lba_end, 60_000);
		assert!(toc.has_data_tracks());
		assert!(toc.has_audio_tracks());
	}

	#[test]
	fn t_derive_indices() {
		let short = Toc::parse(&short_toc(&[(1, 0, 100)], 5000)).unwrap();
		let mut full = Toc::parse_full(&full_toc(&[(&[(1, 0, 150)], 5000)])).unwrap();

		full.derive_indices(&short);
		assert_eq!(
			full.sessions[0].tracks[0].indices,
			vec![100],
			"Short TOC positions should win.",
		);
	}

	#[test]
	fn t_fake() {
		// Lead-out before the last track start.
		let buf = short_toc(&[(1, 0, 1000)], -200);
		let toc = Toc::parse(&buf).unwrap();
		assert!(toc.is_fake(), "Backwards lead-out should read as fake.");
	}
}
