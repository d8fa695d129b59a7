/*!
# Disc Dump: Subchannel
*/

use crate::{
	bcdmsf_to_lba,
	crc16_gsm,
	CD_SUBCODE_SIZE,
	MSF,
};
use std::fmt;



/// # Q Plane Size.
const Q_SIZE: usize = 12;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Subchannel Plane.
///
/// The 96 subcode bytes interleave eight 12-byte planes, one bit per byte,
/// P in the high bit down to W in the low.
pub enum Subchannel {
	/// # P (Pause Flag).
	P = 0,

	/// # Q (Position/Control).
	Q = 1,

	/// # R.
	R = 2,

	/// # S.
	S = 3,

	/// # T.
	T = 4,

	/// # U.
	U = 5,

	/// # V.
	V = 6,

	/// # W.
	W = 7,
}

#[must_use]
/// # Deinterleave One Plane.
pub fn subcode_extract_channel(sub: &[u8], channel: Subchannel) -> [u8; Q_SIZE] {
	let shift = 7 - channel as u8;
	let mut out = [0_u8; Q_SIZE];

	for (i, &byte) in sub.iter().take(CD_SUBCODE_SIZE).enumerate() {
		let bit = (byte >> shift) & 1;
		out[i >> 3] |= bit << (7 - (i & 7));
	}

	out
}

#[cfg(test)]
/// # Interleave One Plane.
///
/// The write-side mirror of [`subcode_extract_channel`], used to synthesize
/// subcode buffers for tests.
pub(crate) fn subcode_insert_channel(sub: &mut [u8], data: &[u8; Q_SIZE], channel: Subchannel) {
	let shift = 7 - channel as u8;

	for (i, byte) in sub.iter_mut().take(CD_SUBCODE_SIZE).enumerate() {
		let bit = (data[i >> 3] >> (7 - (i & 7))) & 1;
		*byte = (*byte & ! (1 << shift)) | (bit << shift);
	}
}



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Channel Q.
///
/// A thin view over the twelve deinterleaved Q bytes. Position information
/// (mode 1, ADR 1) keeps its on-disc BCD encoding; use [`ChannelQ::a_lba`]
/// for a decoded address.
pub struct ChannelQ {
	raw: [u8; Q_SIZE],
}

impl From<[u8; Q_SIZE]> for ChannelQ {
	#[inline]
	fn from(raw: [u8; Q_SIZE]) -> Self { Self { raw } }
}

impl ChannelQ {
	#[must_use]
	/// # Extract From Raw Subcode.
	pub fn from_subcode(sub: &[u8]) -> Self {
		Self { raw: subcode_extract_channel(sub, Subchannel::Q) }
	}

	#[must_use]
	/// # Control/ADR Byte.
	pub const fn control_adr(&self) -> u8 { self.raw[0] }

	#[must_use]
	/// # ADR Nibble.
	pub const fn adr(&self) -> u8 { self.raw[0] & 0x0F }

	#[must_use]
	/// # Data Track?
	///
	/// Control bit 2 distinguishes data from audio.
	pub const fn is_data(&self) -> bool { self.raw[0] & 0x40 != 0 }

	#[must_use]
	/// # Track Number (BCD).
	pub const fn tno(&self) -> u8 { self.raw[1] }

	#[must_use]
	/// # Index (BCD).
	pub const fn index(&self) -> u8 { self.raw[2] }

	#[must_use]
	/// # Relative MSF (BCD).
	pub const fn msf(&self) -> MSF {
		MSF { m: self.raw[3], s: self.raw[4], f: self.raw[5] }
	}

	#[must_use]
	/// # Zero Field.
	pub const fn zero(&self) -> u8 { self.raw[6] }

	#[must_use]
	/// # Absolute MSF (BCD).
	pub const fn a_msf(&self) -> MSF {
		MSF { m: self.raw[7], s: self.raw[8], f: self.raw[9] }
	}

	#[must_use]
	/// # Absolute LBA.
	pub const fn a_lba(&self) -> i32 { bcdmsf_to_lba(self.a_msf()) }

	#[must_use]
	/// # Stored CRC (Big-Endian).
	pub const fn crc(&self) -> u16 {
		u16::from_be_bytes([self.raw[10], self.raw[11]])
	}

	#[must_use]
	/// # CRC Checks Out?
	pub fn valid(&self) -> bool { crc16_gsm(&self.raw[..10]) == self.crc() }

	#[must_use]
	/// # Completely Blank?
	pub fn is_empty(&self) -> bool { self.raw.iter().all(|&b| b == 0) }
}

impl fmt::Display for ChannelQ {
	/// # Decode.
	///
	/// Position form for ADR 1, a hex dump otherwise.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.adr() == 1 {
			let msf = self.msf();
			let a_msf = self.a_msf();
			write!(
				f,
				"tno: {:02X}, index: {:02X}, MSF: {:02X}:{:02X}:{:02X}, A-MSF: {:02X}:{:02X}:{:02X}, crc: {:04X} ({})",
				self.tno(), self.index(),
				msf.m, msf.s, msf.f,
				a_msf.m, a_msf.s, a_msf.f,
				self.crc(),
				if self.valid() { "ok" } else { "bad" },
			)
		}
		else {
			for (i, b) in self.raw.iter().enumerate() {
				if i != 0 { f.write_str(" ")?; }
				write!(f, "{b:02X}")?;
			}
			Ok(())
		}
	}
}



#[cfg(test)]
/// # Build a Valid Position Q.
///
/// Mode 1 Q for an audio sector at the given absolute LBA, with a correct
/// CRC, ready for interleaving into a test subcode buffer.
pub(crate) fn position_q(tno: u8, index: u8, lba: i32) -> [u8; Q_SIZE] {
	use crate::{
		lba_to_bcdmsf,
		msf::bcd_encode,
	};

	let mut q = [0_u8; Q_SIZE];
	q[0] = 0x01;
	q[1] = bcd_encode(tno);
	q[2] = bcd_encode(index);

	// Relative address; close enough for testing that the track starts at 0.
	let rel = lba_to_bcdmsf(lba.max(0));
	q[3] = rel.m;
	q[4] = rel.s;
	q[5] = rel.f;

	let abs = lba_to_bcdmsf(lba);
	q[7] = abs.m;
	q[8] = abs.s;
	q[9] = abs.f;

	let crc = crc16_gsm(&q[..10]).to_be_bytes();
	q[10] = crc[0];
	q[11] = crc[1];
	q
}

#[cfg(test)]
/// # Build a Subcode Buffer Holding a Valid Position Q.
pub(crate) fn position_subcode(tno: u8, index: u8, lba: i32) -> [u8; CD_SUBCODE_SIZE] {
	let mut sub = [0_u8; CD_SUBCODE_SIZE];
	subcode_insert_channel(&mut sub, &position_q(tno, index, lba), Subchannel::Q);
	sub
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_extract_channel() {
		// Bit 6 of every subcode byte belongs to Q.
		let sub = [0x40_u8; CD_SUBCODE_SIZE];
		assert_eq!(
			subcode_extract_channel(&sub, Subchannel::Q),
			[0xFF; 12],
			"Q plane should be saturated.",
		);
		assert_eq!(
			subcode_extract_channel(&sub, Subchannel::P),
			[0x00; 12],
			"P plane should be empty.",
		);
	}

	#[test]
	fn t_insert_round_trip() {
		let q = position_q(1, 1, 12_345);
		let mut sub = [0_u8; CD_SUBCODE_SIZE];
		subcode_insert_channel(&mut sub, &q, Subchannel::Q);
		assert_eq!(
			subcode_extract_channel(&sub, Subchannel::Q),
			q,
			"Interleave/deinterleave round trip failed.",
		);
	}

	#[test]
	fn t_q_validity() {
		let lba = 5000;
		let q = ChannelQ::from(position_q(3, 1, lba));
		assert!(q.valid(), "Synthesized Q should validate.");
		assert_eq!(q.adr(), 1);
		assert_eq!(q.a_lba(), lba, "Absolute address should round trip.");

		// Flip one payload bit and the CRC no longer matches.
		let mut raw = position_q(3, 1, lba);
		raw[4] ^= 0x10;
		assert!(! ChannelQ::from(raw).valid(), "Corrupted Q should not validate.");

		// Blank Q is invalid too; a zero CRC never matches a zero payload.
		assert!(! ChannelQ::default().valid(), "Blank Q should not validate.");
		assert!(ChannelQ::default().is_empty());
	}
}
