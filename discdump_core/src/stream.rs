/*!
# Disc Dump: Random-Access Streams
*/

use crate::DumpError;
use std::{
	fs::File,
	io::{
		Read,
		Seek,
		SeekFrom,
		Write,
	},
	path::Path,
};



/// # Positional Stream I/O.
///
/// The narrow capability every stream file needs: read a block at an absolute
/// position, write a block at an absolute position (growing the file with
/// zeroes as needed), and report the current length. Real dumps use
/// [`std::fs::File`]; tests use [`MemStream`].
pub trait StreamFile {
	/// # Read At.
	///
	/// Fill as much of `buf` as the file allows starting at `pos`, returning
	/// the number of bytes actually read. Short reads at EOF are normal, not
	/// an error.
	///
	/// ## Errors
	///
	/// Returns an error if the underlying read fails.
	fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize>;

	/// # Write At.
	///
	/// Write the whole buffer at `pos`. Positions past EOF implicitly extend
	/// the file with zeroes first.
	///
	/// ## Errors
	///
	/// Returns an error if the underlying write fails.
	fn write_at(&mut self, pos: u64, buf: &[u8]) -> std::io::Result<()>;

	/// # Current Length.
	///
	/// ## Errors
	///
	/// Returns an error if the length cannot be determined.
	fn stream_len(&mut self) -> std::io::Result<u64>;
}

impl StreamFile for File {
	fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
		self.seek(SeekFrom::Start(pos))?;
		let mut total = 0;
		while total < buf.len() {
			let n = self.read(&mut buf[total..])?;
			if n == 0 { break; }
			total += n;
		}
		Ok(total)
	}

	fn write_at(&mut self, pos: u64, buf: &[u8]) -> std::io::Result<()> {
		// Seeking past EOF and writing leaves a zero-filled (usually sparse)
		// gap, which is exactly what LBA-indexed streams want.
		self.seek(SeekFrom::Start(pos))?;
		self.write_all(buf)
	}

	fn stream_len(&mut self) -> std::io::Result<u64> {
		self.metadata().map(|m| m.len())
	}
}



#[derive(Debug, Clone, Default)]
/// # Memory-Backed Stream.
///
/// Byte-for-byte the same contract as the file implementation, minus the
/// filesystem.
pub struct MemStream(Vec<u8>);

impl MemStream {
	#[must_use]
	/// # New (Empty).
	pub const fn new() -> Self { Self(Vec::new()) }

	#[must_use]
	/// # From Raw Bytes.
	pub const fn from_vec(raw: Vec<u8>) -> Self { Self(raw) }

	#[must_use]
	/// # Consume, Returning the Buffer.
	pub fn into_inner(self) -> Vec<u8> { self.0 }
}

impl StreamFile for MemStream {
	fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
		let Ok(pos) = usize::try_from(pos) else { return Ok(0); };
		if self.0.len() <= pos { return Ok(0); }

		let n = buf.len().min(self.0.len() - pos);
		buf[..n].copy_from_slice(&self.0[pos..pos + n]);
		Ok(n)
	}

	fn write_at(&mut self, pos: u64, buf: &[u8]) -> std::io::Result<()> {
		let pos = usize::try_from(pos)
			.map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "position overflow"))?;

		let end = pos + buf.len();
		if self.0.len() < end { self.0.resize(end, 0); }
		self.0[pos..end].copy_from_slice(buf);
		Ok(())
	}

	fn stream_len(&mut self) -> std::io::Result<u64> {
		Ok(self.0.len() as u64)
	}
}



/// # Read One or More Entries.
///
/// Fetch `count` fixed-width records starting at `index`, with the byte
/// window slid by `byte_shift` (drive read-offset compensation). Any part of
/// the request falling before the start of the file or past EOF is filled
/// with `fill_byte`; persisted streams are sparse-friendly by design.
///
/// ## Errors
///
/// Returns an error if the underlying read fails outright.
pub fn read_entry<F: StreamFile + ?Sized>(
	file: &mut F,
	buf: &mut [u8],
	entry_size: usize,
	index: i32,
	count: usize,
	byte_shift: i32,
	fill_byte: u8,
) -> Result<(), DumpError> {
	let total = entry_size * count;
	debug_assert!(total <= buf.len(), "Entry read exceeds the buffer.");
	buf[..total].fill(fill_byte);

	let start = i64::from(index) * entry_size as i64 + i64::from(byte_shift);
	let end = start + total as i64;

	let file_len = file.stream_len()
		.map_err(|e| DumpError::Read(e.to_string()))?
		.min(i64::MAX as u64) as i64;

	// The readable overlap, if any.
	let read_start = start.max(0);
	let read_end = end.min(file_len);
	if read_start < read_end {
		let skip = (read_start - start) as usize;
		let len = (read_end - read_start) as usize;
		file.read_at(read_start as u64, &mut buf[skip..skip + len])
			.map_err(|e| DumpError::Read(e.to_string()))?;
	}

	Ok(())
}

/// # Write One or More Entries.
///
/// The mirror of [`read_entry`]: store `count` fixed-width records at
/// `index`, shifted by `byte_shift`. The sliver of a shifted write that would
/// land before position zero is silently dropped; nothing addressable lives
/// there.
///
/// ## Errors
///
/// Returns an error if the underlying write fails.
pub fn write_entry<F: StreamFile + ?Sized>(
	file: &mut F,
	buf: &[u8],
	entry_size: usize,
	index: i32,
	count: usize,
	byte_shift: i32,
) -> Result<(), DumpError> {
	let total = entry_size * count;
	debug_assert!(total <= buf.len(), "Entry write exceeds the buffer.");

	let start = i64::from(index) * entry_size as i64 + i64::from(byte_shift);
	let skip = usize::try_from(-start).unwrap_or(0).min(total);

	if skip < total {
		file.write_at((start + skip as i64) as u64, &buf[skip..total])
			.map_err(|e| DumpError::Write(e.to_string()))?;
	}

	Ok(())
}

/// # Whole Entries in a Stream.
///
/// ## Errors
///
/// Returns an error if the file length cannot be read or is not a clean
/// multiple of the entry size.
pub fn entry_count<F: StreamFile + ?Sized>(file: &mut F, entry_size: u64)
-> Result<u32, DumpError> {
	let len = file.stream_len().map_err(|e| DumpError::Read(e.to_string()))?;
	if len % entry_size == 0 {
		u32::try_from(len.wrapping_div(entry_size))
			.map_err(|_| DumpError::Read("stream too large".to_owned()))
	}
	else {
		Err(DumpError::Read(format!("stream is not a multiple of {entry_size} bytes")))
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_mem_stream() {
		let mut f = MemStream::new();
		f.write_at(10, &[1, 2, 3]).unwrap();
		assert_eq!(f.stream_len().unwrap(), 13, "Writes should extend the stream.");

		let mut buf = [9_u8; 5];
		assert_eq!(f.read_at(8, &mut buf).unwrap(), 5);
		assert_eq!(buf, [0, 0, 1, 2, 3], "The gap should read back as zeroes.");

		// Reads past EOF are short, not fatal.
		assert_eq!(f.read_at(12, &mut buf).unwrap(), 1);
		assert_eq!(f.read_at(100, &mut buf).unwrap(), 0);
	}

	#[test]
	fn t_entry_fill() {
		let mut f = MemStream::new();
		f.write_at(0, &[7; 8]).unwrap();

		// Entry 2 of size 4 is past EOF entirely: all fill.
		let mut buf = [0_u8; 4];
		read_entry(&mut f, &mut buf, 4, 2, 1, 0, 0xEE).unwrap();
		assert_eq!(buf, [0xEE; 4], "Out-of-file reads should be filled.");

		// A negative shift at index 0 fills the unreachable prefix.
		let mut buf = [0_u8; 4];
		read_entry(&mut f, &mut buf, 4, 0, 1, -2, 0xEE).unwrap();
		assert_eq!(buf, [0xEE, 0xEE, 7, 7], "Pre-file bytes should be filled.");

		// The mirror write drops the unreachable prefix.
		let mut f = MemStream::new();
		write_entry(&mut f, &[1, 2, 3, 4], 4, 0, 1, -2).unwrap();
		assert_eq!(f.into_inner(), vec![3, 4], "Pre-file bytes should be dropped.");
	}

	#[test]
	fn t_offset_invariance() {
		// Data written with a drive shift reads back identically with the
		// same shift, and canonically (shift zero) at the slid position.
		let entry = 8_usize;
		let shift = 6_i32;
		let payload: Vec<u8> = (0..8_u8).collect();

		let mut f = MemStream::new();
		write_entry(&mut f, &payload, entry, 3, 1, shift).unwrap();

		let mut buf = [0_u8; 8];
		read_entry(&mut f, &mut buf, entry, 3, 1, shift, 0).unwrap();
		assert_eq!(buf.as_slice(), payload.as_slice(), "Shifted round trip failed.");

		// Raw position check: index 3 * 8 + 6 = 30.
		let raw = f.into_inner();
		assert_eq!(&raw[30..38], payload.as_slice(), "Canonical placement is off.");
	}

	#[test]
	fn t_entry_count() {
		let mut f = MemStream::from_vec(vec![0; 96 * 3]);
		assert_eq!(entry_count(&mut f, 96).unwrap(), 3);

		let mut f = MemStream::from_vec(vec![0; 100]);
		assert!(entry_count(&mut f, 96).is_err(), "Ragged streams should error.");
	}
}
