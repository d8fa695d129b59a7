/*!
# Disc Dump: LG/ASUS Lead-Out Cache
*/

use crate::{
	ChannelQ,
	CD_C2_SIZE,
	CD_DATA_SIZE,
	CD_RAW_DATA_SIZE,
};



/// # Cache Entry Size.
///
/// The internal read cache stores raw planes plus a 64-byte housekeeping
/// tag per sector. Only the subcode plane is trusted here; the tag layout
/// varies between firmware revisions.
pub(super) const ASUS_CACHE_ENTRY_SIZE: usize = CD_RAW_DATA_SIZE + 64;



/// # Extract a Lead-Out Tail From a Cache Dump.
///
/// These drives keep the last megabyte or so of raw reads in an internal
/// ring, including sectors past the point where they stop answering READ
/// commands. Locate `lba_start` by each entry's Q address, then collect the
/// contiguous ascending run that follows, up to `limit` sectors, re-packed
/// as standard `data | C2 | subcode` entries.
///
/// An empty result just means the cache didn't cover the request; the
/// caller logs and moves on.
pub(super) fn cache_extract(cache: &[u8], lba_start: i32, limit: usize) -> Vec<u8> {
	// Index the cache by decoded Q address.
	let entries: Vec<(usize, Option<i32>)> = cache.chunks_exact(ASUS_CACHE_ENTRY_SIZE)
		.enumerate()
		.map(|(i, entry)| {
			let q = ChannelQ::from_subcode(&entry[CD_DATA_SIZE + CD_C2_SIZE..CD_RAW_DATA_SIZE]);
			let lba =
				if q.valid() && q.adr() == 1 { Some(q.a_lba()) }
				else { None };
			(i, lba)
		})
		.collect();

	// Find the requested address.
	let Some(start) = entries.iter().position(|&(_, lba)| lba == Some(lba_start)) else {
		return Vec::new();
	};

	// Take the contiguous ascending run.
	let mut out = Vec::new();
	let mut expected = lba_start;
	for &(i, lba) in entries.iter().skip(start).take(limit) {
		if lba != Some(expected) { break; }
		out.extend_from_slice(&cache[i * ASUS_CACHE_ENTRY_SIZE..i * ASUS_CACHE_ENTRY_SIZE + CD_RAW_DATA_SIZE]);
		expected += 1;
	}

	out
}
