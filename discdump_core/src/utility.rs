/*!
# Disc Dump: Odds and Ends
*/

use crate::DumpError;



/// # Range Membership.
///
/// Return the first half-open `[start, end)` range containing `lba`, if any.
/// Skip ranges and error ranges are both consulted this way on every step of
/// the main loop, so the lists stay plain slices.
pub(crate) fn inside_range(lba: i32, ranges: &[(i32, i32)]) -> Option<(i32, i32)> {
	ranges.iter().copied().find(|&(start, end)| start <= lba && lba < end)
}

/// # Parse User Skip Ranges.
///
/// Comma-separated `a-b` pairs, half-open. The split looks for the first
/// dash after position zero so a leading negative sign survives.
///
/// ## Errors
///
/// Returns an error if any piece fails to parse as a pair of integers.
pub fn string_to_ranges(raw: &str) -> Result<Vec<(i32, i32)>, DumpError> {
	let mut out = Vec::new();

	for chunk in raw.split(',') {
		let chunk = chunk.trim();
		if chunk.is_empty() { continue; }

		let err = || DumpError::Read(format!("invalid range ({chunk})"));

		let pos = chunk[1..].find('-').map(|p| p + 1).ok_or_else(err)?;
		let a: i32 = chunk[..pos].trim().parse().map_err(|_| err())?;
		let b: i32 = chunk[pos + 1..].trim().parse().map_err(|_| err())?;
		if b < a { return Err(err()); }

		out.push((a, b));
	}

	Ok(out)
}

#[must_use]
#[allow(clippy::cast_sign_loss, clippy::integer_division)]
/// # Progress Percentage.
pub(crate) fn percentage(value: i32, value_max: u32) -> u32 {
	if value < 0 { 0 }
	else if value_max == 0 || value as u32 >= value_max { 100 }
	else { (value as u32) * 100 / value_max }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_inside_range() {
		let ranges = [(10, 20), (30, 40)];
		assert_eq!(inside_range(9, &ranges), None);
		assert_eq!(inside_range(10, &ranges), Some((10, 20)));
		assert_eq!(inside_range(19, &ranges), Some((10, 20)));
		assert_eq!(inside_range(20, &ranges), None, "Ranges are half-open.");
		assert_eq!(inside_range(35, &ranges), Some((30, 40)));
	}

	#[test]
	fn t_string_to_ranges() {
		assert_eq!(
			string_to_ranges("100-200, 5000-5100").unwrap(),
			vec![(100, 200), (5000, 5100)],
		);
		assert_eq!(
			string_to_ranges("-150-0").unwrap(),
			vec![(-150, 0)],
			"Negative starts should parse.",
		);
		assert_eq!(string_to_ranges("").unwrap(), Vec::new());
		assert!(string_to_ranges("backwards").is_err());
		assert!(string_to_ranges("200-100").is_err(), "Backwards ranges should fail.");
	}

	#[test]
	fn t_percentage() {
		assert_eq!(percentage(-5, 100), 0);
		assert_eq!(percentage(0, 0), 100);
		assert_eq!(percentage(50, 100), 50);
		assert_eq!(percentage(100, 100), 100);
		assert_eq!(percentage(200, 100), 100);
	}
}
