/*!
# Disc Dump: Dump Options
*/

use std::path::PathBuf;



/// # FLAG: Overwrite an Existing Dump.
const FLAG_OVERWRITE: u8 =          0b0000_0001;

/// # FLAG: Refine Q-Invalid Sectors Too.
const FLAG_REFINE_SUBCHANNEL: u8 =  0b0000_0010;

/// # FLAG: Skip the LG/ASUS Lead-Out Scrape.
const FLAG_ASUS_SKIP_LEADOUT: u8 =  0b0000_0100;

/// # FLAG: Skip the Plextor Lead-In Capture.
const FLAG_PLEXTOR_SKIP_LEADIN: u8 = 0b0000_1000;

/// # FLAG: Skip CD-TEXT.
const FLAG_DISABLE_CDTEXT: u8 =     0b0001_0000;

/// # FLAG: Chatty Per-Sector Reporting.
const FLAG_VERBOSE: u8 =            0b0010_0000;



#[derive(Debug, Clone, Default)]
/// # Dump Options.
///
/// Everything the engine needs to know beyond the drive profile: where the
/// image lives, what to skip, how hard to try. Options are set with
/// builder-style methods:
///
/// ```
/// use discdump_core::DumpOptions;
///
/// let opts = DumpOptions::default()
///     .with_image_name("my_disc")
///     .with_retries(4)
///     .with_verbose(true);
///
/// assert_eq!(opts.retries(), 4);
/// assert!(opts.verbose());
/// ```
pub struct DumpOptions {
	image_path: PathBuf,
	image_name: String,
	retries: u32,
	lba_start: Option<i32>,
	lba_end: Option<i32>,
	skip: Vec<(i32, i32)>,
	flags: u8,
}

macro_rules! with_flag {
	($fn:ident, $get:ident, $flag:ident, $($doc:literal),+ $(,)?) => (
		#[must_use]
		$(
			#[doc = $doc]
		)+
		pub const fn $fn(mut self, v: bool) -> Self {
			if v { self.flags |= $flag; }
			else { self.flags &= ! $flag; }
			self
		}

		#[must_use]
		#[doc = concat!("# ", stringify!($get), "?")]
		pub const fn $get(&self) -> bool { self.flags & $flag != 0 }
	)
}

/// ## Setters (and Their Getters).
impl DumpOptions {
	with_flag!(
		with_overwrite, overwrite, FLAG_OVERWRITE,
		"# Overwrite.",
		"",
		"Allow a fresh dump on top of existing stream files. Without this, a",
		"pre-existing state file is a hard stop.",
	);

	with_flag!(
		with_refine_subchannel, refine_subchannel, FLAG_REFINE_SUBCHANNEL,
		"# Refine Subchannel.",
		"",
		"Also re-read sectors whose stored Q fails its CRC.",
	);

	with_flag!(
		with_asus_skip_leadout, asus_skip_leadout, FLAG_ASUS_SKIP_LEADOUT,
		"# Skip the LG/ASUS Lead-Out Scrape.",
	);

	with_flag!(
		with_plextor_skip_leadin, plextor_skip_leadin, FLAG_PLEXTOR_SKIP_LEADIN,
		"# Skip the Plextor Lead-In Capture.",
	);

	with_flag!(
		with_disable_cdtext, disable_cdtext, FLAG_DISABLE_CDTEXT,
		"# Skip CD-TEXT.",
	);

	with_flag!(
		with_verbose, verbose, FLAG_VERBOSE,
		"# Verbose.",
		"",
		"Report every SCSI/C2 event with sense text, bit counts, and CRCs.",
	);

	#[must_use]
	/// # Image Directory.
	pub fn with_image_path<P: Into<PathBuf>>(mut self, v: P) -> Self {
		self.image_path = v.into();
		self
	}

	#[must_use]
	/// # Image Name.
	pub fn with_image_name<S: Into<String>>(mut self, v: S) -> Self {
		self.image_name = v.into();
		self
	}

	#[must_use]
	/// # Refine Retries Per Defective Sector.
	pub const fn with_retries(mut self, v: u32) -> Self {
		self.retries = v;
		self
	}

	#[must_use]
	/// # Force the First LBA.
	pub const fn with_lba_start(mut self, v: i32) -> Self {
		self.lba_start = Some(v);
		self
	}

	#[must_use]
	/// # Cap the Last LBA.
	///
	/// An explicit end also pins the lead-out overread; without one the
	/// engine keeps going until the drive stops answering.
	pub const fn with_lba_end(mut self, v: i32) -> Self {
		self.lba_end = Some(v);
		self
	}

	#[must_use]
	/// # User Skip Ranges.
	pub fn with_skip(mut self, v: Vec<(i32, i32)>) -> Self {
		self.skip = v;
		self
	}
}

/// ## Getters.
impl DumpOptions {
	#[must_use]
	/// # Image Name.
	pub fn image_name(&self) -> &str { &self.image_name }

	#[must_use]
	/// # Retries.
	pub const fn retries(&self) -> u32 { self.retries }

	#[must_use]
	/// # Forced First LBA.
	pub const fn lba_start(&self) -> Option<i32> { self.lba_start }

	#[must_use]
	/// # Forced Last LBA.
	pub const fn lba_end(&self) -> Option<i32> { self.lba_end }

	#[must_use]
	/// # Skip Ranges.
	pub fn skip(&self) -> &[(i32, i32)] { &self.skip }

	#[must_use]
	/// # Image Prefix.
	///
	/// The directory-plus-name base every stream file hangs off of.
	pub fn image_prefix(&self) -> PathBuf {
		self.image_path.join(&self.image_name)
	}

	#[must_use]
	/// # Image Directory.
	pub fn image_path(&self) -> &PathBuf { &self.image_path }

	#[must_use]
	/// # A Stream File Path.
	///
	/// The extension is appended rather than swapped in; image names are
	/// allowed to contain dots.
	pub fn stream_path(&self, ext: &str) -> PathBuf {
		let mut name = self.image_name.clone();
		name.push('.');
		name.push_str(ext);
		self.image_path.join(name)
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_flags() {
		let opts = DumpOptions::default();
		assert!(! opts.overwrite());
		assert!(! opts.verbose());

		let opts = opts.with_overwrite(true).with_verbose(true);
		assert!(opts.overwrite());
		assert!(opts.verbose());
		assert!(! opts.refine_subchannel(), "Unrelated flags should stay clear.");

		let opts = opts.with_overwrite(false);
		assert!(! opts.overwrite());
		assert!(opts.verbose(), "Clearing one flag should not clear others.");
	}

	#[test]
	fn t_paths() {
		let opts = DumpOptions::default()
			.with_image_path("dumps")
			.with_image_name("disc.v1");

		// Dots in the name must survive.
		assert_eq!(
			opts.stream_path("scram"),
			PathBuf::from("dumps").join("disc.v1.scram"),
		);
		assert_eq!(opts.image_prefix(), PathBuf::from("dumps").join("disc.v1"));
	}
}
