/*!
# Disc Dump: Build
*/

use argyle::KeyWordsBuilder;
use std::path::PathBuf;



/// # Set Up CLI Arguments.
fn main() {
	println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");

	let mut builder = KeyWordsBuilder::default();
	builder.push_keys([
		"--asus-skip-leadout",
		"--disable-cdtext",
		"-h", "--help",
		"--overwrite",
		"--plextor-skip-leadin",
		"--refine-subchannel",
		"-v", "--verbose",
		"-V", "--version",
	]);
	builder.push_keys_with_values([
		"-d", "--drive",
		"--drive-c2-shift",
		"--drive-pregap-start",
		"--drive-read-method",
		"--drive-read-offset",
		"--drive-sector-order",
		"--drive-type",
		"--image-name",
		"--image-path",
		"--lba-end",
		"--lba-start",
		"--retries",
		"--skip",
		"--speed",
	]);
	builder.save(out_path("argyle.rs"));
}

/// # Output Path.
///
/// Append the sub-path to OUT_DIR and return it.
fn out_path(stub: &str) -> PathBuf {
	std::fs::canonicalize(std::env::var("OUT_DIR").expect("Missing OUT_DIR."))
		.expect("Missing OUT_DIR.")
		.join(stub)
}
