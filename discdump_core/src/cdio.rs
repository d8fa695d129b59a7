/*!
# Disc Dump: `libcdio` Transport
*/

use crate::{
	DriveHandle,
	DumpError,
	ReadCdErrorField,
	ReadCdExpectedSectorType,
	ReadCdSubChannel,
	ReadCddaSubCode,
	ScsiStatus,
	CD_C2_SIZE,
	CD_DATA_SIZE,
	CD_SUBCODE_SIZE,
	MSF_LBA_SHIFT,
	PLEXTOR_LEADIN_ENTRY_SIZE,
};
use libcdio_sys::{
	driver_id_t_DRIVER_DEVICE, // The equivalent of "use whatever's best".
	driver_return_code_t_DRIVER_OP_SUCCESS,
};
use std::{
	ffi::CString,
	os::unix::ffi::OsStrExt,
	path::Path,
	sync::Once,
};



static LIBCDIO_INIT: Once = Once::new();

/// # Command Timeout (ms).
const COMMAND_TIMEOUT: u32 = 30_000;

/// # Largest Vendor Cache Worth Scraping.
const ASUS_CACHE_MAX: usize = 1024 * 1024 * 3;

/// # Cache Scrape Chunk.
const ASUS_CACHE_CHUNK: usize = 1024 * 64;



#[derive(Debug)]
#[allow(dead_code)] // We just want to make sure dev lives as long as the ptr.
/// # libcdio-Backed Drive.
///
/// The production [`DriveHandle`]: standard MMC traffic goes through
/// libcdio's typed helpers, vendor traffic (Plextor D8, LG/ASUS cache)
/// through raw CDBs on the same handle.
pub struct LibcdioDrive {
	dev: Option<CString>,
	ptr: *mut libcdio_sys::CdIo_t,
}

impl Drop for LibcdioDrive {
	#[allow(unsafe_code)]
	fn drop(&mut self) {
		// Release the C memory!
		if ! self.ptr.is_null() {
			unsafe { libcdio_sys::cdio_destroy(self.ptr); }
		}
	}
}

impl LibcdioDrive {
	#[allow(unsafe_code)]
	/// # New!
	///
	/// Connect to a specific device, or whatever the system considers its
	/// default optical drive.
	///
	/// ## Errors
	///
	/// This will return an error if initialization fails, or if the provided
	/// device path is obviously wrong.
	pub fn new<P>(dev: Option<P>) -> Result<Self, DumpError>
	where P: AsRef<Path> {
		// Make sure the library has been initialized.
		init();

		// Take a look at the desired device.
		let dev = {
			if let Some(dev) = dev {
				let dev = dev.as_ref();
				let original: String = dev.to_string_lossy().into_owned();
				if ! dev.exists() {
					return Err(DumpError::DeviceOpen(Some(original)));
				}
				let dev = CString::new(dev.as_os_str().as_bytes())
					.map_err(|_| DumpError::DeviceOpen(Some(original)))?;
				Some(dev)
			}
			else { None }
		};

		// Connect to it.
		let ptr = unsafe {
			libcdio_sys::cdio_open(
				dev.as_ref().map_or_else(std::ptr::null, |v| v.as_ptr()),
				driver_id_t_DRIVER_DEVICE,
			)
		};

		// NULL is bad.
		if ptr.is_null() {
			Err(DumpError::DeviceOpen(dev.map(|v| v.to_string_lossy().into_owned())))
		}
		else { Ok(Self { dev, ptr }) }
	}

	#[allow(unsafe_code)]
	/// # Raw Command, Read Direction.
	///
	/// Run an arbitrary CDB against the handle, reading (up to) `buf` bytes
	/// back. Vendor commands and the handful of MMC operations libcdio has
	/// no typed helper for all come through here.
	fn run_cmd(&mut self, cdb_bytes: &[u8], buf: &mut [u8]) -> ScsiStatus {
		let mut cdb = libcdio_sys::mmc_cdb_t { field: [0; 16] };
		cdb.field[..cdb_bytes.len()].copy_from_slice(cdb_bytes);

		let res = unsafe {
			libcdio_sys::mmc_run_cmd(
				self.ptr,
				COMMAND_TIMEOUT as _,
				&cdb,
				libcdio_sys::cdio_mmc_direction_t_SCSI_MMC_DATA_READ,
				buf.len() as _,
				buf.as_mut_ptr().cast(),
			)
		};

		if res == driver_return_code_t_DRIVER_OP_SUCCESS { ScsiStatus::GOOD }
		else { ScsiStatus::check_condition(0, 0, 0) }
	}

	/// # READ TOC, Any Format.
	///
	/// Returns the verbatim response, trimmed to the length the header
	/// claims.
	fn read_toc_format(&mut self, format: u8) -> Result<Vec<u8>, DumpError> {
		let mut buf = vec![0_u8; u16::MAX as usize];
		let alloc = (buf.len() as u16).to_be_bytes();
		let cdb = [0x43, 0x00, format, 0, 0, 0, 0, alloc[0], alloc[1], 0];

		let status = self.run_cmd(&cdb, &mut buf);
		if ! status.is_good() {
			return Err(DumpError::Scsi("READ TOC", status.to_string()));
		}

		let len = (u16::from_be_bytes([buf[0], buf[1]]) as usize + 2).min(buf.len());
		buf.truncate(len);
		Ok(buf)
	}
}

impl DriveHandle for LibcdioDrive {
	fn test_unit_ready(&mut self) -> ScsiStatus {
		self.run_cmd(&[0; 6], &mut [])
	}

	#[allow(unsafe_code, clippy::cast_sign_loss)]
	fn inquiry(&mut self) -> Result<(String, String), DumpError> {
		let mut raw = libcdio_sys::cdio_hwinfo {
			psz_vendor: [0; 9],
			psz_model: [0; 17],
			psz_revision: [0; 5],
		};

		// The return code is a bool, true for good, instead of the usual
		// 0 for good.
		if 1 == unsafe { libcdio_sys::cdio_get_hwinfo(self.ptr, &mut raw) } {
			// Recast the signs since we have everything right here.
			let vendor: String = raw.psz_vendor.iter()
				.take_while(|&&b| b != 0)
				.map(|&b| char::from(b as u8))
				.collect();
			let model: String = raw.psz_model.iter()
				.take_while(|&&b| b != 0)
				.map(|&b| char::from(b as u8))
				.collect();
			Ok((vendor.trim().to_owned(), model.trim().to_owned()))
		}
		else {
			Err(DumpError::Scsi("INQUIRY", "no identification data".to_owned()))
		}
	}

	fn set_cd_speed(&mut self, speed: u16) -> ScsiStatus {
		let s = speed.to_be_bytes();
		// Read speed only; writing is somebody else's problem.
		self.run_cmd(&[0xBB, 0, s[0], s[1], 0xFF, 0xFF, 0, 0, 0, 0, 0, 0], &mut [])
	}

	fn read_toc(&mut self) -> Result<Vec<u8>, DumpError> {
		self.read_toc_format(0x00)
	}

	fn read_full_toc(&mut self) -> Result<Vec<u8>, DumpError> {
		// Plenty of units fumble FULL-TOC; an empty answer just means the
		// short TOC stands alone.
		Ok(self.read_toc_format(0x02).unwrap_or_default())
	}

	fn read_cd_text(&mut self, out: &mut Vec<u8>) -> ScsiStatus {
		out.clear();
		match self.read_toc_format(0x05) {
			Ok(buf) => {
				*out = buf;
				ScsiStatus::GOOD
			},
			Err(_) => ScsiStatus::check_condition(0x05, 0x24, 0x00),
		}
	}

	#[allow(unsafe_code)]
	fn read_cd(
		&mut self,
		buf: &mut [u8],
		lba: i32,
		count: u32,
		sector_type: ReadCdExpectedSectorType,
		error_field: ReadCdErrorField,
		sub_channel: ReadCdSubChannel,
	) -> ScsiStatus {
		let c2 = u8::from(error_field == ReadCdErrorField::C2);
		let sub = u8::from(sub_channel == ReadCdSubChannel::Raw);

		let block_size =
			CD_DATA_SIZE +
			if c2 == 1 { CD_C2_SIZE } else { 0 } +
			if sub == 1 { CD_SUBCODE_SIZE } else { 0 };

		let res = unsafe {
			libcdio_sys::mmc_read_cd(
				self.ptr,
				buf.as_mut_ptr().cast(),
				lba as _,
				match sector_type {
					ReadCdExpectedSectorType::AllTypes => 0,
					ReadCdExpectedSectorType::CdDa => 1,
				},
				0,          // No random data manipulation thank you kindly.
				1,          // Sync.
				2,          // Both header blocks.
				1,          // YES user data!
				1,          // EDC/ECC too; this is the whole raw sector.
				c2 as _,
				sub as _,
				block_size as _,
				count as _,
			)
		};

		if res == driver_return_code_t_DRIVER_OP_SUCCESS { ScsiStatus::GOOD }
		else { ScsiStatus::check_condition(0x03, 0x11, 0x00) }
	}

	fn read_cdda(
		&mut self,
		buf: &mut [u8],
		lba: i32,
		count: u32,
		sub_code: ReadCddaSubCode,
	) -> ScsiStatus {
		let lba_bytes = lba.to_be_bytes();
		let count_bytes = count.to_be_bytes();
		let mode: u8 = match sub_code {
			ReadCddaSubCode::Data => 0x00,
			ReadCddaSubCode::DataSub => 0x02,
			ReadCddaSubCode::DataC2Sub => 0x03,
		};

		// Plextor vendor READ CD-DA.
		let cdb = [
			0xD8, 0,
			lba_bytes[0], lba_bytes[1], lba_bytes[2], lba_bytes[3],
			count_bytes[0], count_bytes[1], count_bytes[2], count_bytes[3],
			mode, 0,
		];
		self.run_cmd(&cdb, buf)
	}

	fn flush_cache(&mut self, lba: i32) -> ScsiStatus {
		// A far seek forces the next read back onto the platter.
		let lba_bytes = lba.to_be_bytes();
		self.run_cmd(
			&[0x2B, 0, lba_bytes[0], lba_bytes[1], lba_bytes[2], lba_bytes[3], 0, 0, 0, 0],
			&mut [],
		)
	}

	fn plextor_read_leadin(&mut self, sectors: u32) -> Result<Vec<u8>, DumpError> {
		let mut out = Vec::with_capacity(sectors as usize * PLEXTOR_LEADIN_ENTRY_SIZE);
		let mut buf = vec![0_u8; PLEXTOR_LEADIN_ENTRY_SIZE - 4];

		// One sector at a time so each keeps its own status; the window
		// ends at the pregap boundary, and the engine works out which
		// session the drive actually served from the Q addresses.
		#[allow(clippy::cast_possible_wrap)]
		for i in 0..sectors as i32 {
			let lba = MSF_LBA_SHIFT - (sectors as i32) + i;
			let status = self.read_cdda(&mut buf, lba, 1, ReadCddaSubCode::DataC2Sub);
			out.extend_from_slice(&status.as_bytes());
			out.extend_from_slice(&buf);
		}

		Ok(out)
	}

	fn asus_cache_read(&mut self) -> Result<Vec<u8>, DumpError> {
		let mut out = Vec::new();

		// Vendor F1: pull the internal cache in chunks until the drive
		// stops answering or the plausible maximum is reached.
		let mut buf = vec![0_u8; ASUS_CACHE_CHUNK];
		let mut offset: usize = 0;
		while offset < ASUS_CACHE_MAX {
			let off = (offset as u32).to_be_bytes();
			let len = (ASUS_CACHE_CHUNK as u32).to_be_bytes();
			let cdb = [0xF1, 0x00, off[0], off[1], off[2], off[3], len[1], len[2], len[3], 0];

			let status = self.run_cmd(&cdb, &mut buf);
			if ! status.is_good() { break; }

			out.extend_from_slice(&buf);
			offset += ASUS_CACHE_CHUNK;
		}

		if out.is_empty() {
			Err(DumpError::Scsi("ASUS cache read", "no cache data returned".to_owned()))
		}
		else { Ok(out) }
	}
}



#[allow(unsafe_code)]
/// # Initialize `libcdio`.
fn init() {
	LIBCDIO_INIT.call_once(|| unsafe { libcdio_sys::cdio_init(); });
}
