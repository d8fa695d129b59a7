/*!
# Disc Dump: Interrupt Latch

One signal, two audiences. The engine loop wants a request it can poll once
per sector and act on at a clean boundary, scoped so a stray CTRL+C between
modes can't poison the next pass. The front-end's mode pipeline wants the
opposite: a sticky "the user gave up" fact that survives the loop winding
down, so the remaining modes get skipped. Both live here, fed by the same
[`interrupt`] entry point.
*/

use std::sync::atomic::{
	AtomicBool,
	Ordering::{
		Acquire,
		Release,
	},
};



/// # Interrupt Requested (Current Loop).
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// # Latch Armed.
///
/// Interrupt requests landing outside an engaged window are dropped so a
/// stray CTRL+C between modes doesn't poison the next loop.
static ENGAGED: AtomicBool = AtomicBool::new(false);

/// # Abort Requested (Process Lifetime).
///
/// Unlike [`INTERRUPTED`], this never clears; the mode pipeline reads it to
/// stop scheduling work after a forced stop.
static ABORTED: AtomicBool = AtomicBool::new(false);



/// # Request an Interrupt.
///
/// This is the entry point for the front-end's signal handler. The abort is
/// recorded unconditionally; the per-loop request only sticks while a
/// dump/refine loop has the latch engaged, which polls it once per sector
/// and winds down cleanly at the boundary.
pub fn interrupt() {
	ABORTED.store(true, Release);
	if ENGAGED.load(Acquire) {
		INTERRUPTED.store(true, Release);
	}
}

#[must_use]
/// # Abort Requested?
///
/// `true` once [`interrupt`] has fired, engaged loop or not. The driver
/// checks this between modes (and again at the end, to report the early
/// exit).
pub fn aborted() -> bool { ABORTED.load(Acquire) }



#[derive(Debug)]
/// # Scoped Latch Guard.
///
/// Engages the process-wide interrupt latch for the lifetime of the value and
/// disengages it again on drop, no matter how the owning scope exits.
pub(crate) struct SignalGuard(());

impl SignalGuard {
	/// # Engage.
	pub(crate) fn engage() -> Self {
		INTERRUPTED.store(false, Release);
		ENGAGED.store(true, Release);
		Self(())
	}

	/// # Interrupt Requested?
	pub(crate) fn interrupted(&self) -> bool { INTERRUPTED.load(Acquire) }
}

impl Drop for SignalGuard {
	fn drop(&mut self) {
		ENGAGED.store(false, Release);
		INTERRUPTED.store(false, Release);
	}
}



#[cfg(test)]
/// # Serialize Latch-Touching Tests.
///
/// The latch is process-global; tests that engage it (directly or through
/// the engine) take this lock so parallel execution can't cross wires.
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
	static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
	LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_latch() {
		let _lock = test_guard();

		// Requests without an engaged guard are dropped from the loop latch
		// but still count as an abort.
		assert!(! aborted(), "Nothing has fired yet.");
		interrupt();
		assert!(aborted(), "The abort flag should stick immediately.");
		{
			let guard = SignalGuard::engage();
			assert!(! guard.interrupted(), "Stray interrupt leaked into the guard window.");

			interrupt();
			assert!(guard.interrupted(), "Interrupt request did not stick.");
		}

		// A fresh guard starts clean again; the abort fact does not.
		let guard = SignalGuard::engage();
		assert!(! guard.interrupted(), "Latch was not cleared on disengage.");
		assert!(aborted(), "The abort flag must survive the guard.");
	}
}
