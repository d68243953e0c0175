use journey_planner::{
	config::{LATEST_LOG, LOG_DIR},
	log,
};
use serial_test::serial;
use std::{fs, io::Write, path::Path, time::Duration};
use tracing::{error, trace};

/// Verifies that `logs/latest.log` is created and written to from log events.
#[test]
#[serial]
fn test_logger() {
	unsafe {
		std::env::set_var("RUST_LOG", "warn,journey_planner=debug");
	}
	let latest_log_path = Path::new(LOG_DIR).join(LATEST_LOG);
	_ = fs::remove_file(latest_log_path.as_path());
	log::init_logger();
	trace!("test trace");
	error!("test error");
	log::log_writer().flush().unwrap();
	std::thread::sleep(Duration::from_millis(50));
	let logs = fs::read_to_string(latest_log_path).unwrap();
	assert!(!logs.is_empty());
}

/// Verifies that a panic is captured by the panic hook without aborting the
/// test process.
#[test]
#[serial]
fn test_panic_handler() {
	log::init_panic_handler();
	let result = std::panic::catch_unwind(|| {
		panic!("test panic");
	});
	assert!(result.is_err());
}
