use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

// The global subscriber can only be installed once per process, so the file
// case has to run before anything else initialises logging.
#[test]
#[serial]
fn writes_log_file_then_ignores_reinit() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("logs").join("meme.log");

    meme_composer::logging::init(true, Some(path.clone()));
    tracing::info!("history saved");

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(&path).expect("read log");
    assert!(contents.contains("history saved"));

    let other = dir.path().join("second.log");
    meme_composer::logging::init(false, None);
    tracing::info!("after reinit");
    sleep(Duration::from_millis(100));
    assert!(!other.exists(), "reinit should not open a new file");
}
