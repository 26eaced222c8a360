/// Integration tests for tidywatch
///
/// These tests drive the organizer end to end: configuration on disk,
/// directory bootstrap, the startup sweep and notification handling.
///
/// Test categories:
/// 1. Routing scenarios
/// 2. Collision handling
/// 3. Retry through later sweeps
/// 4. Notification-driven loop
/// 5. Logging behaviour
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tidywatch::{
    ChannelSource, FileOrganizer, LogSink, PollingSource, ReconciliationLoop, RoutingRule,
    RoutingTable,
};
use tracing::{Dispatch, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary tree with an `inbox` source directory and a config file.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("inbox")).expect("Failed to create inbox");
        TestFixture { temp_dir }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn source(&self) -> PathBuf {
        self.path().join("inbox")
    }

    /// Absolute path of a directory under the fixture root.
    fn dir(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    fn create_file(&self, rel_path: &str, content: &[u8]) {
        let file_path = self.path().join(rel_path);
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content).expect("Failed to write file content");
    }

    /// Writes a JSON config whose rules are `(dir name, extensions, padding, create)`.
    fn write_config(&self, rules: &[(&str, &[&str], usize, bool)]) -> PathBuf {
        let directories: Vec<_> = rules
            .iter()
            .map(|(name, extensions, padding, create)| {
                serde_json::json!({
                    "path": self.dir(name),
                    "extensions": extensions,
                    "padding_number": padding,
                    "create": create,
                })
            })
            .collect();
        let config = serde_json::json!({
            "source_dir": { "path": self.source(), "create": false },
            "directories": directories,
            "sleep_time": 1,
        });

        let config_path = self.path().join("config.json");
        fs::write(&config_path, config.to_string()).expect("Failed to write config");
        config_path
    }

    fn read(&self, rel_path: &str) -> Vec<u8> {
        fs::read(self.path().join(rel_path)).expect("Failed to read file")
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    fn count_source_files(&self) -> usize {
        fs::read_dir(self.source())
            .expect("Failed to read directory")
            .flatten()
            .filter(|entry| entry.path().is_file())
            .count()
    }
}

/// Counts events at or above ERROR and INFO.
#[derive(Clone, Default)]
struct EventCounter {
    errors: Arc<AtomicUsize>,
    infos: Arc<AtomicUsize>,
}

impl<S: Subscriber> Layer<S> for EventCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        match *event.metadata().level() {
            Level::ERROR => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            Level::INFO => {
                self.infos.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

impl EventCounter {
    fn sink(&self) -> LogSink {
        LogSink::new(Dispatch::new(
            tracing_subscriber::registry().with(self.clone()),
        ))
    }

    fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

fn organizer(fixture: &TestFixture, rules: &[(&str, &[&str], usize, bool)]) -> FileOrganizer {
    let organizer = FileOrganizer::new(&fixture.write_config(rules), LogSink::none());
    assert!(organizer.status(), "{}", organizer.status_message());
    organizer
}

/// Sends `events` through a channel source, then lets the loop drain and exit.
fn run_with_events(organizer: &FileOrganizer, events: &[PathBuf]) {
    let (mut source, sender) = ChannelSource::new();
    for event in events {
        sender.send(event.clone()).expect("Failed to queue event");
    }
    drop(sender);

    organizer
        .start_with(&mut source, &AtomicBool::new(false))
        .expect("Loop failed");
}

fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

// ============================================================================
// Test Suite 1: Routing
// ============================================================================

#[test]
fn test_report_is_moved_into_created_docs_directory() {
    let fixture = TestFixture::new();
    let content = b"quarterly numbers\n\x00\xff binary tail";
    fixture.create_file("inbox/report.txt", content);
    let organizer = organizer(&fixture, &[("docs", &["txt"], 3, true)]);

    run_with_events(&organizer, &[]);

    fixture.assert_file_exists("docs/report.txt");
    fixture.assert_file_not_exists("inbox/report.txt");
    assert_eq!(fixture.read("docs/report.txt"), content);
}

#[test]
fn test_rules_are_matched_in_configuration_order() {
    let fixture = TestFixture::new();
    fixture.create_file("inbox/photo.jpg", b"jpg");
    let organizer = organizer(
        &fixture,
        &[
            ("pictures", &["jpg", "png"], 3, true),
            ("everything", &["jpg", "txt"], 3, true),
        ],
    );

    organizer.sweep_once().expect("Sweep failed");

    fixture.assert_file_exists("pictures/photo.jpg");
    fixture.assert_file_not_exists("everything/photo.jpg");
}

#[test]
fn test_missing_destination_falls_through_to_next_rule() {
    let fixture = TestFixture::new();
    fixture.create_file("inbox/song.mp3", b"mp3");
    let organizer = organizer(
        &fixture,
        &[("music", &["mp3"], 3, false), ("misc", &["mp3"], 3, true)],
    );

    organizer.sweep_once().expect("Sweep failed");

    assert!(!fixture.dir("music").exists());
    fixture.assert_file_exists("misc/song.mp3");
}

#[test]
fn test_unrecognized_extension_stays_and_logs_error() {
    let fixture = TestFixture::new();
    fixture.create_file("inbox/data.xyz", b"?");
    let counter = EventCounter::default();
    let organizer = FileOrganizer::new(
        &fixture.write_config(&[("docs", &["txt"], 3, true)]),
        counter.sink(),
    );

    let report = organizer.sweep_once().expect("Sweep failed");

    fixture.assert_file_exists("inbox/data.xyz");
    assert_eq!(report.unmatched, vec![fixture.source().join("data.xyz")]);
    assert_eq!(counter.errors(), 1);
}

#[test]
fn test_multi_dot_name_uses_everything_after_first_dot() {
    let fixture = TestFixture::new();
    fixture.create_file("inbox/site.tar.gz", b"archive");
    fixture.create_file("inbox/other.gz", b"gz");
    let organizer = organizer(
        &fixture,
        &[("gz", &["gz"], 3, true), ("tarballs", &["tar.gz"], 3, true)],
    );

    organizer.sweep_once().expect("Sweep failed");

    fixture.assert_file_exists("tarballs/site.tar.gz");
    fixture.assert_file_exists("gz/other.gz");
}

#[test]
fn test_ignored_files_are_left_without_errors() {
    let fixture = TestFixture::new();
    fixture.create_file("inbox/movie.mkv.part", b"partial");
    let config_path = fixture.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "ignore = [\"*.part\"]\n\n[source_dir]\npath = {:?}\n\n[[directories]]\npath = {:?}\nextensions = [\"mkv.part\"]\ncreate = true\n",
            fixture.source(),
            fixture.dir("video"),
        ),
    )
    .expect("Failed to write config");
    let counter = EventCounter::default();
    let organizer = FileOrganizer::new(&config_path, counter.sink());
    assert!(organizer.status(), "{}", organizer.status_message());

    let report = organizer.sweep_once().expect("Sweep failed");

    assert_eq!(report.ignored.len(), 1);
    fixture.assert_file_exists("inbox/movie.mkv.part");
    assert_eq!(counter.errors(), 0);
}

// ============================================================================
// Test Suite 2: Collisions
// ============================================================================

#[test]
fn test_existing_destination_file_gets_numbered_name() {
    let fixture = TestFixture::new();
    fs::create_dir(fixture.dir("docs")).unwrap();
    fixture.create_file("docs/report.txt", b"original");
    fixture.create_file("inbox/report.txt", b"incoming");
    let organizer = organizer(&fixture, &[("docs", &["txt"], 3, true)]);

    organizer.sweep_once().expect("Sweep failed");

    assert_eq!(fixture.read("docs/report.txt"), b"original");
    assert_eq!(fixture.read("docs/report_000.txt"), b"incoming");
    fixture.assert_file_not_exists("inbox/report.txt");
}

#[test]
fn test_repeated_arrivals_never_overwrite() {
    let fixture = TestFixture::new();
    let organizer = organizer(&fixture, &[("docs", &["txt"], 2, true)]);

    for round in 0..4 {
        fixture.create_file("inbox/scan.txt", format!("round {round}").as_bytes());
        run_with_events(&organizer, &[fixture.source().join("scan.txt")]);
    }

    assert_eq!(fixture.read("docs/scan.txt"), b"round 0");
    assert_eq!(fixture.read("docs/scan_00.txt"), b"round 1");
    assert_eq!(fixture.read("docs/scan_01.txt"), b"round 2");
    assert_eq!(fixture.read("docs/scan_02.txt"), b"round 3");
}

// ============================================================================
// Test Suite 3: Retry through sweeps
// ============================================================================

#[test]
fn test_file_left_behind_is_moved_on_next_notification() {
    let fixture = TestFixture::new();
    fixture.create_file("inbox/notes.txt", b"notes");
    let organizer = organizer(&fixture, &[("docs", &["txt"], 3, false)]);

    let first = organizer.sweep_once().expect("Sweep failed");
    assert_eq!(first.unmatched.len(), 1);
    fixture.assert_file_exists("inbox/notes.txt");

    // operator creates the destination out of band
    fs::create_dir(fixture.dir("docs")).unwrap();
    fixture.create_file("inbox/trigger.bin", b"unrelated");
    run_with_events(&organizer, &[fixture.source().join("trigger.bin")]);

    fixture.assert_file_exists("docs/notes.txt");
    fixture.assert_file_exists("inbox/trigger.bin");
}

#[test]
fn test_retry_resolves_identically_without_changes() {
    let fixture = TestFixture::new();
    fixture.create_file("inbox/data.xyz", b"?");
    let organizer = organizer(&fixture, &[("docs", &["txt"], 3, true)]);

    let first = organizer.sweep_once().expect("Sweep failed");
    let second = organizer.sweep_once().expect("Sweep failed");

    assert_eq!(first, second);
    assert_eq!(fixture.count_source_files(), 1);
}

#[cfg(target_os = "linux")]
#[test]
fn test_failed_move_is_logged_and_retried_next_sweep() {
    let fixture = TestFixture::new();
    fs::create_dir(fixture.dir("docs")).unwrap();
    // 252 bytes fits NAME_MAX, the `_000` variant does not
    let name = format!("{}.txt", "a".repeat(248));
    fixture.create_file(&format!("docs/{name}"), b"resident");
    fixture.create_file(&format!("inbox/{name}"), b"incoming");

    let counter = EventCounter::default();
    let reconciler = ReconciliationLoop::new(
        fixture.source(),
        RoutingTable::new(vec![RoutingRule::new(fixture.dir("docs"), ["txt"])]),
        Duration::from_millis(10),
        counter.sink(),
    );

    let first = reconciler.sweep();
    let second = reconciler.sweep();

    assert_eq!(first.failed.len(), 1);
    assert_eq!(second.failed.len(), 1);
    assert_eq!(first.failed[0].0, fixture.source().join(&name));
    assert!(first.moved.is_empty() && first.unmatched.is_empty());
    assert_eq!(counter.errors(), 2);
    assert_eq!(fixture.read(&format!("inbox/{name}")), b"incoming");
    assert_eq!(fixture.read(&format!("docs/{name}")), b"resident");
    assert_eq!(fixture.count_source_files(), 1);
}

#[test]
fn test_empty_source_sweep_is_silent() {
    let fixture = TestFixture::new();
    let counter = EventCounter::default();
    let organizer = FileOrganizer::new(
        &fixture.write_config(&[("docs", &["txt"], 3, true)]),
        counter.sink(),
    );

    let report = organizer.sweep_once().expect("Sweep failed");

    assert_eq!(report.total_processed(), 0);
    assert!(report.moved.is_empty());
    assert_eq!(counter.errors(), 0);
}

// ============================================================================
// Test Suite 4: Notification-driven loop
// ============================================================================

#[test]
fn test_notification_for_vanished_file_is_harmless() {
    let fixture = TestFixture::new();
    let counter = EventCounter::default();
    let organizer = FileOrganizer::new(
        &fixture.write_config(&[("docs", &["txt"], 3, true)]),
        counter.sink(),
    );

    run_with_events(&organizer, &[fixture.source().join("ghost.txt")]);

    assert_eq!(counter.errors(), 0);
}

#[test]
fn test_loop_stops_on_shutdown_flag() {
    let fixture = TestFixture::new();
    let organizer = organizer(&fixture, &[("docs", &["txt"], 3, true)]);
    let (mut source, _sender) = ChannelSource::new();
    let shutdown = AtomicBool::new(true);

    let started = Instant::now();
    organizer
        .start_with(&mut source, &shutdown)
        .expect("Loop failed");

    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_polling_source_routes_files_created_while_running() {
    let fixture = TestFixture::new();
    let organizer = organizer(&fixture, &[("docs", &["txt"], 3, true)]);
    let shutdown = AtomicBool::new(false);
    let (done_tx, done_rx) = mpsc::channel();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let mut source = PollingSource::new(Duration::from_millis(100), LogSink::none());
            let result = organizer.start_with(&mut source, &shutdown);
            done_tx.send(result.is_ok()).unwrap();
        });

        std::thread::sleep(Duration::from_millis(300));
        fixture.create_file("inbox/late.txt", b"late");

        let moved = wait_for(|| fixture.dir("docs").join("late.txt").exists(), Duration::from_secs(10));
        shutdown.store(true, Ordering::SeqCst);

        assert!(moved, "late.txt was not routed");
    });

    assert!(done_rx.recv().unwrap());
    fixture.assert_file_not_exists("inbox/late.txt");
}

#[test]
fn test_reconciliation_loop_can_be_built_directly() {
    let fixture = TestFixture::new();
    fs::create_dir(fixture.dir("docs")).unwrap();
    fixture.create_file("inbox/a.txt", b"a");
    let counter = EventCounter::default();
    let reconciler = ReconciliationLoop::new(
        fixture.source(),
        RoutingTable::new(vec![RoutingRule::new(fixture.dir("docs"), ["txt"])]),
        Duration::from_millis(10),
        counter.sink(),
    );

    let report = reconciler.handle_created(&fixture.source().join("a.txt"));

    assert_eq!(report.moved.len(), 1);
    assert_eq!(counter.infos.load(Ordering::SeqCst), 1);
    fixture.assert_file_exists("docs/a.txt");
}

// ============================================================================
// Test Suite 5: Configuration status
// ============================================================================

#[test]
fn test_invalid_config_is_reported_through_status() {
    let fixture = TestFixture::new();
    let config_path = fixture.path().join("config.json");
    fs::write(&config_path, "{ not json").unwrap();

    let organizer = FileOrganizer::new(&config_path, LogSink::none());

    assert!(!organizer.status());
    assert!(organizer.status_message().starts_with("Invalid configuration"));
    assert!(organizer.sweep_once().is_err());
}

#[test]
fn test_uncreatable_destination_disables_rule() {
    let fixture = TestFixture::new();
    fixture.create_file("blocker", b"file in the way");
    fixture.create_file("inbox/notes.txt", b"notes");
    let organizer = organizer(
        &fixture,
        &[("blocker/docs", &["txt"], 3, true), ("fallback", &["txt"], 3, true)],
    );

    assert_eq!(organizer.bootstrap_report().failed.len(), 1);
    organizer.sweep_once().expect("Sweep failed");

    fixture.assert_file_exists("fallback/notes.txt");
}
