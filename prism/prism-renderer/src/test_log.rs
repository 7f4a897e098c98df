//! Thread-local log capture for tests.

use std::cell::RefCell;
use std::sync::Once;

thread_local! {
    static ERRORS: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Error
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        ERRORS.with(|e| {
            if let Some(buf) = e.borrow_mut().as_mut() {
                buf.push(record.args().to_string());
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Run `f` and return its result plus every error-level message it logged on this thread.
pub(crate) fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Error);
        }
    });
    ERRORS.with(|e| *e.borrow_mut() = Some(Vec::new()));
    let result = f();
    let errors = ERRORS.with(|e| e.borrow_mut().take().unwrap_or_default());
    (result, errors)
}
