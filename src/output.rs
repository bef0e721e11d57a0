//! Destinations for `print` output.
//!
//! Every interpreter owns one [`SharedPrintHandler`]. The default writes to
//! stdout; tests and embedders capture lines in a buffer or hand them to a
//! callback.

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Host callback receiving each printed line (without the newline)
pub type LineCallback = dyn Fn(&str) + Send + Sync;

/// Where printed text goes
pub enum PrintHandlerImpl {
    /// Write to the process stdout
    Stdout,
    /// Accumulate into a string, retrievable with [`PrintHandlerImpl::get_output`]
    Buffer(Mutex<String>),
    /// Forward each line to a host callback
    Callback(Box<LineCallback>),
    /// Discard everything
    Silent,
}

impl PrintHandlerImpl {
    /// Emit `msg` followed by a newline.
    pub fn println(&self, msg: &str) {
        match self {
            Self::Stdout => {
                // A closed stdout is not an evaluation error
                let _ = writeln!(std::io::stdout().lock(), "{msg}");
            }
            Self::Buffer(buffer) => {
                let mut buffer = buffer.lock();
                buffer.push_str(msg);
                buffer.push('\n');
            }
            Self::Callback(callback) => callback(msg),
            Self::Silent => {}
        }
    }

    /// Everything captured so far. Empty for handlers that do not capture.
    pub fn get_output(&self) -> String {
        match self {
            Self::Buffer(buffer) => buffer.lock().clone(),
            Self::Stdout | Self::Callback(_) | Self::Silent => String::new(),
        }
    }

    /// Captured output split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.get_output().lines().map(str::to_owned).collect()
    }

    /// Drop captured output.
    pub fn clear(&self) {
        if let Self::Buffer(buffer) = self {
            buffer.lock().clear();
        }
    }
}

impl std::fmt::Debug for PrintHandlerImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "Stdout"),
            Self::Buffer(buffer) => f.debug_tuple("Buffer").field(&buffer.lock().len()).finish(),
            Self::Callback(_) => write!(f, "Callback"),
            Self::Silent => write!(f, "Silent"),
        }
    }
}

/// Print handler shared between an interpreter and its host.
pub type SharedPrintHandler = Arc<PrintHandlerImpl>;

pub fn stdout_handler() -> SharedPrintHandler {
    Arc::new(PrintHandlerImpl::Stdout)
}

/// Handler capturing output for later inspection.
pub fn buffer_handler() -> SharedPrintHandler {
    Arc::new(PrintHandlerImpl::Buffer(Mutex::new(String::new())))
}

pub fn silent_handler() -> SharedPrintHandler {
    Arc::new(PrintHandlerImpl::Silent)
}

/// Handler forwarding each line to `callback`.
pub fn callback_handler(callback: impl Fn(&str) + Send + Sync + 'static) -> SharedPrintHandler {
    Arc::new(PrintHandlerImpl::Callback(Box::new(callback)))
}
