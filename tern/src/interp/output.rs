//! Print output sink
//!
//! `print` goes through this small indirection so the rendered output can be
//! captured and asserted on in tests instead of always landing on stdout.

use std::cell::RefCell;
use std::rc::Rc;

/// Destination for `print` output
#[derive(Debug, Clone)]
pub enum PrintSink {
    /// Write to standard output (the default)
    Stdout,
    /// Append to an in-memory buffer
    Buffer(Rc<RefCell<String>>),
}

impl PrintSink {
    /// Create a buffering sink and hand back the shared buffer
    pub fn buffer() -> (Self, Rc<RefCell<String>>) {
        let buf = Rc::new(RefCell::new(String::new()));
        (PrintSink::Buffer(Rc::clone(&buf)), buf)
    }

    /// Write one line
    pub fn println(&self, line: &str) {
        match self {
            PrintSink::Stdout => println!("{line}"),
            PrintSink::Buffer(buf) => {
                let mut buf = buf.borrow_mut();
                buf.push_str(line);
                buf.push('\n');
            }
        }
    }
}

impl Default for PrintSink {
    fn default() -> Self {
        PrintSink::Stdout
    }
}
