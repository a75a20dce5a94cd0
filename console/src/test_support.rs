use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

/// Cloneable in-memory sink so tests can hand one end to a [`Terminal`]
/// and keep the other to inspect what was written.
#[derive(Clone, Default)]
pub(crate) struct TestSink(Arc<Mutex<Vec<u8>>>);

impl TestSink {
    pub(crate) fn contents(&self) -> String {
        let guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(err) => err.into_inner(),
        };
        String::from_utf8_lossy(&guard).into_owned()
    }
}

impl Write for TestSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(err) => err.into_inner(),
        };
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
