use std::time::Instant;

/// Logs the wall-clock time spent in a scope when dropped.
///
/// # Examples
///
/// ```
/// use voxcarve_io::trace::Trace;
///
/// {
///     let _trace = Trace::new("carving");
///     // ... work ...
/// } // logs "carving: 0.000012s" at debug level
/// ```
pub struct Trace {
    name: &'static str,
    start: Instant,
}

impl Trace {
    /// Start timing a named stage.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Seconds elapsed since the trace started.
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for Trace {
    fn drop(&mut self) {
        log::debug!("{}: {:.6}s", self.name, self.elapsed_secs());
    }
}

#[cfg(test)]
mod tests {
    use super::Trace;

    #[test]
    fn test_trace_elapsed() {
        let trace = Trace::new("test");
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(trace.elapsed_secs() >= 0.002);
    }
}
