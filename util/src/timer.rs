use std::time::{Duration, Instant};

/// Utility for keeping track of the time it took to perform some operation.
pub struct Timer {
    start_time: Instant,
}

impl Timer {
    /// Create a new `Timer`.
    pub fn now() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Reset internal timer to now.
    pub fn reset(&mut self) {
        self.start_time = Instant::now();
    }

    /// Time since the timer was last reset.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Print a message with the elapsed time since the timer was last reset.
    pub fn print_elapsed(&self, label: &str) {
        eprintln!("{} took {:?}", label, self.elapsed());
    }
}

#[cfg(test)]
mod test {
    use super::Timer;
    use std::time::Duration;
    #[test]
    fn test_reset() {
        let mut timer = Timer::now();
        std::thread::sleep(Duration::from_millis(50));
        let before = timer.elapsed();
        assert!(before >= Duration::from_millis(50));
        timer.reset();
        assert!(timer.elapsed() < before);
    }
}
