/// Receives upload completion as a fraction in `0.0..=1.0`.
pub trait ProgressSink: Send {
    fn update(&mut self, name: &str, fraction: f64);
}

/// Logs progress as text, once per tenth of the transfer.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_step: u32,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn update(&mut self, name: &str, fraction: f64) {
        let step = (fraction * 10.0).floor() as u32;
        if step > self.last_step {
            self.last_step = step;
            tracing::info!(file = name, "upload {:>3.0}%", fraction * 100.0);
        }
    }
}

/// Forwards only strictly increasing fractions, so restarts never show a
/// regression.
pub(crate) struct Monotonic<'a> {
    sink: &'a mut dyn ProgressSink,
    last: f64,
}

impl<'a> Monotonic<'a> {
    pub(crate) fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: 0.0 }
    }

    pub(crate) fn report(&mut self, name: &str, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction > self.last {
            self.last = fraction;
            self.sink.update(name, fraction);
        }
    }

    pub(crate) fn complete(&mut self, name: &str) {
        self.report(name, 1.0);
    }
}
