//! Operator interaction
//!
//! Prompts and the progress indicator go through [`Console`] so the
//! streaming loop can run against a terminal or a scripted operator.

use std::io::{self, BufRead, Write};

use crate::device::DeviceSerial;

pub trait Console {
    /// Print the enumerated devices.
    fn show_devices(&mut self, devices: &[DeviceSerial]);

    /// Ask which device to open. `None` when the answer is not a number.
    fn select_device(&mut self, devices: &[DeviceSerial]) -> Option<usize>;

    /// Ask whether to stream the recording instead of the failed device.
    fn confirm_fallback(&mut self) -> bool;

    /// One step of the progress indicator.
    fn progress_tick(&mut self);

    /// Print a line of status text.
    fn message(&mut self, text: &str);

    /// Block until the operator acknowledges exit.
    fn wait_for_exit(&mut self);
}

/// Console on stdin/stdout
pub struct TerminalConsole<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl TerminalConsole<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn prompt(&mut self, text: &str) -> Option<String> {
        let _ = write!(self.output, "{}", text);
        let _ = self.output.flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead, W: Write> Console for TerminalConsole<R, W> {
    fn show_devices(&mut self, devices: &[DeviceSerial]) {
        let _ = writeln!(self.output, "Available devices:");
        for (i, device) in devices.iter().enumerate() {
            let _ = writeln!(self.output, "#{}: {}", i, device);
        }
    }

    fn select_device(&mut self, _devices: &[DeviceSerial]) -> Option<usize> {
        self.prompt("\nSelect device by ID #")?.parse().ok()
    }

    fn confirm_fallback(&mut self) -> bool {
        let answer =
            self.prompt("Error connecting to Unicorn. Stream recorded data instead? Y/N: ");
        matches!(answer.as_deref().and_then(|a| a.chars().next()), Some('y' | 'Y'))
    }

    fn progress_tick(&mut self) {
        let _ = write!(self.output, ".");
        let _ = self.output.flush();
    }

    fn message(&mut self, text: &str) {
        let _ = writeln!(self.output, "{}", text);
    }

    fn wait_for_exit(&mut self) {
        self.prompt("\nPress ENTER to terminate the application.");
    }
}
