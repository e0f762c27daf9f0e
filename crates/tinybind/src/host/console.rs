use alloc::{string::String, vec::Vec};

/// Severity of a console message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Log,
    Warn,
    Error,
}

/// Module console output, kept and forwarded to the `console` log target
#[derive(Debug, Default)]
pub struct Console {
    messages: Vec<(Level, String)>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, level: Level, message: impl Into<String>) {
        let message = message.into();
        match level {
            Level::Log => log::info!(target: "console", "{message}"),
            Level::Warn => log::warn!(target: "console", "{message}"),
            Level::Error => log::error!(target: "console", "{message}"),
        }
        self.messages.push((level, message));
    }

    pub fn messages(&self) -> &[(Level, String)] {
        &self.messages
    }

    /// Messages of one level, oldest first
    pub fn at(&self, level: Level) -> impl Iterator<Item = &str> {
        self.messages.iter().filter(move |(l, _)| *l == level).map(|(_, m)| m.as_str())
    }
}
