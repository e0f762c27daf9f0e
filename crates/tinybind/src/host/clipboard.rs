use alloc::string::String;

use crate::HostError;

/// The system clipboard, text only
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    allowed: bool,
    text: Option<String>,
}

impl Clipboard {
    /// A clipboard that rejects writes unless `allowed`
    pub fn new(allowed: bool) -> Self {
        Self { allowed, text: None }
    }

    pub fn write_text(&mut self, text: &str) -> Result<(), HostError> {
        if !self.allowed {
            return Err(HostError::not_allowed("clipboard write denied"));
        }
        self.text = Some(text.into());
        Ok(())
    }

    pub fn read_text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_allowed(&mut self, allowed: bool) {
        self.allowed = allowed;
    }
}
