//! Console notifier — prints the digest to stdout when no messaging
//! channel is configured.

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::pipeline::types::Notifier;

#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        println!("\n{text}\n");
        Ok(())
    }
}
