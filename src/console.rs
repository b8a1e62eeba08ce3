use std::io;
use tokio::io::{stdin, stdout, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::device::command::COMMANDS;
use crate::device::types::DiscoveredDevice;

/// Operator console: line based input, prompts and messages on the output.
pub struct Console<I, O> {
    input: I,
    output: O,
}

impl Console<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Console::new(BufReader::new(stdin()), stdout())
    }
}

impl<I: AsyncBufRead + Unpin, O: AsyncWrite + Unpin> Console<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Console { input, output }
    }

    pub async fn say(&mut self, message: &str) -> io::Result<()> {
        self.output.write_all(message.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }

    /// Prints `prompt` and reads one line. `None` means the input is closed.
    pub async fn prompt(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.output.write_all(prompt.as_bytes()).await?;
        self.output.flush().await?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }

        Ok(Some(line.trim().to_string()))
    }

    pub async fn print_menu(&mut self) -> io::Result<()> {
        let mut menu = String::from("\nAvailable commands:\n");
        for command in COMMANDS {
            menu.push_str(&format!("  {}: {}\n", command.name(), command.description()));
        }
        menu.push_str("  q: Quit");

        self.say(&menu).await
    }

    /// Lists `devices` and asks for a 1-based index until a valid one (or `q`) is entered.
    pub async fn choose_device(&mut self, devices: &[DiscoveredDevice]) -> io::Result<Option<usize>> {
        let mut listing = String::from("\nMultiple devices found:\n");
        for (index, device) in devices.iter().enumerate() {
            listing.push_str(&format!("  {}: {}\n", index + 1, device));
        }
        self.say(listing.trim_end()).await?;

        let prompt = format!("Select device [1-{}]: ", devices.len());
        loop {
            let line = match self.prompt(&prompt).await? {
                None => return Ok(None),
                Some(line) => line,
            };

            if line.eq_ignore_ascii_case("q") {
                return Ok(None);
            }

            match line.parse::<usize>() {
                Ok(choice) if (1..=devices.len()).contains(&choice) => return Ok(Some(choice - 1)),
                _ => self.say("Invalid selection").await?,
            }
        }
    }
}
