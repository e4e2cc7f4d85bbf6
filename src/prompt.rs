use crate::credential::Secret;
use crate::error::{Error, Result};
use crossterm::event::{read, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{stdin, stdout, IsTerminal, Write};

/// Operator interaction. Workflows take this as a parameter so tests can
/// answer scripted.
pub trait Prompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool>;

    /// Read a secret without echoing it.
    fn secret(&self, label: &str) -> Result<Secret>;
}

/// Check if running in interactive TTY
pub fn is_interactive() -> bool {
    if std::env::var_os("SVCP_NON_INTERACTIVE").is_some() {
        return false;
    }
    stdin().is_terminal() && stdout().is_terminal()
}

/// The prompter for this process: the terminal when interactive, defaults otherwise.
pub fn prompter() -> Box<dyn Prompter> {
    if is_interactive() {
        Box::new(TerminalPrompter)
    } else {
        Box::new(NonInteractivePrompter)
    }
}

pub struct TerminalPrompter;

/// Leaves raw mode when dropped, including on early return.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        print!("{} {} ", question, hint);
        stdout().flush()?;

        let answer = {
            let _raw = RawMode::enable()?;
            loop {
                if let Event::Key(key) = read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if is_interrupt(&key) {
                        break None;
                    }
                    match key.code {
                        KeyCode::Char('y') | KeyCode::Char('Y') => break Some(true),
                        KeyCode::Char('n') | KeyCode::Char('N') => break Some(false),
                        KeyCode::Enter => break Some(default),
                        _ => {}
                    }
                }
            }
        };

        match answer {
            Some(yes) => {
                println!("{}", if yes { "y" } else { "n" });
                Ok(yes)
            }
            None => {
                println!();
                Err(Error::Aborted)
            }
        }
    }

    fn secret(&self, label: &str) -> Result<Secret> {
        print!("{}: ", label);
        stdout().flush()?;

        let mut value = String::new();
        let outcome = {
            let _raw = RawMode::enable()?;
            loop {
                if let Event::Key(key) = read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if is_interrupt(&key) {
                        break Err(Error::Aborted);
                    }
                    match key.code {
                        KeyCode::Enter => break Ok(()),
                        KeyCode::Backspace => {
                            value.pop();
                        }
                        KeyCode::Char(c) => value.push(c),
                        _ => {}
                    }
                }
            }
        };
        println!();
        outcome?;

        if value.is_empty() {
            return Err(Error::Validation(format!("{} cannot be empty", label)));
        }
        Ok(Secret::new(value))
    }
}

/// Takes every default and refuses to read secrets.
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        tracing::debug!("Non-interactive: '{}' -> {}", question, default);
        Ok(default)
    }

    fn secret(&self, label: &str) -> Result<Secret> {
        Err(Error::NonInteractive(label.to_string()))
    }
}
