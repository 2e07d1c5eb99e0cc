//! Interactive file browser shell.
//!
//! Reads one command per line, applies it to a [`FileBrowser`] and redraws
//! the table. Uploads started with `put` run in the background; their
//! progress is printed as it arrives.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::api::StorageBackend;
use crate::browser::{FileBrowser, UploadSource};
use crate::config::Config;
use crate::error::{CloudFmError, Result};
use crate::view::render;

/// How often background upload progress is checked while waiting for input.
const UPLOAD_POLL_INTERVAL: Duration = Duration::from_millis(250);

const PROMPT: &str = "cloudfm> ";

const HELP: &str = "\
Commands:
  ls                    show the file table
  refresh               reload the file list
  storage <local|memory>  switch storage backend
  search <text>         filter by name (case-insensitive)
  clear                 clear the search
  put <path>...         upload files in order (background)
  get <name> [dir]      download a file
  rm <name>             delete a file
  dismiss               hide the notification
  help                  show this help
  quit                  leave";

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Blank line.
    Empty,
    /// Redraw the table.
    List,
    /// Reload the file list.
    Refresh,
    /// Switch backend.
    Storage(StorageBackend),
    /// Set the search query.
    Search(String),
    /// Clear the search query.
    ClearSearch,
    /// Upload files.
    Put(Vec<PathBuf>),
    /// Download a file, optionally into a directory.
    Get {
        /// Server-side name.
        name: String,
        /// Destination directory.
        dir: Option<PathBuf>,
    },
    /// Delete a file (after confirmation).
    Remove(String),
    /// Hide the notification.
    Dismiss,
    /// Show help.
    Help,
    /// Leave the shell.
    Quit,
}

impl ShellCommand {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Self> {
        let args = split_args(line)?;
        let Some((command, rest)) = args.split_first() else {
            return Ok(ShellCommand::Empty);
        };

        match command.to_lowercase().as_str() {
            "ls" | "list" => Ok(ShellCommand::List),
            "r" | "refresh" => Ok(ShellCommand::Refresh),
            "storage" | "use" => match rest {
                [backend] => Ok(ShellCommand::Storage(backend.parse()?)),
                _ => Err(usage("storage <local|memory>")),
            },
            "search" | "find" => {
                let query = rest.join(" ");
                if query.trim().is_empty() {
                    Ok(ShellCommand::ClearSearch)
                } else {
                    Ok(ShellCommand::Search(query))
                }
            }
            "clear" => Ok(ShellCommand::ClearSearch),
            "put" | "upload" => {
                if rest.is_empty() {
                    return Err(usage("put <path>..."));
                }
                Ok(ShellCommand::Put(rest.iter().map(PathBuf::from).collect()))
            }
            "get" | "download" => match rest {
                [name] => Ok(ShellCommand::Get {
                    name: name.clone(),
                    dir: None,
                }),
                [name, dir] => Ok(ShellCommand::Get {
                    name: name.clone(),
                    dir: Some(PathBuf::from(dir)),
                }),
                _ => Err(usage("get <name> [dir]")),
            },
            "rm" | "del" | "delete" => match rest {
                [name] => Ok(ShellCommand::Remove(name.clone())),
                _ => Err(usage("rm <name>")),
            },
            "dismiss" => Ok(ShellCommand::Dismiss),
            "help" | "?" => Ok(ShellCommand::Help),
            "q" | "quit" | "exit" => Ok(ShellCommand::Quit),
            other => Err(CloudFmError::Validation(format!(
                "unknown command: {} (type help)",
                other
            ))),
        }
    }
}

fn usage(text: &str) -> CloudFmError {
    CloudFmError::Validation(format!("usage: {}", text))
}

/// Split a line into whitespace-separated arguments; `"..."` groups words.
fn split_args(line: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err(CloudFmError::Validation("unterminated quote".to_string()));
    }
    if has_token {
        args.push(current);
    }
    Ok(args)
}

/// Interactive session over arbitrary line input and text output.
pub struct Shell<'a, R, W> {
    browser: &'a mut FileBrowser,
    config: &'a Config,
    lines: Lines<R>,
    output: W,
}

impl<'a, R, W> Shell<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a shell driving `browser`.
    pub fn new(browser: &'a mut FileBrowser, config: &'a Config, input: R, output: W) -> Self {
        Self {
            browser,
            config,
            lines: input.lines(),
            output,
        }
    }

    /// Run until `quit` or end of input.
    ///
    /// Waits for a running upload batch before returning.
    pub async fn run(mut self) -> Result<()> {
        // A failed first load is already on screen as a notification.
        let _ = self.browser.refresh().await;
        self.draw().await?;

        loop {
            self.write(PROMPT).await?;

            let line = loop {
                tokio::select! {
                    line = self.lines.next_line() => break line?,
                    _ = tokio::time::sleep(UPLOAD_POLL_INTERVAL), if self.browser.is_uploading() => {
                        if self.browser.poll_uploads().await > 0 {
                            self.write_status().await?;
                            self.write(PROMPT).await?;
                        }
                    }
                }
            };

            let Some(line) = line else {
                self.write("\n").await?;
                break;
            };

            self.browser.poll_uploads().await;
            match ShellCommand::parse(&line) {
                Ok(ShellCommand::Quit) => break,
                Ok(command) => {
                    if self.execute(command).await? {
                        self.draw().await?;
                    }
                }
                Err(e) => self.write(&format!("{}\n", e)).await?,
            }
        }

        self.finish_uploads().await
    }

    /// Apply a command. Returns whether the table should be redrawn.
    async fn execute(&mut self, command: ShellCommand) -> Result<bool> {
        tracing::debug!("shell command: {:?}", command);
        match command {
            // Quit is handled by the read loop.
            ShellCommand::Empty | ShellCommand::Quit => Ok(false),
            ShellCommand::List => Ok(true),
            ShellCommand::Help => {
                self.write(&format!("{}\n", HELP)).await?;
                Ok(false)
            }
            ShellCommand::Refresh => {
                let _ = self.browser.refresh().await;
                Ok(true)
            }
            ShellCommand::Storage(backend) => {
                let _ = self.browser.set_storage(backend).await;
                Ok(true)
            }
            ShellCommand::Search(query) => {
                self.browser.search(query);
                Ok(true)
            }
            ShellCommand::ClearSearch => {
                self.browser.clear_search();
                Ok(true)
            }
            ShellCommand::Put(paths) => {
                let sources = paths.into_iter().map(UploadSource::from_path).collect();
                match self.browser.start_upload(sources) {
                    // The batch reports back through poll_uploads.
                    Ok(_handle) => {}
                    Err(CloudFmError::Busy) => {}
                    Err(e) => self.write(&format!("{}\n", e)).await?,
                }
                Ok(true)
            }
            ShellCommand::Get { name, dir } => {
                let dir = dir.unwrap_or_else(|| PathBuf::from(&self.config.download.directory));
                if let Ok(path) = self.browser.download(&name, &dir).await {
                    self.write(&format!("saved to {}\n", path.display())).await?;
                }
                Ok(true)
            }
            ShellCommand::Remove(name) => {
                if self.confirm(&format!("Delete {}? [y/N] ", name)).await? {
                    let _ = self.browser.delete(&name).await;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            ShellCommand::Dismiss => {
                self.browser.dismiss_notification();
                Ok(true)
            }
        }
    }

    async fn confirm(&mut self, question: &str) -> Result<bool> {
        self.write(question).await?;
        let answer = self.lines.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    async fn finish_uploads(&mut self) -> Result<()> {
        if self.browser.is_uploading() {
            self.write("waiting for uploads to finish...\n").await?;
        }
        let mut applied = 0;
        while self.browser.is_uploading() {
            tokio::time::sleep(UPLOAD_POLL_INTERVAL).await;
            applied += self.browser.poll_uploads().await;
        }
        applied += self.browser.poll_uploads().await;
        if applied > 0 {
            self.write_status().await?;
        }
        Ok(())
    }

    async fn draw(&mut self) -> Result<()> {
        let text = render(&self.browser.view(), &self.config.display);
        self.write(&format!("{}\n", text)).await
    }

    /// Print only the progress and notification lines.
    async fn write_status(&mut self) -> Result<()> {
        let mut text = String::from("\n");
        if let Some(progress) = self.browser.upload_progress() {
            text.push_str(&format!("[upload] {}\n", progress));
        }
        if let Some(note) = self.browser.notification() {
            text.push_str(&format!("[{}] {}\n", note.kind.label(), note.message));
        }
        self.write(&text).await
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}
