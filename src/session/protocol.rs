//! Single-character command protocol.
//!
//! Every received byte is looked up in [`COMMAND_TABLE`]; a match runs the
//! row's handler, anything else is ignored without a reply.
//!
//! ```text
//! ┌──────┬──────────┬──────────────────────────────────────┬──────────┐
//! │ key  │ command  │ store session                         │ flow     │
//! ├──────┼──────────┼──────────────────────────────────────┼──────────┤
//! │ 'M'  │ Menu     │ ended                                 │ Continue │
//! │ 'D'  │ Dir      │ mounted, ended                        │ Continue │
//! │ 'S'  │ Size     │ mounted, ended                        │ Continue │
//! │ 'R'  │ Read     │ mounted, left open                    │ Continue │
//! │ 'X'  │ Delete   │ mounted, ended                        │ Continue │
//! │ 'Z'  │ Shutdown │ ended, then deep sleep                │ Shutdown │
//! └──────┴──────────┴──────────────────────────────────────┴──────────┘
//! ```
//!
//! Read is the one command that leaves the store mounted after it runs.
//! The next command that mounts finds it already mounted and proceeds; the
//! next command that ends its session unmounts it.

use core::ops::ControlFlow;

use log::{debug, warn};

use crate::app::ports::{Connection, LogStorePort, StoreError};

/// Commands a remote client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Menu,
    Dir,
    Size,
    Read,
    Delete,
    Shutdown,
}

/// What the session does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Power down; the session loop must not poll again.
    Shutdown,
}

/// Everything a handler may touch. Built per dispatched byte.
pub struct CommandContext<'a> {
    pub store: &'a mut dyn LogStorePort,
    pub client: &'a mut dyn Connection,
    pub log_path: &'a str,
    /// Called once per streamed line so a long dump keeps the task
    /// watchdog fed.
    pub keepalive: &'a mut dyn FnMut(),
}

/// Handler signature: one row's behaviour.
pub type CommandHandler = fn(&mut CommandContext<'_>) -> Flow;

/// One row of the dispatch table.
pub struct CommandDescriptor {
    pub key: u8,
    pub command: Command,
    pub name: &'static str,
    pub handler: CommandHandler,
}

/// Byte → behaviour. Keys are unique; lookup order does not matter.
pub const COMMAND_TABLE: [CommandDescriptor; 6] = [
    CommandDescriptor {
        key: b'M',
        command: Command::Menu,
        name: "Menu",
        handler: handle_menu,
    },
    CommandDescriptor {
        key: b'D',
        command: Command::Dir,
        name: "Dir",
        handler: handle_dir,
    },
    CommandDescriptor {
        key: b'S',
        command: Command::Size,
        name: "Size",
        handler: handle_size,
    },
    CommandDescriptor {
        key: b'R',
        command: Command::Read,
        name: "Read",
        handler: handle_read,
    },
    CommandDescriptor {
        key: b'X',
        command: Command::Delete,
        name: "Del",
        handler: handle_delete,
    },
    CommandDescriptor {
        key: b'Z',
        command: Command::Shutdown,
        name: "Done",
        handler: handle_shutdown,
    },
];

/// Help text sent for `M`.
pub const MENU_TEXT: [&str; 10] = [
    "Welcome to Idahostreams Data Collection",
    "    ....   Button Commands   ....",
    "",
    "Menu - Displays the menu options",
    "Dir  - Displays files in data directory",
    "Size - Displays file size of datatempC.txt",
    "Read - Displays datatempC.txt for saving",
    "Del  - Permanently deletes datatempC.txt",
    "Done - WiFi communication is shut down",
    "",
];

pub const MOUNT_FAILED: &str = "Failed to mount log store";
pub const DELETED: &str = "... Existing file deleted ...";
pub const NO_PRIOR_FILE: &str = "... No prior file exists ...";
pub const FAREWELL: [&str; 2] = [" ... Entering deep sleep now ...", "        ... good night ..."];

/// Find the table row for `byte`. Case-sensitive.
pub fn lookup(byte: u8) -> Option<&'static CommandDescriptor> {
    COMMAND_TABLE.iter().find(|d| d.key == byte)
}

/// Run the command for `byte`, if any. Unknown bytes return `None` and
/// produce no output.
pub fn dispatch(byte: u8, ctx: &mut CommandContext<'_>) -> Option<(Command, Flow)> {
    let descriptor = lookup(byte)?;
    debug!("Command '{}' ({})", byte as char, descriptor.name);
    let flow = (descriptor.handler)(ctx);
    Some((descriptor.command, flow))
}

// ───────────────────────────────────────────────────────────────
// Handlers
// ───────────────────────────────────────────────────────────────

/// Write errors are not fatal here: a vanished client is detected by the
/// session on its next poll.
fn say(client: &mut dyn Connection, line: &str) {
    if let Err(e) = client.write_line(line) {
        debug!("Client write dropped: {}", e);
    }
}

fn handle_menu(ctx: &mut CommandContext<'_>) -> Flow {
    for line in MENU_TEXT {
        say(ctx.client, line);
    }
    ctx.store.unmount();
    Flow::Continue
}

fn handle_dir(ctx: &mut CommandContext<'_>) -> Flow {
    say(ctx.client, "Directory contents are:");
    if ctx.store.mount(false).is_err() {
        say(ctx.client, MOUNT_FAILED);
        return Flow::Continue;
    }
    match ctx.store.list_entries() {
        Ok(entries) => {
            for entry in &entries {
                say(ctx.client, &entry.name);
            }
        }
        Err(e) => say(ctx.client, &format!("Directory listing failed: {e}")),
    }
    ctx.store.unmount();
    Flow::Continue
}

fn handle_size(ctx: &mut CommandContext<'_>) -> Flow {
    say(ctx.client, "File sizes are:");
    if ctx.store.mount(false).is_err() {
        say(ctx.client, MOUNT_FAILED);
        return Flow::Continue;
    }
    match ctx.store.list_entries() {
        Ok(entries) => {
            for entry in &entries {
                say(ctx.client, &format!("{} ,  {}", entry.name, entry.size));
            }
        }
        Err(e) => say(ctx.client, &format!("Directory listing failed: {e}")),
    }
    ctx.store.unmount();
    Flow::Continue
}

fn handle_read(ctx: &mut CommandContext<'_>) -> Flow {
    say(ctx.client, "... The file will be printed to screen now ...");
    say(ctx.client, "");
    if ctx.store.mount(false).is_err() {
        say(ctx.client, "... Log store mount failed ...");
        return Flow::Continue;
    }
    let log_path = ctx.log_path;
    let client = &mut *ctx.client;
    let keepalive = &mut *ctx.keepalive;
    // A client that stops accepting data ends the dump; the session
    // notices the dead peer on its next poll.
    let result = ctx.store.read_lines(log_path, &mut |line| {
        keepalive();
        match client.write_line(line) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                warn!("Read aborted, client write failed: {}", e);
                ControlFlow::Break(())
            }
        }
    });
    match result {
        Ok(_) => {}
        Err(StoreError::OpenFailed) => say(client, "File open failed.."),
        Err(e) => say(client, &format!("File read failed: {e}")),
    }
    // The store stays mounted after a read.
    Flow::Continue
}

fn handle_delete(ctx: &mut CommandContext<'_>) -> Flow {
    if ctx.store.mount(false).is_err() {
        say(ctx.client, MOUNT_FAILED);
        return Flow::Continue;
    }
    if ctx.store.exists(ctx.log_path) {
        match ctx.store.remove(ctx.log_path) {
            Ok(true) => say(ctx.client, DELETED),
            Ok(false) => say(ctx.client, NO_PRIOR_FILE),
            Err(e) => say(ctx.client, &format!("... Delete failed: {e} ...")),
        }
    } else {
        say(ctx.client, NO_PRIOR_FILE);
    }
    ctx.store.unmount();
    Flow::Continue
}

fn handle_shutdown(ctx: &mut CommandContext<'_>) -> Flow {
    for line in FAREWELL {
        say(ctx.client, line);
    }
    ctx.store.unmount();
    Flow::Shutdown
}
