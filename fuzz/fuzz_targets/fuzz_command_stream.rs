//! Fuzz target: command protocol dispatch
//!
//! Feeds arbitrary client bytes through the dispatch table against an
//! in-memory log store and asserts that unknown bytes never answer and
//! that the store is released after a shutdown.
//!
//! cargo fuzz run fuzz_command_stream

#![no_main]

use std::ops::ControlFlow;

use libfuzzer_sys::fuzz_target;
use streamlogger::app::ports::{Connection, DirEntry, LogStorePort, StoreError, TransportError};
use streamlogger::session::protocol::{dispatch, lookup, CommandContext, Flow};

struct Wire(Vec<u8>);

impl Connection for Wire {
    fn is_connected(&mut self) -> bool {
        true
    }
    fn read_byte(&mut self) -> Option<u8> {
        None
    }
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.0.extend_from_slice(data);
        Ok(())
    }
    fn close(&mut self) {}
}

struct Store {
    log: Option<String>,
    mounted: bool,
}

impl LogStorePort for Store {
    fn mount(&mut self, _format_if_failed: bool) -> Result<(), StoreError> {
        self.mounted = true;
        Ok(())
    }
    fn unmount(&mut self) {
        self.mounted = false;
    }
    fn is_mounted(&self) -> bool {
        self.mounted
    }
    fn append(&mut self, _name: &str, text: &str) -> Result<(), StoreError> {
        self.log.get_or_insert_with(String::new).push_str(text);
        Ok(())
    }
    fn read_lines(
        &mut self,
        _name: &str,
        each: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<usize, StoreError> {
        let log = self.log.as_deref().ok_or(StoreError::OpenFailed)?;
        let mut n = 0;
        for line in log.lines() {
            n += 1;
            if each(line).is_break() {
                break;
            }
        }
        Ok(n)
    }
    fn list_entries(&mut self) -> Result<Vec<DirEntry>, StoreError> {
        Ok(self
            .log
            .iter()
            .map(|l| DirEntry {
                name: "datatempC.txt".into(),
                size: l.len() as u64,
            })
            .collect())
    }
    fn remove(&mut self, _name: &str) -> Result<bool, StoreError> {
        Ok(self.log.take().is_some())
    }
    fn exists(&self, _name: &str) -> bool {
        self.log.is_some()
    }
}

fuzz_target!(|data: &[u8]| {
    let mut store = Store {
        log: Some("... program release 1.0 ...\n".into()),
        mounted: false,
    };
    let mut wire = Wire(Vec::new());

    for &byte in data {
        let before = wire.0.len();
        let mut ctx = CommandContext {
            store: &mut store,
            client: &mut wire,
            log_path: "datatempC.txt",
            keepalive: &mut || {},
        };
        match dispatch(byte, &mut ctx) {
            None => {
                assert!(lookup(byte).is_none());
                assert_eq!(wire.0.len(), before, "unknown byte produced output");
            }
            Some((_, Flow::Shutdown)) => {
                assert!(!store.mounted, "store left mounted after shutdown");
                break;
            }
            Some(_) => assert!(wire.0.ends_with(b"\r\n")),
        }
    }
});
