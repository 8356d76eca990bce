//! Port-mapped I/O routing
//!
//! The host bus delivers register accesses as reads and writes on an
//! 8-bit port address space. Each sound chip binds the ports its
//! hardware decodes; the bus dispatches accesses to the bound handler.
//! Unbound ports read as all-ones, matching the pull-ups on the real
//! bus. The table is an owned object handed to each chip at
//! construction, not a process-wide registry.

use crate::{EngineError, Result};
use bitflags::bitflags;
use log::debug;
use parking_lot::RwLock;
use std::sync::Arc;

/// Number of addressable ports
const PORT_COUNT: usize = 256;

bitflags! {
    /// Access directions a port binding supports
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PortProps: u8 {
        /// Reads are dispatched to the handler
        const READ = 0b01;
        /// Writes are dispatched to the handler
        const WRITE = 0b10;
    }
}

/// Device-side endpoint of one or more port bindings
///
/// The default implementations model a device that ignores the access:
/// reads float high, writes are dropped.
pub trait PortHandler: Send + Sync {
    /// Handle a read from `port`
    fn read(&self, _port: u8) -> u8 {
        0xff
    }

    /// Handle a write of `value` to `port`
    fn write(&self, _port: u8, _value: u8) {}
}

/// Observer notified when ports are bound or released
///
/// The host uses this to keep its bus-side decode configuration (which
/// accesses get forwarded at all) in step with the handler table.
pub trait PortObserver: Send + Sync {
    /// `port` was bound with the given access directions
    fn port_bound(&self, port: u8, props: PortProps);

    /// `port` was released
    fn port_released(&self, port: u8);
}

struct PortEntry {
    props: PortProps,
    handler: Arc<dyn PortHandler>,
}

/// The port routing table
pub struct IoPortBus {
    table: RwLock<Vec<Option<PortEntry>>>,
    observer: RwLock<Option<Arc<dyn PortObserver>>>,
}

impl IoPortBus {
    /// Create an empty bus
    pub fn new() -> Arc<Self> {
        let mut table = Vec::with_capacity(PORT_COUNT);
        table.resize_with(PORT_COUNT, || None);
        Arc::new(Self {
            table: RwLock::new(table),
            observer: RwLock::new(None),
        })
    }

    /// Attach the bind/release observer
    pub fn set_observer(&self, observer: Arc<dyn PortObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Bind `handler` to `port` for the given access directions
    ///
    /// Fails with [`EngineError::PortInUse`] if the port is already
    /// bound; hardware cannot share a port decode.
    pub fn register(&self, port: u8, props: PortProps, handler: Arc<dyn PortHandler>) -> Result<()> {
        let mut table = self.table.write();
        let slot = &mut table[port as usize];
        if slot.is_some() {
            return Err(EngineError::PortInUse { port });
        }
        *slot = Some(PortEntry { props, handler });
        drop(table);

        debug!("io port {port:#04x} bound ({props:?})");
        if let Some(observer) = self.observer.read().as_ref() {
            observer.port_bound(port, props);
        }
        Ok(())
    }

    /// Release `port`; no-op if it was not bound
    pub fn unregister(&self, port: u8) {
        let released = self.table.write()[port as usize].take().is_some();
        if released {
            debug!("io port {port:#04x} released");
            if let Some(observer) = self.observer.read().as_ref() {
                observer.port_released(port);
            }
        }
    }

    /// Release every port
    pub fn reset(&self) {
        for port in 0..PORT_COUNT {
            self.unregister(port as u8);
        }
    }

    /// Dispatch a read; unbound or write-only ports return 0xff
    pub fn read(&self, port: u8) -> u8 {
        let handler = {
            let table = self.table.read();
            match &table[port as usize] {
                Some(entry) if entry.props.contains(PortProps::READ) => {
                    Arc::clone(&entry.handler)
                }
                _ => return 0xff,
            }
        };
        handler.read(port)
    }

    /// Dispatch a write; dropped for unbound or read-only ports
    pub fn write(&self, port: u8, value: u8) {
        let handler = {
            let table = self.table.read();
            match &table[port as usize] {
                Some(entry) if entry.props.contains(PortProps::WRITE) => {
                    Arc::clone(&entry.handler)
                }
                _ => return,
            }
        };
        handler.write(port, value);
    }
}
