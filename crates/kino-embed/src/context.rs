//! Shared embed context
//!
//! Holds the state every embed on a page shares: the preconnect ledger, the
//! instance counter and the host collaborators. The application builds one
//! context at startup and hands a clone of the `Rc` to every bridge.

use crate::hints::ConnectionHinter;
use crate::host::{EmbedHost, FrameFactory, MessageChannel};
use crate::types::InstanceId;
use crate::viewport::ViewportGate;
use std::cell::Cell;
use std::rc::Rc;

pub struct EmbedContext {
    hinter: ConnectionHinter,
    gate: ViewportGate,
    frames: Rc<dyn FrameFactory>,
    messages: Rc<dyn MessageChannel>,
    last_id: Cell<u64>,
}

impl EmbedContext {
    /// Create a context backed by `host`
    pub fn new<H: EmbedHost + 'static>(host: Rc<H>) -> Rc<Self> {
        Rc::new(Self {
            hinter: ConnectionHinter::new(host.clone()),
            gate: ViewportGate::new(host.clone()),
            frames: host.clone(),
            messages: host,
            last_id: Cell::new(0),
        })
    }

    /// Allocate the next instance id (starting at 1)
    pub fn next_instance_id(&self) -> InstanceId {
        let id = self.last_id.get() + 1;
        self.last_id.set(id);
        InstanceId(id)
    }

    pub fn hinter(&self) -> &ConnectionHinter {
        &self.hinter
    }

    pub fn gate(&self) -> &ViewportGate {
        &self.gate
    }

    pub fn frames(&self) -> &dyn FrameFactory {
        self.frames.as_ref()
    }

    pub fn messages(&self) -> &dyn MessageChannel {
        self.messages.as_ref()
    }
}

impl std::fmt::Debug for EmbedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedContext")
            .field("hinter", &self.hinter)
            .field("instances", &self.last_id.get())
            .finish()
    }
}
