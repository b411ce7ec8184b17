//! Test instrumentation for operator pipelines.
//!
//! - [`Catch`]: a terminal output that records every push and exposes the
//!   pull side as plain `Vec`s.
//! - [`Snitch`]: a pass-through operator that logs every scan and push it
//!   sees into a shared [`SnitchLog`], so tests can assert on call order.

use crate::change::Change;
use crate::node::Node;
use crate::operator::{output_to, FetchMode, FetchRequest, Input, Output, OutputSlot, SourceSchema};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

/// Records pushes arriving at the end of a pipeline.
pub struct Catch {
    input: Rc<dyn Input>,
    pushes: RefCell<Vec<Change>>,
}

impl Catch {
    pub fn new(input: Rc<dyn Input>) -> Rc<Self> {
        let catch = Rc::new(Self {
            input,
            pushes: RefCell::new(Vec::new()),
        });
        catch.input.set_output(output_to(&catch, Catch::record));
        catch
    }

    fn record(&self, change: Change) {
        self.pushes.borrow_mut().push(change);
    }

    pub fn fetch(&self) -> Vec<Node> {
        self.input.fetch(&FetchRequest::all())
    }

    pub fn fetch_with(&self, req: &FetchRequest) -> Vec<Node> {
        self.input.fetch(req)
    }

    pub fn hydrate(&self) -> Vec<Node> {
        self.input.hydrate(&FetchRequest::all())
    }

    pub fn cleanup(&self) -> Vec<Node> {
        self.input.cleanup(&FetchRequest::all())
    }

    /// Drains the recorded pushes.
    pub fn take_pushes(&self) -> Vec<Change> {
        core::mem::take(&mut *self.pushes.borrow_mut())
    }
}

/// One logged call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnitchMessage {
    Scan {
        name: String,
        mode: FetchMode,
        req: FetchRequest,
    },
    Push {
        name: String,
        change: Change,
    },
}

impl SnitchMessage {
    /// Returns the mode of a scan message.
    pub fn mode(&self) -> Option<FetchMode> {
        match self {
            SnitchMessage::Scan { mode, .. } => Some(*mode),
            SnitchMessage::Push { .. } => None,
        }
    }
}

/// A log shared by several snitches.
pub type SnitchLog = Rc<RefCell<Vec<SnitchMessage>>>;

/// Logs calls passing through it.
pub struct Snitch {
    input: Rc<dyn Input>,
    name: String,
    log: SnitchLog,
    output: OutputSlot,
}

impl Snitch {
    pub fn new(input: Rc<dyn Input>, name: impl Into<String>, log: SnitchLog) -> Rc<Self> {
        let snitch = Rc::new(Self {
            input,
            name: name.into(),
            log,
            output: OutputSlot::default(),
        });
        snitch.input.set_output(output_to(&snitch, Snitch::forward));
        snitch
    }

    fn forward(&self, change: Change) {
        self.log.borrow_mut().push(SnitchMessage::Push {
            name: self.name.clone(),
            change: change.clone(),
        });
        self.output.push(change);
    }
}

impl Input for Snitch {
    fn schema(&self) -> &SourceSchema {
        self.input.schema()
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        self.output.set(output);
    }

    fn scan(&self, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        self.log.borrow_mut().push(SnitchMessage::Scan {
            name: self.name.clone(),
            mode,
            req: req.clone(),
        });
        self.input.scan(mode, req, visit);
    }

    fn destroy(&self) {
        self.input.destroy();
    }
}
