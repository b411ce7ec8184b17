//! Filter operator.

use crate::change::Change;
use crate::node::Node;
use crate::operator::{
    output_to, FetchMode, FetchRequest, Input, Output, OutputSlot, RowPredicate, SourceSchema,
};
use alloc::rc::Rc;

/// Passes through nodes whose row satisfies a predicate.
///
/// An edit that moves a row across the predicate boundary becomes a remove
/// or an add.
pub struct Filter {
    input: Rc<dyn Input>,
    predicate: RowPredicate,
    output: OutputSlot,
}

impl Filter {
    pub fn new(input: Rc<dyn Input>, predicate: RowPredicate) -> Rc<Self> {
        let filter = Rc::new(Self {
            input,
            predicate,
            output: OutputSlot::default(),
        });
        filter.input.set_output(output_to(&filter, Filter::push));
        filter
    }

    fn push(&self, change: Change) {
        match change {
            Change::Add(_) | Change::Remove(_) | Change::Child { .. } => {
                if (self.predicate)(change.row()) {
                    self.output.push(change);
                }
            }
            Change::Edit { old, new } => {
                match ((self.predicate)(&old.row), (self.predicate)(&new.row)) {
                    (true, true) => self.output.push(Change::Edit { old, new }),
                    (true, false) => self.output.push(Change::Remove(old)),
                    (false, true) => self.output.push(Change::Add(new)),
                    (false, false) => {}
                }
            }
        }
    }
}

impl Input for Filter {
    fn schema(&self) -> &SourceSchema {
        self.input.schema()
    }

    fn set_output(&self, output: Rc<dyn Output>) {
        self.output.set(output);
    }

    fn scan(&self, mode: FetchMode, req: &FetchRequest, visit: &mut dyn FnMut(Node) -> bool) {
        self.input.scan(mode, req, &mut |node| {
            if (self.predicate)(&node.row) {
                visit(node)
            } else {
                true
            }
        });
    }

    fn destroy(&self) {
        self.input.destroy();
    }
}
