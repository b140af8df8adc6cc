//! Mock reactor used by unit tests

use std::cell::{Cell, RefCell};
use std::os::unix::io::RawFd;
use std::rc::Rc;

use adapters_reactor::{Reactor, ReactorError, Readiness, ReadinessHandler, Registration};
use mockall::mock;

mock! {
    pub Reactor {}

    impl Reactor for Reactor {
        fn add_file_descriptor(
            &self,
            fd: RawFd,
            handler: ReadinessHandler,
        ) -> Result<Registration, ReactorError>;
        fn set_file_descriptor_events(&self, registration: Registration, interest: Readiness);
        fn remove_file_descriptor(&self, registration: Registration);
    }
}

const TOKEN: u64 = 7;

/// A mock reactor that accepts exactly one registration, records every
/// interest set pushed to it, and lets the test fire readiness by hand.
pub(crate) struct MockHarness {
    pub(crate) reactor: Rc<dyn Reactor>,
    pub(crate) removed: Rc<Cell<bool>>,
    handler: Rc<RefCell<Option<ReadinessHandler>>>,
    pushes: Rc<RefCell<Vec<Readiness>>>,
}

impl MockHarness {
    pub(crate) fn new() -> Self {
        let handler = Rc::new(RefCell::new(None));
        let pushes = Rc::new(RefCell::new(Vec::new()));
        let removed = Rc::new(Cell::new(false));

        let mut mock = MockReactor::new();
        let slot = handler.clone();
        mock.expect_add_file_descriptor()
            .times(1)
            .returning_st(move |_, callback| {
                *slot.borrow_mut() = Some(callback);
                Ok(Registration::new(TOKEN))
            });
        let log = pushes.clone();
        mock.expect_set_file_descriptor_events()
            .withf(|registration, _| *registration == Registration::new(TOKEN))
            .returning_st(move |_, interest| log.borrow_mut().push(interest));
        let flag = removed.clone();
        mock.expect_remove_file_descriptor()
            .withf(|registration| *registration == Registration::new(TOKEN))
            .times(1)
            .returning_st(move |_| flag.set(true));

        Self {
            reactor: Rc::new(mock),
            removed,
            handler,
            pushes,
        }
    }

    /// Interest sets pushed so far, oldest first
    pub(crate) fn pushes(&self) -> Vec<Readiness> {
        self.pushes.borrow().clone()
    }

    /// Invoke the registered readiness callback
    pub(crate) fn fire(&self, ready: Readiness) {
        let mut callback = self
            .handler
            .borrow_mut()
            .take()
            .expect("a socket registered with the mock reactor");
        callback(ready);
        *self.handler.borrow_mut() = Some(callback);
    }
}
