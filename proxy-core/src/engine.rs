//! Drives every outstanding [`Action`] one step per tick (spec §4.7).
use crate::action::Action;
use crate::status::Status;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Engine {
    created: Vec<Rc<RefCell<Action>>>,
    pending: Vec<Rc<RefCell<Action>>>,
}

impl Engine {
    pub fn new() -> Engine {
        Engine {
            created: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Queues a freshly constructed action to be `call`ed on the next step.
    pub fn add_action(&mut self, action: Rc<RefCell<Action>>) {
        self.created.push(action);
    }

    /// First resolves every pending action that a notification has moved to
    /// `waiting`, re-queuing failed+repeatable ones ; then calls every
    /// freshly created action, routing the result to `pending` or back to
    /// the next `created` batch.
    pub fn step(&mut self) {
        let mut next_created = Vec::new();
        let mut still_pending = Vec::new();

        for action in self.pending.drain(..) {
            let status = action.borrow().status();
            if status == Status::Waiting {
                action.borrow_mut().reset();
                let status = action.borrow().status();
                match status {
                    Status::Failed if action.borrow().repeat() => {
                        action.borrow_mut().reset();
                        next_created.push(action);
                    }
                    _ => {}
                }
            } else {
                still_pending.push(action);
            }
        }
        self.pending = still_pending;

        for action in self.created.drain(..) {
            action.borrow_mut().call();
            let status = action.borrow().status();
            match status {
                Status::Pending => self.pending.push(action),
                Status::Failed if action.borrow().repeat() => {
                    action.borrow_mut().reset();
                    next_created.push(action);
                }
                _ => {}
            }
        }
        self.created = next_created;
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn failed_repeatable_action_is_requeued_for_next_created_batch() {
        let mut engine = Engine::new();
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let action = Action::new(
            move || calls_clone.set(calls_clone.get() + 1),
            || false,
            None,
            true,
        );
        engine.add_action(action.clone());

        engine.step();
        assert_eq!(action.borrow().status(), Status::Created);
        assert_eq!(calls.get(), 1);

        engine.step();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn successful_non_repeating_action_is_dropped_after_one_step() {
        let mut engine = Engine::new();
        let action = Action::new(|| {}, || true, None, false);
        engine.add_action(action.clone());

        engine.step();
        assert_eq!(action.borrow().status(), Status::Successful);

        engine.step();
        assert_eq!(action.borrow().status(), Status::Successful, "not called again");
    }
}
