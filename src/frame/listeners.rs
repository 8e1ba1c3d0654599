use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::config::{ActionCallback, ActionInvocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<(ListenerId, ActionCallback)>,
}

/// Page-wide subscribers to custom actions, notified in registration order.
#[derive(Clone, Default)]
pub struct ActionListeners {
    table: Rc<RefCell<ListenerTable>>,
}

impl ActionListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        listener: impl Fn(&ActionInvocation<'_>) -> anyhow::Result<()> + 'static,
    ) -> ListenerId {
        let mut table = self.table.borrow_mut();
        table.next_id += 1;
        let id = ListenerId(table.next_id);
        table.entries.push((id, Rc::new(listener)));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut table = self.table.borrow_mut();
        let before = table.entries.len();
        table.entries.retain(|(entry, _)| *entry != id);
        table.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.table.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops at the first listener that fails.
    pub fn notify(&self, invocation: &ActionInvocation<'_>) -> anyhow::Result<()> {
        let listeners: Vec<ActionCallback> = self
            .table
            .borrow()
            .entries
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(invocation)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ActionListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionListeners")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Options, PageDefaults};
    use kuchiki::NodeRef;
    use std::cell::RefCell;

    #[test]
    fn notifies_in_order_and_stops_on_error() {
        let listeners = ActionListeners::new();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&calls);
        listeners.add(move |invocation| {
            log.borrow_mut().push(format!("first:{}", invocation.action));
            Ok(())
        });
        listeners.add(|_| anyhow::bail!("nope"));
        let log = Rc::clone(&calls);
        listeners.add(move |_| {
            log.borrow_mut().push("third".to_string());
            Ok(())
        });

        let config = resolve(&Options::new(), None, &PageDefaults::empty());
        let frame = NodeRef::new_text("");
        let invocation = ActionInvocation {
            action: "zebra",
            code: "",
            frame: &frame,
            config: &config,
        };
        assert!(listeners.notify(&invocation).is_err());
        assert_eq!(*calls.borrow(), vec!["first:zebra".to_string()]);
    }

    #[test]
    fn removes_listeners() {
        let listeners = ActionListeners::new();
        let id = listeners.add(|_| Ok(()));
        assert_eq!(listeners.len(), 1);
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert!(listeners.is_empty());
    }
}
