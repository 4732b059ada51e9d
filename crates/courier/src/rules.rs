//! The rule table: ordered (filter, handler) entries scanned on every
//! incoming message.
//!
//! Scan-then-launch: the table lock is held only while matching entries are
//! selected and `once` bookkeeping is updated; handlers always run outside
//! the lock, as detached tasks spawned by the session that owns the table.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use courier_wire::{Message, MessageId};

use crate::Handler;

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One dispatch rule: filters paired with a handler and a one-shot flag.
///
/// Every `None` filter is a wildcard; a rule with all filters empty matches
/// every message. A `once` rule flips `fired` on its first match and is
/// skipped from then on — the entry itself stays in the table.
pub(crate) struct Rule {
    handler: Arc<dyn Handler>,
    once: bool,
    fired: bool,
    id_filter: Option<MessageId>,
    name_filter: Option<String>,
    author_filter: Option<String>,
}

impl Rule {
    pub(crate) fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            once: false,
            fired: false,
            id_filter: None,
            name_filter: None,
            author_filter: None,
        }
    }

    /// Marks the rule one-shot.
    pub(crate) fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Filters on the message id, compared byte-for-byte.
    pub(crate) fn for_id(mut self, id: MessageId) -> Self {
        self.id_filter = Some(id);
        self
    }

    /// Filters on the message name. The empty string is the wildcard.
    pub(crate) fn for_name(mut self, name: &str) -> Self {
        self.name_filter = filter(name);
        self
    }

    /// Filters on the registered name of the sending client (server side).
    /// The empty string is the wildcard.
    pub(crate) fn for_author(mut self, author: &str) -> Self {
        self.author_filter = filter(author);
        self
    }

    /// Whether this rule matches `msg`, given the sender's registered name
    /// as resolved by the caller (`None` when the author is unknown).
    fn matches(&self, msg: &Message, author_name: Option<&str>) -> bool {
        if let Some(id) = &self.id_filter {
            if *id != msg.id {
                return false;
            }
        }
        if let Some(name) = &self.name_filter {
            if name != &msg.name {
                return false;
            }
        }
        if let Some(author) = &self.author_filter {
            // An unresolvable author never matches a filtered rule.
            if author_name != Some(author.as_str()) {
                return false;
            }
        }
        true
    }
}

fn filter(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Append-only, lock-guarded, insertion-ordered rule collection shared by
/// one session and its reader loop.
#[derive(Default)]
pub(crate) struct RuleTable {
    rules: Mutex<Vec<Rule>>,
}

impl RuleTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, rule: Rule) {
        lock(&self.rules).push(rule);
    }

    /// Selects the handlers of every rule matching `msg`, in insertion
    /// order. `once` rules are claimed under the lock: of any number of
    /// concurrent scans, exactly one receives a given one-shot handler.
    pub(crate) fn matching(
        &self,
        msg: &Message,
        author_name: Option<&str>,
    ) -> Vec<Arc<dyn Handler>> {
        let mut rules = lock(&self.rules);
        let mut selected = Vec::new();
        for rule in rules.iter_mut() {
            if !rule.matches(msg, author_name) {
                continue;
            }
            if rule.once {
                if rule.fired {
                    continue;
                }
                rule.fired = true;
            }
            selected.push(Arc::clone(&rule.handler));
        }
        selected
    }
}
