//! Write batches for conditional commits.

/// A single write command inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Removes a key of any type.
    Del {
        /// Key to remove.
        key: String,
    },
    /// Sets one field of a hash, creating the hash if needed.
    HSet {
        /// Hash key.
        key: String,
        /// Field within the hash.
        field: String,
        /// New field value.
        value: Vec<u8>,
    },
    /// Sets a string value.
    Set {
        /// Key to set.
        key: String,
        /// New value.
        value: Vec<u8>,
    },
}

impl Command {
    /// Returns the key this command modifies.
    pub fn key(&self) -> &str {
        match self {
            Command::Del { key } | Command::HSet { key, .. } | Command::Set { key, .. } => key,
        }
    }
}

/// An ordered batch of writes applied all-or-nothing.
///
/// Building a transaction performs no I/O. It is submitted with
/// [`Connection::exec`](crate::Connection::exec).
///
/// ```rust
/// use flagstore_storage::Transaction;
///
/// let mut tx = Transaction::new();
/// tx.del("app:features").hset("app:features", "flag-a", b"{}".to_vec());
/// assert_eq!(tx.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    /// Creates an empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a key removal.
    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Del { key: key.into() });
        self
    }

    /// Queues a hash field write.
    pub fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: Vec<u8>,
    ) -> &mut Self {
        self.commands.push(Command::HSet {
            key: key.into(),
            field: field.into(),
            value,
        });
        self
    }

    /// Queues a string write.
    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) -> &mut Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value,
        });
        self
    }

    /// Returns the queued commands in submission order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Consumes the transaction, returning its commands.
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    /// Returns the number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Result of submitting a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Every command was applied.
    Committed,
    /// A watched key changed since it was watched; nothing was applied.
    Aborted,
}

impl CommitOutcome {
    /// Returns true if the transaction was applied.
    pub fn is_committed(self) -> bool {
        self == CommitOutcome::Committed
    }
}
