//! Parameterized command construction.
//!
//! Commands pair a query text with an ordered parameter list. The verb
//! constructors expand deterministically into `?`-placeholder queries
//! whose parameter order matches placeholder order left to right, so
//! every constructor upholds the invariant placeholder count ==
//! parameter count. Construction never touches the network.

use sqlitecloud_types::Value;

use crate::pubsub::Channel;

/// An immutable parameterized command.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Query text with `?` placeholders.
    pub query: String,
    /// Parameters in placeholder order.
    pub parameters: Vec<Value>,
}

impl Command {
    /// Build a command from raw query text and parameters.
    #[must_use]
    pub fn new(query: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            parameters,
        }
    }

    /// Switch the connection to a database.
    #[must_use]
    pub fn use_database(name: &str) -> Self {
        Self::new("USE DATABASE ?", vec![name.into()])
    }

    /// Fetch the current user name.
    #[must_use]
    pub fn get_user() -> Self {
        Self::new("GET USER", Vec::new())
    }

    /// Fetch the value stored under a server key.
    #[must_use]
    pub fn get_key(key: &str) -> Self {
        Self::new("GET KEY ?", vec![key.into()])
    }

    /// Create a user, with optional role and database/table scoping.
    ///
    /// Optional clauses are appended in the fixed order
    /// role -> database -> table.
    #[must_use]
    pub fn create_user(
        username: &str,
        password: &str,
        role: Option<&str>,
        database: Option<&str>,
        table: Option<&str>,
    ) -> Self {
        let mut query = String::from("CREATE USER ? PASSWORD ?");
        let mut parameters: Vec<Value> = vec![username.into(), password.into()];
        if let Some(role) = role {
            query.push_str(" ROLE ?");
            parameters.push(role.into());
        }
        if let Some(database) = database {
            query.push_str(" DATABASE ?");
            parameters.push(database.into());
        }
        if let Some(table) = table {
            query.push_str(" TABLE ?");
            parameters.push(table.into());
        }
        Self::new(query, parameters)
    }

    /// Create a pub/sub channel.
    #[must_use]
    pub fn create_channel(name: &str, if_not_exists: bool) -> Self {
        let query = if if_not_exists {
            "CREATE CHANNEL ? IF NOT EXISTS"
        } else {
            "CREATE CHANNEL ?"
        };
        Self::new(query, vec![name.into()])
    }

    /// Remove a pub/sub channel.
    #[must_use]
    pub fn remove_channel(name: &str) -> Self {
        Self::new("REMOVE CHANNEL ?", vec![name.into()])
    }

    /// Publish a message to a channel.
    #[must_use]
    pub fn notify(channel: &str, payload: Option<&str>) -> Self {
        match payload {
            Some(payload) => Self::new("NOTIFY ? ?", vec![channel.into(), payload.into()]),
            None => Self::new("NOTIFY ?", vec![channel.into()]),
        }
    }

    /// Start listening on a channel.
    ///
    /// Named channels use the channel-oriented verb; table channels (and
    /// the all-tables wildcard) use the table-oriented verb.
    #[must_use]
    pub fn listen(channel: &Channel) -> Self {
        let query = if channel.is_table() {
            "LISTEN TABLE ?"
        } else {
            "LISTEN ?"
        };
        Self::new(query, vec![channel.wire_name().into()])
    }

    /// Stop listening on a channel.
    #[must_use]
    pub fn unlisten(channel: &Channel) -> Self {
        let query = if channel.is_table() {
            "UNLISTEN TABLE ?"
        } else {
            "UNLISTEN ?"
        };
        Self::new(query, vec![channel.wire_name().into()])
    }

    /// Grow a blob field to `size` zero-filled bytes.
    ///
    /// Table and column are identifiers and cannot be bound as
    /// parameters; row id and size are bound, in `(size, row_id)` order.
    #[must_use]
    pub fn expand_blob_field(table: &str, column: &str, size: usize, row_id: i64) -> Self {
        Self::new(
            format!("UPDATE {table} SET {column} = zeroblob(?) WHERE rowId = ?"),
            vec![Value::Integer(size as i64), Value::Integer(row_id)],
        )
    }
}
