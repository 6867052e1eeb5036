//! Crate-level error type.

/// Convenience alias used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors raised by stores, frozen views and the adapters built on them.
///
/// Only contract violations are reported here. Expected edge conditions
/// (rolling back an empty history, a refused reset, publishing to a channel
/// nobody listens on) are reported through return values instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write was attempted on a frozen view.
    #[error("Cannot change property \"{property}\" to \"{value}\" of an immutable object")]
    Immutable {
        /// The property or index the write targeted.
        property: String,
        /// The rejected value, rendered as compact JSON.
        value: String,
    },

    /// `dispatch` named an action the store does not know.
    #[error("store \"{store}\" has no action named \"{action}\"")]
    UnknownAction {
        /// Name of the store that received the dispatch.
        store: String,
        /// The unregistered action name.
        action: String,
    },

    /// An adapter could not be set up in the current environment.
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// A delegation message carried a `type` this side does not understand.
    #[error("Unknown message type \"{0}\"")]
    UnknownMessageKind(String),

    /// A state tree or delegation message could not be encoded or decoded.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The other end of a delegation channel has gone away.
    #[error("background store is no longer running")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_names_property_and_value() {
        let err = StoreError::Immutable {
            property: "id".to_string(),
            value: "7".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot change property \"id\" to \"7\" of an immutable object"
        );
    }

    #[test]
    fn unknown_action_display() {
        let err = StoreError::UnknownAction {
            store: "todos".to_string(),
            action: "renamed".to_string(),
        };
        assert_eq!(err.to_string(), "store \"todos\" has no action named \"renamed\"");
    }

    #[test]
    fn unknown_message_kind_display() {
        let err = StoreError::UnknownMessageKind("@@PING".to_string());
        assert_eq!(err.to_string(), "Unknown message type \"@@PING\"");
    }

    #[test]
    fn json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::from(json_err);
        assert!(err.to_string().starts_with("invalid JSON:"));
    }

    const _: () = {
        #[allow(dead_code)]
        fn assert_send_sync<T: Send + Sync>() {}

        #[allow(dead_code)]
        fn check() {
            assert_send_sync::<StoreError>();
        }
    };
}
