use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Discovery of the background store's action names (both directions).
pub const ACTIONS: &str = "@@ACTIONS";
/// A batch of actions for the background store to apply.
pub const ACTION: &str = "@@ACTION";
/// A state change reported by the background store.
pub const STATE: &str = "@@STATE";

/// One queued action invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMessage {
    pub action_name: String,
    #[serde(default)]
    pub payload: Value,
}

/// Messages from the client stub to the background store.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Actions,
    Action { messages: Vec<ActionMessage> },
}

/// Messages from the background store to the client stub.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Actions {
        payload: Vec<String>,
    },
    State {
        payload: Value,
        action_name: Option<String>,
    },
}

fn kind(message: &Value) -> Result<String> {
    match message.get("type") {
        Some(Value::String(kind)) => Ok(kind.clone()),
        Some(other) => Err(StoreError::UnknownMessageKind(other.to_string())),
        None => Err(StoreError::UnknownMessageKind(String::new())),
    }
}

#[derive(Deserialize)]
struct Batch {
    messages: Vec<ActionMessage>,
}

#[derive(Deserialize)]
struct Names {
    payload: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateBody {
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    action_name: Option<String>,
}

impl Request {
    pub fn encode(&self) -> Value {
        match self {
            Request::Actions => json!({ "type": ACTIONS }),
            Request::Action { messages } => json!({ "type": ACTION, "messages": messages }),
        }
    }

    /// # Errors
    ///
    /// [`StoreError::UnknownMessageKind`] for an unrecognised `type`, and
    /// [`StoreError::Json`] when a known message has the wrong shape.
    pub fn decode(message: Value) -> Result<Self> {
        match kind(&message)?.as_str() {
            ACTIONS => Ok(Request::Actions),
            ACTION => {
                let batch: Batch = serde_json::from_value(message)?;
                Ok(Request::Action {
                    messages: batch.messages,
                })
            }
            other => Err(StoreError::UnknownMessageKind(other.to_string())),
        }
    }
}

impl Response {
    pub fn encode(&self) -> Value {
        match self {
            Response::Actions { payload } => json!({ "type": ACTIONS, "payload": payload }),
            Response::State {
                payload,
                action_name,
            } => json!({ "type": STATE, "payload": payload, "actionName": action_name }),
        }
    }

    /// # Errors
    ///
    /// Same as [`Request::decode`].
    pub fn decode(message: Value) -> Result<Self> {
        match kind(&message)?.as_str() {
            ACTIONS => {
                let names: Names = serde_json::from_value(message)?;
                Ok(Response::Actions {
                    payload: names.payload,
                })
            }
            STATE => {
                let body: StateBody = serde_json::from_value(message)?;
                Ok(Response::State {
                    payload: body.payload,
                    action_name: body.action_name,
                })
            }
            other => Err(StoreError::UnknownMessageKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shapes() {
        let request = Request::Action {
            messages: vec![ActionMessage {
                action_name: "added".to_string(),
                payload: json!({"id": 1}),
            }],
        };
        assert_eq!(
            request.encode(),
            json!({"type": "@@ACTION", "messages": [{"actionName": "added", "payload": {"id": 1}}]})
        );
        assert_eq!(Request::Actions.encode(), json!({"type": "@@ACTIONS"}));

        let response = Response::State {
            payload: json!([1]),
            action_name: None,
        };
        assert_eq!(
            response.encode(),
            json!({"type": "@@STATE", "payload": [1], "actionName": null})
        );
    }

    #[test]
    fn decodes_what_it_encodes() {
        let request = Request::Action {
            messages: vec![ActionMessage {
                action_name: "setState".to_string(),
                payload: json!([]),
            }],
        };
        assert_eq!(Request::decode(request.encode()).unwrap(), request);

        let response = Response::Actions {
            payload: vec!["added".to_string()],
        };
        assert_eq!(Response::decode(response.encode()).unwrap(), response);
    }

    #[test]
    fn unknown_kinds_are_rejected_on_both_sides() {
        let err = Request::decode(json!({"type": "@@PING"})).unwrap_err();
        assert!(matches!(err, StoreError::UnknownMessageKind(kind) if kind == "@@PING"));

        let err = Response::decode(json!({"type": "@@ACTION", "messages": []})).unwrap_err();
        assert!(matches!(err, StoreError::UnknownMessageKind(_)));

        let err = Request::decode(json!({"messages": []})).unwrap_err();
        assert!(matches!(err, StoreError::UnknownMessageKind(_)));
    }

    #[test]
    fn malformed_bodies_are_json_errors() {
        let err = Request::decode(json!({"type": "@@ACTION", "messages": 3})).unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let message: ActionMessage = serde_json::from_value(json!({"actionName": "reset"})).unwrap();
        assert_eq!(message.payload, Value::Null);
    }
}
