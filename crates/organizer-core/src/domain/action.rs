//! Menu mutations and their queued offline form

use chrono::{DateTime, Utc};
use organizer_shared::{new_id, EntityId, Identity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::{Menu, MenuOrder, MenuPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Reorder,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Reorder => "reorder",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully prepared mutation. Create carries the whole row, including the
/// client-generated id, so replays stay idempotent.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuMutation {
    Create(Menu),
    Update { menu_id: EntityId, patch: MenuPatch },
    Delete { menu_id: EntityId },
    Reorder { orders: Vec<MenuOrder> },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePayload {
    menu_id: EntityId,
    patch: MenuPatch,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletePayload {
    menu_id: EntityId,
}

#[derive(Serialize, Deserialize)]
struct ReorderPayload {
    orders: Vec<MenuOrder>,
}

impl MenuMutation {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Create(_) => ActionKind::Create,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
            Self::Reorder { .. } => ActionKind::Reorder,
        }
    }

    /// Menu the mutation targets, if it targets exactly one.
    pub fn target(&self) -> Option<EntityId> {
        match self {
            Self::Create(menu) => Some(menu.id),
            Self::Update { menu_id, .. } | Self::Delete { menu_id } => Some(*menu_id),
            Self::Reorder { .. } => None,
        }
    }

    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Create(menu) => serde_json::to_value(menu),
            Self::Update { menu_id, patch } => serde_json::to_value(UpdatePayload {
                menu_id: *menu_id,
                patch: patch.clone(),
            }),
            Self::Delete { menu_id } => serde_json::to_value(DeletePayload { menu_id: *menu_id }),
            Self::Reorder { orders } => serde_json::to_value(ReorderPayload { orders: orders.clone() }),
        }
    }

    pub fn from_payload(kind: ActionKind, payload: &Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ActionKind::Create => Self::Create(serde_json::from_value(payload.clone())?),
            ActionKind::Update => {
                let p: UpdatePayload = serde_json::from_value(payload.clone())?;
                Self::Update { menu_id: p.menu_id, patch: p.patch }
            }
            ActionKind::Delete => {
                let p: DeletePayload = serde_json::from_value(payload.clone())?;
                Self::Delete { menu_id: p.menu_id }
            }
            ActionKind::Reorder => {
                let p: ReorderPayload = serde_json::from_value(payload.clone())?;
                Self::Reorder { orders: p.orders }
            }
        })
    }
}

/// A mutation waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAction {
    pub id: EntityId,
    pub kind: ActionKind,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    pub identity: Identity,
}

impl OfflineAction {
    pub fn new(identity: Identity, mutation: &MenuMutation) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: new_id(),
            kind: mutation.kind(),
            payload: mutation.to_payload()?,
            enqueued_at: Utc::now(),
            identity,
        })
    }

    pub fn mutation(&self) -> Result<MenuMutation, serde_json::Error> {
        MenuMutation::from_payload(self.kind, &self.payload)
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.enqueued_at
    }
}

/// Serialize a queue as the JSON array stored per identity.
pub fn encode_actions(actions: &[OfflineAction]) -> Result<String, serde_json::Error> {
    serde_json::to_string(actions)
}

pub fn decode_actions(raw: &str) -> Result<Vec<OfflineAction>, serde_json::Error> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use organizer_shared::MenuType;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_menu() -> Menu {
        let now = Utc::now();
        Menu {
            id: new_id(),
            owner_id: new_id(),
            name: "Debts".into(),
            menu_type: MenuType::Dashboard,
            config: json!({ "currency": "IDR" }),
            order: 1,
            is_private: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_stored_entry_shape() {
        let mutation = MenuMutation::Delete { menu_id: new_id() };
        let action = OfflineAction::new(new_id(), &mutation).unwrap();
        let value = serde_json::to_value(&action).unwrap();
        for key in ["id", "kind", "payload", "enqueuedAt", "identity"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["kind"], json!("delete"));
    }

    #[test]
    fn test_mutation_survives_payload_form() {
        let mutations = vec![
            MenuMutation::Create(sample_menu()),
            MenuMutation::Update {
                menu_id: new_id(),
                patch: MenuPatch { name: Some("A".into()), ..MenuPatch::default() },
            },
            MenuMutation::Reorder {
                orders: vec![MenuOrder { menu_id: new_id(), order: 2 }],
            },
        ];
        for mutation in mutations {
            let action = OfflineAction::new(new_id(), &mutation).unwrap();
            assert_eq!(action.mutation().unwrap(), mutation);
        }
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let action = OfflineAction {
            id: new_id(),
            kind: ActionKind::Update,
            payload: json!({ "nope": true }),
            enqueued_at: Utc::now(),
            identity: new_id(),
        };
        assert!(action.mutation().is_err());
    }

    fn action_strategy() -> impl Strategy<Value = OfflineAction> {
        (
            prop_oneof![
                Just(ActionKind::Create),
                Just(ActionKind::Update),
                Just(ActionKind::Delete),
                Just(ActionKind::Reorder),
            ],
            "[a-zA-Z ]{0,16}",
            0i64..4_000_000_000,
            any::<u128>(),
        )
            .prop_map(|(kind, text, secs, raw_id)| OfflineAction {
                id: uuid::Uuid::from_u128(raw_id),
                kind,
                payload: json!({ "menuId": uuid::Uuid::from_u128(raw_id ^ 1), "note": text }),
                enqueued_at: Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now),
                identity: uuid::Uuid::from_u128(raw_id.rotate_left(7)),
            })
    }

    proptest! {
        #[test]
        fn queue_codec_round_trip(actions in prop::collection::vec(action_strategy(), 0..12)) {
            let raw = encode_actions(&actions).unwrap();
            prop_assert_eq!(decode_actions(&raw).unwrap(), actions);
        }

        #[test]
        fn malformed_input_never_panics(raw in ".{0,64}") {
            let _ = decode_actions(&raw);
        }
    }
}
