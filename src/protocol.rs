use crate::types::*;
use serde::{Deserialize, Serialize};

/// Messages from clients, discriminated by the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinAdminPanel,
    Join {
        name: String,
    },
    SetReady {
        ready: bool,
    },
    GetLobbyState,
    ChatMessage {
        message: String,
    },
    GetPlayerCards {
        player_id: ConnectionId,
    },
    RevealCharacteristic {
        player_id: ConnectionId,
        characteristic_type: Category,
    },
    ExecuteActionCard {
        action_type: ActionType,
        #[serde(default)]
        parameters: ActionParameters,
    },
    ToggleBanPlayer {
        player_id: ConnectionId,
    },
    KickPlayer {
        player_id: ConnectionId,
    },
    SetMirrorCamera {
        mirror: bool,
    },
    /// Host flags the session as ready to start (informational marker).
    GameReady,
    SetTotalRounds {
        total_rounds: u32,
    },
    ChangeRound {
        round: u32,
    },
    StartVotingSelection,
    SetVotingCandidates {
        candidates: Vec<ConnectionId>,
    },
    ConfirmVotingCandidates,
    CancelVoting,
    VoteToKick {
        target_player_id: ConnectionId,
    },
    TogglePlayerHighlight {
        player_id: ConnectionId,
    },
    ResetGame,
    /// Opaque media-plane signaling relayed to the target connection.
    Signal {
        target_id: ConnectionId,
        signal: serde_json::Value,
    },
    RefreshConnections,
}

/// The fixed catalog of host-triggered card effects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    RevealCharacteristic,
    RevealRandom,
    RevealAll,
    HideCharacteristic,
    RerollCharacteristic,
    RerollAll,
    CureHealth,
    ChangeProfession,
    ChangePhobia,
    ChangeAge,
    SwapCharacteristic,
    SwapAll,
    StealCharacteristic,
    MutePlayer,
    UnmutePlayer,
    GrantImmunity,
    RevokeImmunity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionParameters {
    #[serde(default)]
    pub selected_players: Vec<ConnectionId>,
    #[serde(default)]
    pub selected_characteristics: Vec<Category>,
}

/// Messages to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        your_id: ConnectionId,
    },
    PlayersUpdate {
        players: Vec<ParticipantInfo>,
        ready_count: usize,
        total_players: usize,
        regular_players: usize,
        max_regular_players: usize,
        host_connected: bool,
        host_ready: bool,
        game_started: bool,
        ready_to_start: bool,
        current_round: u32,
        total_rounds: u32,
        highlighted_player_id: Option<ConnectionId>,
        voting: VotingSummary,
    },
    JoinedAsPlayer {
        id: ConnectionId,
        is_reconnecting: bool,
    },
    JoinedAsHost {
        id: ConnectionId,
        is_reconnecting: bool,
    },
    JoinedAsAdmin {
        id: ConnectionId,
        is_reconnecting: bool,
    },
    ReadyStatus {
        ready: bool,
    },
    GameStarted,
    GameReady,
    GameMessage {
        message: String,
    },
    GameReset,
    RoundChanged {
        round: u32,
        total_rounds: u32,
    },
    TotalRoundsChanged {
        total_rounds: u32,
    },
    VotingStarted {
        candidates: Vec<CandidateInfo>,
    },
    VotingCompleted {
        results: Vec<VoteResultEntry>,
        eliminated: Option<ConnectionId>,
    },
    VotingTie {
        results: Vec<VoteResultEntry>,
        candidates: Vec<ConnectionId>,
    },
    VotingCancelled,
    CharacteristicRevealed {
        player_id: ConnectionId,
        characteristic_type: Category,
        card: Card,
    },
    ChatMessage {
        from: ConnectionId,
        from_name: String,
        message: String,
        timestamp: i64,
    },
    PlayerCards {
        player_id: ConnectionId,
        characteristics: CategoryMap,
    },
    PlayerLeft {
        player_id: ConnectionId,
        player_name: Option<String>,
    },
    PlayerKicked {
        player_id: ConnectionId,
        player_name: String,
    },
    PlayerBanned {
        player_id: ConnectionId,
        banned: bool,
    },
    NewPlayerJoined {
        player_id: ConnectionId,
        player_name: String,
    },
    HostLeft,
    Signal {
        from_id: ConnectionId,
        from_name: String,
        signal: serde_json::Value,
        timestamp: i64,
    },
    RefreshConnectionsRequest {
        from: ConnectionId,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Participant view inside the snapshot. `banned` comes from the session ban
/// set rather than the participant itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: ConnectionId,
    pub name: String,
    pub role: Role,
    pub ready: bool,
    pub muted: bool,
    pub immunity: bool,
    pub mirror_camera: bool,
    pub banned: bool,
    pub characteristics: Option<CategoryMap>,
}

impl ParticipantInfo {
    pub fn from_participant(p: &Participant, banned: bool) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            role: p.role,
            ready: p.ready,
            muted: p.muted,
            immunity: p.immunity,
            mirror_camera: p.mirror_camera,
            banned,
            characteristics: p.characteristics.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInfo {
    pub id: ConnectionId,
    pub name: String,
}

/// Voting sub-state summary carried in every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingSummary {
    pub phase: VotePhase,
    pub candidates: Vec<ConnectionId>,
    pub votes_cast: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_type_tag_and_camel_case_fields() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"vote_to_kick","targetPlayerId":"abc"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::VoteToKick { target_player_id } if target_player_id == "abc"
        ));

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"execute_action_card","actionType":"swap_characteristic",
                "parameters":{"selectedPlayers":["a","b"],"selectedCharacteristics":["health"]}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::ExecuteActionCard {
                action_type,
                parameters,
            } => {
                assert_eq!(action_type, ActionType::SwapCharacteristic);
                assert_eq!(parameters.selected_players, vec!["a", "b"]);
                assert_eq!(parameters.selected_characteristics, vec![Category::Health]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn action_parameters_default_when_absent() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"execute_action_card","actionType":"reveal_all"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::ExecuteActionCard { parameters, .. } => {
                assert!(parameters.selected_players.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn welcome_serializes_with_snake_case_tag() {
        let json = serde_json::to_string(&ServerMessage::Welcome {
            your_id: "x".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"welcome""#));
        assert!(json.contains(r#""yourId":"x""#));
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"not_a_thing"}"#);
        assert!(result.is_err());
    }
}
