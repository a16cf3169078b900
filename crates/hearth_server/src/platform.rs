//! Outbound HTTP to the external platform collaborator (spec §4.G). The
//! teacher has no outbound HTTP client of its own to draw from (Horizon is
//! purely inbound); per `SPEC_FULL.md` this is sourced from the wider
//! corpus's `reqwest` + `serde_json` convention for JSON REST calls, with a
//! bounded `tokio::time::timeout` around every call per spec §5.
//!
//! Every call is best-effort: a failure or timeout is logged and the caller
//! falls back to a deterministic local default rather than propagating an
//! error (spec §7, `TransientExternal`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Bounded timeout for every outbound platform call (spec §5, "bounded
/// timeout"). A timeout is treated exactly like a request failure.
const PLATFORM_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct ReturnToLobbyRequest {
    pub game_id: String,
    pub room_code: String,
    pub return_all: bool,
    pub player_id: Option<String>,
    pub initiated_by: String,
    pub reason: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReturnToLobbyApiResponse {
    #[serde(rename = "returnUrl")]
    return_url: String,
    #[serde(rename = "sessionToken")]
    session_token: Option<String>,
    #[serde(rename = "playersReturned")]
    players_returned: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnToLobbyResult {
    pub ok: bool,
    pub return_url: String,
    pub session_token: Option<String>,
    pub players_returned: Option<u32>,
    /// Set when the platform call failed/timed out and a local fallback URL
    /// was substituted — spec §7 still marks the response `success:true` so
    /// clients can proceed, but callers surface this for observability.
    pub api_error: Option<String>,
}

pub struct PlatformClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl PlatformClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Deterministic local return URL, still embedding the room code, used
    /// both as the fallback when the platform API fails and (when no
    /// `base_url` is configured at all) as the only return URL.
    pub fn fallback_return_url(&self, room_code: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}/return?room={}", base.trim_end_matches('/'), room_code),
            None => format!("/return?room={room_code}"),
        }
    }

    /// Requests a group/individual return-to-lobby redirect for `room_code`.
    /// Never returns an error to the caller: on any HTTP failure or timeout
    /// it falls back to [`Self::fallback_return_url`] and reports the
    /// failure via `api_error` (spec §4.G, §7).
    pub async fn request_return_to_lobby(&self, request: ReturnToLobbyRequest) -> ReturnToLobbyResult {
        let Some(base) = &self.base_url else {
            return ReturnToLobbyResult {
                ok: true,
                return_url: self.fallback_return_url(&request.room_code),
                session_token: None,
                players_returned: None,
                api_error: Some("no platform configured".into()),
            };
        };

        let url = format!("{}/api/rooms/{}/return", base.trim_end_matches('/'), request.room_code);
        let call = self.http.post(&url).json(&request).send();

        match tokio::time::timeout(PLATFORM_CALL_TIMEOUT, call).await {
            Ok(Ok(response)) if response.status().is_success() => {
                match response.json::<ReturnToLobbyApiResponse>().await {
                    Ok(body) => ReturnToLobbyResult {
                        ok: true,
                        return_url: body.return_url,
                        session_token: body.session_token,
                        players_returned: body.players_returned,
                        api_error: None,
                    },
                    Err(err) => self.return_fallback(&request.room_code, err.to_string()),
                }
            }
            Ok(Ok(response)) => {
                self.return_fallback(&request.room_code, format!("platform responded {}", response.status()))
            }
            Ok(Err(err)) => self.return_fallback(&request.room_code, err.to_string()),
            Err(_) => self.return_fallback(&request.room_code, "platform call timed out".into()),
        }
    }

    fn return_fallback(&self, room_code: &str, error: String) -> ReturnToLobbyResult {
        warn!(room_code, error, "platform return-to-lobby call failed, using fallback URL");
        ReturnToLobbyResult {
            ok: true,
            return_url: self.fallback_return_url(room_code),
            session_token: None,
            players_returned: None,
            api_error: Some(error),
        }
    }

    /// Fire-and-forget player status update. Failures are logged and never
    /// surfaced to the caller (spec §4.G).
    pub async fn update_player_status(
        &self,
        game_id: &str,
        room_code: &str,
        player_id: &str,
        status: &str,
        note: Option<&str>,
        data: Option<Value>,
    ) {
        let Some(base) = &self.base_url else { return };
        let url = format!("{}/api/rooms/{}/players/{}/status", base.trim_end_matches('/'), room_code, player_id);
        let body = serde_json::json!({
            "gameId": game_id,
            "status": status,
            "note": note,
            "data": data,
        });
        let call = self.http.post(&url).json(&body).send();
        match tokio::time::timeout(PLATFORM_CALL_TIMEOUT, call).await {
            Ok(Ok(response)) if response.status().is_success() => {}
            _ => warn!(room_code, player_id, "platform status update failed or timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_url_embeds_room_code_without_base() {
        let client = PlatformClient::new(None);
        assert_eq!(client.fallback_return_url("QRXZP7"), "/return?room=QRXZP7");
    }

    #[test]
    fn fallback_url_embeds_room_code_with_base() {
        let client = PlatformClient::new(Some("https://platform.example".to_string()));
        assert_eq!(
            client.fallback_return_url("QRXZP7"),
            "https://platform.example/return?room=QRXZP7"
        );
    }

    #[tokio::test]
    async fn request_return_without_configured_platform_uses_fallback() {
        let client = PlatformClient::new(None);
        let result = client
            .request_return_to_lobby(ReturnToLobbyRequest {
                game_id: "lightcycles".into(),
                room_code: "QRXZP7".into(),
                return_all: true,
                player_id: None,
                initiated_by: "host".into(),
                reason: None,
                metadata: None,
            })
            .await;
        assert!(result.ok);
        assert!(result.api_error.is_some());
        assert_eq!(result.return_url, "/return?room=QRXZP7");
    }
}
