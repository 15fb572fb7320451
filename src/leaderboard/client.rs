//! Blocking HTTP client for a remote leaderboard server.

use super::server::API_PATH;
use super::{Leaderboard, LeaderboardError, NewScore, ScoreRecord};
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, LeaderboardError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(LeaderboardError::Rejected(
                self.error.unwrap_or_else(|| "no data in response".into()),
            )),
        }
    }
}

pub struct HttpLeaderboard {
    url: String,
    agent: ureq::Agent,
}

impl HttpLeaderboard {
    /// `base` is the server root, e.g. `http://127.0.0.1:7878`.
    pub fn new(base: &str, timeout: Duration) -> Self {
        HttpLeaderboard {
            url: format!("{}{}", base.trim_end_matches('/'), API_PATH),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn read<T: serde::de::DeserializeOwned>(
        result: Result<ureq::Response, ureq::Error>,
    ) -> Result<T, LeaderboardError> {
        let response = match result {
            Ok(response) => response,
            // Error statuses still carry the JSON envelope with the reason.
            Err(ureq::Error::Status(code, response)) => {
                let envelope: Envelope<T> = response.into_json().map_err(|_| {
                    LeaderboardError::Rejected(format!("server answered {code}"))
                })?;
                return envelope.into_result();
            }
            Err(e) => return Err(Box::new(e).into()),
        };
        let envelope: Envelope<T> = response.into_json()?;
        envelope.into_result()
    }
}

impl Leaderboard for HttpLeaderboard {
    fn submit(&self, entry: &NewScore) -> Result<ScoreRecord, LeaderboardError> {
        Self::read(self.agent.post(&self.url).send_json(entry))
    }

    fn top(&self, n: usize) -> Result<Vec<ScoreRecord>, LeaderboardError> {
        let mut records: Vec<ScoreRecord> = Self::read(self.agent.get(&self.url).call())?;
        records.truncate(n);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_api_url() {
        let client = HttpLeaderboard::new("http://localhost:7878/", Duration::from_secs(1));
        assert_eq!(client.url(), "http://localhost:7878/api/leaderboard");
    }

    #[test]
    fn failure_envelope_becomes_rejection() {
        let envelope: Envelope<ScoreRecord> =
            serde_json::from_str(r#"{"success":false,"error":"Please provide the score."}"#)
                .unwrap();
        match envelope.into_result() {
            Err(LeaderboardError::Rejected(msg)) => assert_eq!(msg, "Please provide the score."),
            other => panic!("unexpected {other:?}"),
        }
    }
}
