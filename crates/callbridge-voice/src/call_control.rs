use crate::config::TwilioConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use callbridge_core::{CallControl, PipelineError};

const SERVICE: &str = "call-control";

/// Client for the telephony REST API's live call update.
#[derive(Debug, Clone)]
pub struct CallControlClient {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
}

impl CallControlClient {
    pub fn new(config: &TwilioConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    /// Builds the call resource URL. Call identifiers are interpolated into
    /// the path, so anything but ASCII letters and digits is refused.
    fn call_url(&self, call_sid: &str) -> Result<String, VoiceError> {
        if call_sid.is_empty() || !call_sid.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(VoiceError::InvalidCallId(call_sid.to_string()));
        }
        Ok(format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.api_base, self.account_sid, call_sid
        ))
    }

    /// Replaces the TwiML of an in-progress call.
    pub async fn update_call(&self, call_sid: &str, twiml: &str) -> Result<(), VoiceError> {
        if self.account_sid.is_empty() || self.auth_token.is_empty() {
            return Err(VoiceError::Config(
                "telephony account SID and auth token must be set".to_string(),
            ));
        }

        let url = self.call_url(call_sid)?;
        let response = self
            .http
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Twiml", twiml)])
            .send()
            .await
            .map_err(VoiceError::transport(SERVICE))?;

        if !response.status().is_success() {
            let err = VoiceError::from_response(SERVICE, response).await;
            tracing::warn!(call_sid, "live call update rejected: {}", err);
            return Err(err);
        }

        tracing::debug!(call_sid, "live call redirected");
        Ok(())
    }
}

#[async_trait]
impl CallControl for CallControlClient {
    async fn redirect_live_call(&self, call_id: &str, twiml: &str) -> Result<(), PipelineError> {
        Ok(self.update_call(call_id, twiml).await?)
    }
}
