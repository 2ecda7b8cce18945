//! TwiML documents returned to, or pushed at, the telephony provider.

/// Seconds to hold the call open while waiting for speech.
pub const HOLD_SECONDS: u32 = 3600;

/// Parameters for starting real-time transcription on a call.
#[derive(Debug, Clone, Copy)]
pub struct ListenOptions<'a> {
    /// Absolute URL the provider posts transcript events to.
    pub transcription_url: &'a str,
    /// BCP-47 language tag, e.g. `en-US`.
    pub language: &'a str,
}

/// Escapes text for use in XML element content and attribute values.
pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn document(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response>{}</Response>"#,
        body
    )
}

fn listen_body(opts: &ListenOptions<'_>) -> String {
    format!(
        r#"<Start><Transcription statusCallbackUrl="{}" statusCallbackMethod="POST" languageCode="{}" track="inbound_track" partialResults="false"/></Start><Pause length="{}"/>"#,
        escape_xml(opts.transcription_url),
        escape_xml(opts.language),
        HOLD_SECONDS
    )
}

/// Start listening and hold the call open.
pub fn listen(opts: &ListenOptions<'_>) -> String {
    document(&listen_body(opts))
}

/// Play the greeting, then start listening and hold the call open.
pub fn greet_and_listen(greeting_url: &str, opts: &ListenOptions<'_>) -> String {
    document(&format!(
        "<Play>{}</Play>{}",
        escape_xml(greeting_url),
        listen_body(opts)
    ))
}

/// Play a reply, then hand the call back to the resume endpoint.
pub fn play_then_redirect(audio_url: &str, resume_url: &str) -> String {
    document(&format!(
        r#"<Play>{}</Play><Redirect method="POST">{}</Redirect>"#,
        escape_xml(audio_url),
        escape_xml(resume_url)
    ))
}
