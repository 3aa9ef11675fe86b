use reqwest::Client;
use serde::Serialize;

#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_url: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

impl EmailClient {
    pub fn new(api_url: &str, api_key: &str, from_email: &str, from_name: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        }
    }

    /// Email is optional; without an API key messages are only logged.
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<(), String> {
        if !self.is_enabled() {
            tracing::debug!(to = %to, subject = %subject, "email disabled, skipping");
            return Ok(());
        }

        let request = SendEmailRequest {
            from: format!("{} <{}>", self.from_name, self.from_email),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self.client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("email send failed: {e}"))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("email API error: {body}"));
        }

        tracing::debug!(to = %to, subject = %subject, "email sent");
        Ok(())
    }

    pub async fn send_account_decision(&self, to: &str, full_name: &str, approved: bool) -> Result<(), String> {
        let (subject, headline, body) = if approved {
            (
                "BloodLink - Your account has been approved",
                "Welcome aboard",
                "Your account has been approved by an administrator. You can now sign in.",
            )
        } else {
            (
                "BloodLink - Your registration was not approved",
                "Registration update",
                "An administrator reviewed your registration and could not approve it.",
            )
        };

        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2 style="color: #b91c1c;">BloodLink - {headline}</h2>
            <p>Hello {name},</p>
            <p>{body}</p>
            </div>"#,
            name = escape_html(full_name),
        );

        self.send_email(to, subject, &html).await
    }
}

/// Escapes text for interpolation into HTML element content or attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[tokio::test]
    async fn disabled_client_is_a_no_op() {
        let client = EmailClient::new("http://127.0.0.1:9/emails", "", "noreply@example.org", "BloodLink");
        assert!(!client.is_enabled());
        assert!(client.send_account_decision("a@example.org", "A", true).await.is_ok());
    }
}
