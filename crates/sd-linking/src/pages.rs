//! Terminal pages rendered inside the popup context

/// Escape a value for interpolation into HTML text content.
fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Success page: shows the confirmed external username and closes itself
/// after the dwell delay. Mirrors the delay the opener waits before
/// navigating away.
pub fn connected_page(external_username: &str, close_delay_ms: u64) -> String {
    format!(
        r#"
        <html>
            <head><title>Account Connected</title></head>
            <body style="font-family: sans-serif; text-align: center; padding: 50px;">
                <h1>✅ Account Connected</h1>
                <p>Connected as <strong>{}</strong>.</p>
                <p>This window will close itself. You can return to Scoutdeck.</p>
                <script>
                    setTimeout(function() {{ window.close(); }}, {});
                </script>
            </body>
        </html>
        "#,
        escape(external_username),
        close_delay_ms
    )
}

/// Failure page: terminal for this attempt, stays open so the reason is
/// readable. Recovery is a fresh attempt from the main window.
pub fn failed_page(message: &str) -> String {
    format!(
        r#"
        <html>
            <head><title>Connection Failed</title></head>
            <body style="font-family: sans-serif; text-align: center; padding: 50px;">
                <h1>❌ Connection Failed</h1>
                <p>{}</p>
                <p>You can close this window and retry from Scoutdeck.</p>
            </body>
        </html>
        "#,
        escape(message)
    )
}
