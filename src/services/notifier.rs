use super::User;

/// Delivers email verification links.
pub trait VerificationNotifier: Send + Sync {
    fn notify(&self, user: &User, url: &str);
}

/// Writes the link to the log instead of sending mail.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl VerificationNotifier for LogNotifier {
    fn notify(&self, user: &User, url: &str) {
        tracing::info!(user_id = user.id, email = %user.email, url = %url, "Verification link issued");
    }
}
