//! Account and email/password sessions. Always runs under the client role.

use super::segment;
use crate::client::{Call, Client};
use crate::error::Result;
use appwrite_types::{Param, Session, User};
use tracing::info;

#[derive(Clone)]
pub struct Account {
    client: Client,
}

impl Account {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> Result<User> {
        self.client.call(Call::get("/account")).await
    }

    /// Log in. The session cookie lands in the client's cookie store.
    pub async fn create_email_password_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session> {
        let call = Call::post("/account/sessions/email")
            .param(Param::string("email", email))
            .param(Param::string("password", password));
        let session: Session = self.client.call(call).await?;
        info!(user_id = %session.user_id, "session created");
        Ok(session)
    }

    /// Delete a session by id. `current` also clears local session cookies.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let call = Call::delete(format!("/account/sessions/{}", segment(session_id)));
        self.client.call_bytes(call).await?;
        if session_id == "current" {
            self.client.clear_session();
        }
        Ok(())
    }
}

impl Client {
    pub fn account(&self) -> Account {
        Account::new(self.clone())
    }
}
