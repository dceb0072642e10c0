//! `expense lock`, `expense unlock` and `expense logout`.
//!
//! The PIN is compared in plain text and there is no limit on attempts. It keeps a casual
//! passer-by away from the numbers, nothing more.

use crate::commands::Out;
use crate::{Result, Session};

pub async fn lock(session: &mut Session) -> Result<Out<()>> {
    session.lock().await?;
    Ok("Locked. Run 'expense unlock --pin <PIN>' to continue".into())
}

pub async fn unlock(session: &mut Session, pin: &str) -> Result<Out<()>> {
    session.unlock(pin).await?;
    match session.config().pin() {
        Some(_) => Ok("Unlocked".into()),
        None => Ok("No PIN is configured, the session is open".into()),
    }
}

/// Ends the session. The saved OAuth tokens are removed too, so the next data command needs
/// `expense auth` first.
pub async fn logout(session: Session) -> Result<Out<()>> {
    let removed = session.logout().await?;
    let files: Vec<String> = removed.iter().map(|p| p.display().to_string()).collect();
    Ok(format!("Logged out, removed {}", files.join(", ")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{recent, DEFAULT_RECENT};
    use crate::error::ErrorType;
    use crate::report::Format;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_lock_gates_data_commands() {
        let env = TestEnv::with_pin("2468").await;
        let mut session = env.session().await;
        let err = recent(&session, DEFAULT_RECENT, Format::Table)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::Locked);

        assert!(unlock(&mut session, "1357").await.is_err());
        unlock(&mut session, "2468").await.unwrap();
        recent(&env.session().await, DEFAULT_RECENT, Format::Table)
            .await
            .unwrap();

        lock(&mut session).await.unwrap();
        let err = recent(&env.session().await, DEFAULT_RECENT, Format::Table)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::Locked);
    }

    #[tokio::test]
    async fn test_unlock_without_pin() {
        let env = TestEnv::new().await;
        let mut session = env.session().await;
        lock(&mut session).await.unwrap();
        let out = unlock(&mut session, "").await.unwrap();
        assert!(out.message().contains("No PIN"));
        assert!(!session.state().locked());
    }

    #[tokio::test]
    async fn test_logout_starts_a_new_session() {
        let env = TestEnv::new().await;
        let session = env.session().await;
        let id = session.state().id();
        let out = logout(session).await.unwrap();
        assert!(out.message().contains("session.json"));
        assert_ne!(env.session().await.state().id(), id);
    }
}
