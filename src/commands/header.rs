use crate::commands::Out;
use crate::model::Layout;
use crate::{Result, Session};
use tracing::info;

/// Writes the header row of the configured layout into an empty worksheet. When the worksheet
/// already has a header, it is checked against the known layouts and left alone.
pub async fn header(session: &Session) -> Result<Out<Layout>> {
    let mut ledger = session.ledger().await?;
    match ledger.header().await? {
        Some(layout) => {
            if layout != session.config().layout() {
                info!(
                    "The worksheet uses the {layout} layout, config.json says {}. The worksheet \
                    wins",
                    session.config().layout()
                );
            }
            Ok(Out::new(
                format!("The header row matches the {layout} layout"),
                layout,
            ))
        }
        None => {
            let layout = session.config().layout();
            ledger.write_header(layout).await?;
            Ok(Out::new(
                format!("Wrote the {layout} header row: {}", layout.headers().join(", ")),
                layout,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorType;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_header_into_empty_sheet() {
        let env = TestEnv::new().await;
        env.set_rows(Some(Vec::new()));
        let out = header(&env.session().await).await.unwrap();
        assert_eq!(out.structure(), Some(&Layout::Full));
        assert_eq!(env.rows()[0], Layout::Full.headers());

        // A second run only verifies.
        let out = header(&env.session().await).await.unwrap();
        assert!(out.message().contains("matches"));
        assert_eq!(env.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_header_mismatch() {
        let env = TestEnv::new().await;
        env.set_rows(Some(vec![vec!["Day".to_string(), "Money".to_string()]]));
        let err = header(&env.session().await).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::SchemaMismatch);
    }
}
