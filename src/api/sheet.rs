//! Implements the `Sheet` trait using the `sheets::Client` for reads and range writes, and the
//! Sheets REST `values:append` endpoint for appending rows.

use crate::api::{Credentials, Sheet, SheetRange};
use crate::error::{Error, ErrorType, IntoResult, Res};
use crate::model::Cell;
use crate::Result;
use anyhow::{anyhow, Context};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};
use sheets::types::{
    BatchUpdateValuesRequest, DateTimeRenderOption, Dimension, ValueInputOption, ValueRange,
    ValueRenderOption,
};
use sheets::ClientError;
use tracing::trace;
use url::Url;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Talks to one spreadsheet. It takes `Credentials`, from which it gets a fresh access token before
/// each call.
pub(super) struct GoogleSheet {
    spreadsheet_id: String,
    credentials: Credentials,
    http: reqwest::Client,
}

impl GoogleSheet {
    pub(super) fn new(spreadsheet_id: impl Into<String>, credentials: Credentials) -> Res<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Unable to create the HTTP client")?;
        Ok(Self {
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            http,
        })
    }

    /// Creates a sheets client with a refreshed access token.
    async fn client(&mut self) -> Res<sheets::Client> {
        let access_token = self.credentials.token().await?;

        // The sheets crate wants client_id, client_secret, redirect_uri and a refresh token, but
        // the access token is all that API calls need.
        Ok(sheets::Client::new(
            String::new(),
            String::new(),
            String::new(),
            access_token,
            String::new(),
        ))
    }

    async fn append_row(&mut self, range: &str, row: Vec<Cell>) -> Res<()> {
        let token = self.credentials.token().await?;
        let (url, body) = append_request(&self.spreadsheet_id, range, &row)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("Failed to send the append request to the Sheets API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(Error::msg(
                kind_for_status(status.as_u16()),
                format!("The Sheets API append failed with status {status}: {body}"),
            )
            .into());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn get(&mut self, range: &str) -> Result<Vec<Vec<String>>> {
        trace!("get for {range}");
        let id = self.spreadsheet_id.clone();
        let client = self.client().await.pub_result(ErrorType::Unknown)?;
        let response = client
            .spreadsheets()
            .values_get(
                &id,
                range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to fetch the values in {range}"))
            .pub_result(ErrorType::Unknown)?;
        Ok(response.body.values)
    }

    async fn append(&mut self, range: &str, row: Vec<Cell>) -> Result<()> {
        trace!("append to {range}");
        self.append_row(range, row)
            .await
            .pub_result(ErrorType::Unknown)
    }

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Result<()> {
        let id = self.spreadsheet_id.clone();
        let client = self.client().await.pub_result(ErrorType::Unknown)?;
        let value_ranges: Vec<ValueRange> = data
            .iter()
            .map(|sr| ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: sr.range.clone(),
                values: sr.values.clone(),
            })
            .collect();

        let request = BatchUpdateValuesRequest {
            data: value_ranges,
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            value_input_option: Some(ValueInputOption::UserEntered),
        };

        client
            .spreadsheets()
            .values_batch_update(&id, &request)
            .await
            .map_err(map_client_error)
            .context("Failed to write ranges")
            .pub_result(ErrorType::Unknown)?;
        Ok(())
    }
}

/// The `values:append` endpoint for `range` and the body that adds `row` below the last row of the
/// table found there. Values are stored as given, not parsed as if typed into the sheet.
fn append_request(spreadsheet_id: &str, range: &str, row: &[Cell]) -> Res<(Url, Value)> {
    let mut url = Url::parse(SHEETS_API).context("Invalid Sheets API URL")?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("The Sheets API URL cannot have path segments"))?
        .pop_if_empty()
        .push(spreadsheet_id)
        .push("values")
        .push(&format!("{range}:append"));
    url.query_pairs_mut()
        .append_pair("valueInputOption", "RAW")
        .append_pair("insertDataOption", "INSERT_ROWS");

    let values: Vec<Value> = row.iter().map(cell_json).collect();
    let body = json!({ "majorDimension": "ROWS", "values": [values] });
    Ok((url, body))
}

/// Amounts are sent as numbers so that the spreadsheet can sum them.
fn cell_json(cell: &Cell) -> Value {
    match cell {
        Cell::Text(s) => Value::String(s.clone()),
        Cell::Number(d) => d
            .to_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(d.to_string())),
    }
}

/// A 400 from the values endpoints means the range could not be parsed, which happens when the
/// worksheet named in config.json does not exist.
fn kind_for_status(status: u16) -> ErrorType {
    match status {
        400 => ErrorType::Config,
        401 => ErrorType::AuthExpired,
        403 | 404 => ErrorType::NotFound,
        _ => ErrorType::Unknown,
    }
}

fn map_client_error(e: ClientError) -> Error {
    let kind = match &e {
        ClientError::HttpError { status, .. } => kind_for_status(status.as_u16()),
        _ => ErrorType::Unknown,
    };
    Error::new(kind, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_kind_for_status() {
        assert_eq!(kind_for_status(400), ErrorType::Config);
        assert_eq!(kind_for_status(404), ErrorType::NotFound);
        assert_eq!(kind_for_status(403), ErrorType::NotFound);
        assert_eq!(kind_for_status(401), ErrorType::AuthExpired);
        assert_eq!(kind_for_status(500), ErrorType::Unknown);
    }

    #[test]
    fn test_map_client_error_uses_status() {
        let error = |status| ClientError::HttpError {
            status,
            headers: reqwest::header::HeaderMap::new(),
            error: String::from("Unable to parse range: 'Mising'!A:ZZ"),
        };
        let err = map_client_error(error(reqwest::StatusCode::BAD_REQUEST));
        assert_eq!(err.kind(), ErrorType::Config);
        assert!(err.kind().recovery().unwrap().contains("worksheet"));
        let err = map_client_error(error(reqwest::StatusCode::NOT_FOUND));
        assert_eq!(err.kind(), ErrorType::NotFound);
    }

    #[test]
    fn test_append_request() {
        let row = vec![
            Cell::Text("2025-03-10".to_string()),
            Cell::Text("รายจ่าย".to_string()),
            Cell::Number(Decimal::from_str("120.50").unwrap()),
        ];
        let range = crate::api::range(Some("Bob's Tab"), "A:ZZ");
        let (url, body) = append_request("abc123", &range, &row).unwrap();

        assert_eq!(url.host_str(), Some("sheets.googleapis.com"));
        assert_eq!(
            url.path(),
            "/v4/spreadsheets/abc123/values/'Bob''s%20Tab'!A:ZZ:append"
        );
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            query,
            vec![
                ("valueInputOption".to_string(), "RAW".to_string()),
                ("insertDataOption".to_string(), "INSERT_ROWS".to_string()),
            ]
        );
        assert_eq!(
            body,
            json!({
                "majorDimension": "ROWS",
                "values": [["2025-03-10", "รายจ่าย", 120.5]]
            })
        );
    }

    #[test]
    fn test_append_request_first_worksheet() {
        let (url, _) = append_request("abc123", "A:ZZ", &[]).unwrap();
        assert_eq!(url.path(), "/v4/spreadsheets/abc123/values/A:ZZ:append");
    }

    #[test]
    fn test_cell_json() {
        assert_eq!(cell_json(&Cell::Text("Food".to_string())), json!("Food"));
        assert_eq!(
            cell_json(&Cell::Number(Decimal::from_str("120.50").unwrap())),
            json!(120.5)
        );
    }
}
