//! Device RPC response parser
//!
//! Stateless functions converting JSON-RPC responses from Gen2 metering
//! devices into typed values. Any structural surprise is a
//! [`DeviceError::Protocol`].

use serde_json::Value;

use super::{DeviceError, DeviceResult, HistoryPage, PageCursor, PageRequest};
use crate::{DeviceIdentity, TelemetryRecord};

/// Stateless parser for device RPC responses
pub struct RpcParser;

impl RpcParser {
    /// Unwrap a JSON-RPC envelope into its `result`
    ///
    /// # Errors
    /// Returns a protocol error for an `error` object or a missing `result`
    pub fn parse_envelope(method: &str, mut body: Value) -> DeviceResult<Value> {
        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(|v| v.as_i64()).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("no message");
            return Err(DeviceError::Protocol(format!(
                "{method} failed with code {code}: {message}"
            )));
        }

        match body.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(DeviceError::Protocol(format!(
                "{method} response has no result"
            ))),
        }
    }

    /// Parse a `Shelly.GetDeviceInfo` result
    ///
    /// # Format
    /// `{"mac": "A8032ABE54DC", "model": "SPEM-003CEBEU", "fw_id": "...", ...}`
    pub fn parse_device_info(result: &Value) -> DeviceResult<DeviceIdentity> {
        Ok(DeviceIdentity {
            mac: Self::required_str(result, "mac")?,
            model: Self::required_str(result, "model")?,
            firmware_id: Self::required_str(result, "fw_id")?,
        })
    }

    /// Parse an `EMData.GetData` / `EM1Data.GetData` result into a page
    ///
    /// # Format
    /// ```text
    /// {"data": [{"ts": 1656356400, "period": 60, "values": [[..], ..]}],
    ///  "next_record_ts": 1656357120}
    /// ```
    ///
    /// Row `i` of a block is stamped `ts + i * period`. A missing
    /// `next_record_ts` means the window is exhausted.
    pub fn parse_history_page(result: &Value, request: &PageRequest) -> DeviceResult<HistoryPage> {
        let blocks = result
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| DeviceError::Protocol("Missing or invalid data array".to_string()))?;

        let mut records = Vec::new();
        for block in blocks {
            Self::parse_block(block, &mut records)?;
        }

        let window_length = request.window_end - request.window_start;
        let (next, position_consumed) = match result.get("next_record_ts") {
            None | Some(Value::Null) => (PageCursor::Done, window_length),
            Some(value) => {
                let next_ts = value.as_i64().ok_or_else(|| {
                    DeviceError::Protocol(format!("Invalid next_record_ts: {value}"))
                })?;
                let consumed = next_ts.checked_sub(request.window_start).ok_or_else(|| {
                    DeviceError::Protocol(format!("next_record_ts out of range: {next_ts}"))
                })?;
                (PageCursor::Next(next_ts), consumed)
            }
        };

        Ok(HistoryPage {
            records,
            next,
            position_consumed,
        })
    }

    fn parse_block(block: &Value, records: &mut Vec<TelemetryRecord>) -> DeviceResult<()> {
        let ts = block
            .get("ts")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| DeviceError::Protocol("Missing or invalid block ts".to_string()))?;

        let period = block
            .get("period")
            .and_then(|v| v.as_i64())
            .filter(|p| *p > 0)
            .ok_or_else(|| DeviceError::Protocol("Missing or invalid block period".to_string()))?;

        let rows = block
            .get("values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| DeviceError::Protocol("Missing or invalid block values".to_string()))?;

        records.reserve(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let values = row.as_array().ok_or_else(|| {
                DeviceError::Protocol(format!("Row {index} of block at {ts} is not an array"))
            })?;

            let fields = values
                .iter()
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| {
                        DeviceError::Protocol(format!("Unrepresentable value {n}"))
                    }),
                    other => Err(DeviceError::Protocol(format!(
                        "Non-numeric value {other} in block at {ts}"
                    ))),
                })
                .collect::<DeviceResult<Vec<_>>>()?;

            let timestamp = i64::try_from(index)
                .ok()
                .and_then(|i| i.checked_mul(period))
                .and_then(|offset| ts.checked_add(offset))
                .ok_or_else(|| {
                    DeviceError::Protocol(format!(
                        "Row {index} of block at {ts} overflows with period {period}"
                    ))
                })?;
            records.push(TelemetryRecord::new(timestamp, fields));
        }

        Ok(())
    }

    fn required_str(value: &Value, field: &str) -> DeviceResult<String> {
        value
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| DeviceError::Protocol(format!("Missing or invalid {field}")))
    }
}
