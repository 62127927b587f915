//! Built-in clock tools: current time and date

use async_trait::async_trait;
use chrono::Local;

use super::{Tool, ToolSpec};
use crate::error::Result;

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Reports the current local time
pub struct CurrentTime;

#[async_trait]
impl Tool for CurrentTime {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_current_time".to_string(),
            description: "Get the current local time (HH:MM)".to_string(),
            parameters: empty_object_schema(),
        }
    }

    async fn call(&self, _arguments: &serde_json::Value) -> Result<String> {
        Ok(Local::now().format("%H:%M").to_string())
    }
}

/// Reports the current local date
pub struct CurrentDate;

#[async_trait]
impl Tool for CurrentDate {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_current_date".to_string(),
            description: "Get the current local date (weekday, day month year)".to_string(),
            parameters: empty_object_schema(),
        }
    }

    async fn call(&self, _arguments: &serde_json::Value) -> Result<String> {
        Ok(Local::now().format("%A, %d %B %Y").to_string())
    }
}
