use crate::application::engine::OrderEngine;
use crate::domain::ids::{CourseId, OrderId, UserId};
use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Create,
    Pay,
    Cancel,
}

/// One row of a command file: `command, user, course, order, coupon, method`.
///
/// Columns a command does not use may be left empty or omitted.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OrderCommand {
    pub command: CommandType,
    pub user: UserId,
    #[serde(default)]
    pub course: Option<CourseId>,
    #[serde(default)]
    pub order: Option<OrderId>,
    #[serde(default)]
    pub coupon: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
}

impl OrderCommand {
    pub async fn execute(&self, engine: &OrderEngine) -> Result<()> {
        match self.command {
            CommandType::Create => {
                let course = required(self.course, "course")?;
                engine
                    .create_order(self.user, course, self.coupon.as_deref())
                    .await?;
            }
            CommandType::Pay => {
                let order = required(self.order, "order")?;
                let method = self.method.as_deref().unwrap_or_default();
                engine.pay_order(self.user, order, method).await?;
            }
            CommandType::Cancel => {
                let order = required(self.order, "order")?;
                engine.cancel_order(self.user, order).await?;
            }
        }
        Ok(())
    }
}

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| EngineError::BadRequest(format!("Missing '{column}' column")))
}

/// Reads purchase commands from a CSV source.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one command per row.
    pub fn commands(self) -> impl Iterator<Item = Result<OrderCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(EngineError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "command, user, course, order, coupon, method\n\
                    create, 1, 7, , SAVE20,\n\
                    pay, 1, , 1, , credit_card\n\
                    cancel, 2, , 3";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<OrderCommand>> = reader.commands().collect();

        assert_eq!(results.len(), 3);
        let create = results[0].as_ref().unwrap();
        assert_eq!(create.command, CommandType::Create);
        assert_eq!(create.course, Some(CourseId(7)));
        assert_eq!(create.order, None);
        assert_eq!(create.coupon.as_deref(), Some("SAVE20"));

        let pay = results[1].as_ref().unwrap();
        assert_eq!(pay.order, Some(OrderId(1)));
        assert_eq!(pay.method.as_deref(), Some("credit_card"));

        let cancel = results[2].as_ref().unwrap();
        assert_eq!(cancel.user, UserId(2));
        assert_eq!(cancel.method, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "command, user, course\nrefund, 1, 1";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<OrderCommand>> = reader.commands().collect();

        assert!(results[0].is_err());
    }

    #[test]
    fn test_missing_column_is_bad_request() {
        assert!(matches!(
            required::<OrderId>(None, "order"),
            Err(EngineError::BadRequest(msg)) if msg == "Missing 'order' column"
        ));
    }
}
