//! The in-memory `records` type.

use ferry_convert::{BoxError, DropRoutine, EngineBuilder, Plugin};
use ferry_resource::{ResourceType, Schema};

/// Registers drop and discover for in-memory tables.
///
/// Dropping a table is a no-op: its memory goes away with the last handle.
#[derive(Debug, Default)]
pub struct RecordsPlugin;

impl Plugin for RecordsPlugin {
    fn build(&self, builder: &mut EngineBuilder) {
        let records = ResourceType::records();
        builder
            .register_drop(records, DropRoutine::new("memory", |_, _| Ok(())))
            .register_discover(records, |resource, _| {
                let table = resource
                    .as_records()
                    .ok_or_else(|| BoxError::from(format!("{resource} is not in memory")))?;
                Ok(Schema::infer(table))
            });
    }
}
