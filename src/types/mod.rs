//! Data model shared by persistence, the session and the document assembler.

mod metadata;
mod step;

pub use metadata::{now_timestamp, today, Metadata, DATE_FORMAT, TIMESTAMP_FORMAT};
pub use step::{in_display_order, next_step_number, Step, StepImage};
