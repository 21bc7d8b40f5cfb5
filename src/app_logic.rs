/*
 * The application logic layer: `PickerCommandHandler` is the presenter that
 * sits between the console loop in `main` and the selection engine in `core`.
 * Unit tests for the handler are in `handler_tests.rs`.
 */
pub mod handler;


pub(crate) use handler::{APP_NAME, HandlerOutcome, PickerCommandHandler};
